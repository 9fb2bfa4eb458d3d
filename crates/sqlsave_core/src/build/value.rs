//! Value classification and placeholder allocation.

use crate::build::ParamFormatter;
use crate::model::metadata::BoolEncoding;
use serde_json::{Number, Value};

/// Storage representation chosen for one entity value.
///
/// Classification order is fixed: null, empty string, numeric, boolean,
/// everything else.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueKind<'a> {
    Null,
    Empty,
    Numeric(String),
    SentinelBool(&'a str),
    PlainBool(bool),
    Bound(&'a Value),
}

impl<'a> ValueKind<'a> {
    pub(crate) fn classify(value: &'a Value, encoding: &'a BoolEncoding) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::String(text) if text.is_empty() => Self::Empty,
            Value::Number(number) => Self::Numeric(numeric_literal(number)),
            Value::Bool(flag) => match encoding {
                BoolEncoding::Native => Self::PlainBool(*flag),
                BoolEncoding::Sentinel { truthy, falsy } => {
                    Self::SentinelBool(if *flag { truthy.as_str() } else { falsy.as_str() })
                }
            },
            other => Self::Bound(other),
        }
    }
}

/// Literal SQL token for a number; non-finite values become `null`.
pub(crate) fn numeric_literal(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if !float.is_finite() => "null".to_string(),
        _ => number.to_string(),
    }
}

/// Finite numeric value of a version counter, if any.
pub(crate) fn finite_number(value: &Value) -> Option<&Number> {
    match value {
        Value::Number(number) if number.as_f64().is_some_and(f64::is_finite) => Some(number),
        _ => None,
    }
}

/// `number + 1` as a SQL literal.
pub(crate) fn increment_literal(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        if let Some(next) = int.checked_add(1) {
            return next.to_string();
        }
    }
    match number.as_f64().and_then(|float| Number::from_f64(float + 1.0)) {
        Some(next) => numeric_literal(&next),
        None => "null".to_string(),
    }
}

/// Allocates placeholders in emission order and collects their values.
pub(crate) struct Placeholders {
    next: usize,
    formatter: ParamFormatter,
    params: Vec<Value>,
}

impl Placeholders {
    pub(crate) fn new(formatter: ParamFormatter, start: usize) -> Self {
        Self {
            next: start.max(1),
            formatter,
            params: Vec::new(),
        }
    }

    /// Renders `kind` as SQL text, binding a parameter only when required.
    pub(crate) fn render(&mut self, kind: ValueKind<'_>) -> String {
        match kind {
            ValueKind::Null => "null".to_string(),
            ValueKind::Empty => "''".to_string(),
            ValueKind::Numeric(literal) => literal,
            ValueKind::PlainBool(flag) => (if flag { "true" } else { "false" }).to_string(),
            ValueKind::SentinelBool(text) => self.bind(Value::String(text.to_string())),
            ValueKind::Bound(value) => self.bind(value.clone()),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let placeholder = (self.formatter)(self.next);
        self.next += 1;
        self.params.push(value);
        placeholder
    }

    pub(crate) fn into_params(self) -> Vec<Value> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::{increment_literal, numeric_literal, Placeholders, ValueKind};
    use crate::build::param;
    use crate::model::metadata::BoolEncoding;
    use serde_json::{json, Number};

    #[test]
    fn classification_follows_fixed_order() {
        let native = BoolEncoding::Native;
        assert_eq!(ValueKind::classify(&json!(null), &native), ValueKind::Null);
        assert_eq!(ValueKind::classify(&json!(""), &native), ValueKind::Empty);
        assert_eq!(
            ValueKind::classify(&json!(42), &native),
            ValueKind::Numeric("42".to_string())
        );
        assert_eq!(
            ValueKind::classify(&json!(true), &native),
            ValueKind::PlainBool(true)
        );
        let text = json!("abc");
        assert_eq!(ValueKind::classify(&text, &native), ValueKind::Bound(&text));
    }

    #[test]
    fn sentinel_booleans_pick_matching_literal() {
        let encoding = BoolEncoding::Sentinel {
            truthy: "Y".to_string(),
            falsy: "N".to_string(),
        };
        assert_eq!(
            ValueKind::classify(&json!(false), &encoding),
            ValueKind::SentinelBool("N")
        );
    }

    #[test]
    fn placeholders_only_consume_bound_values() {
        let mut sink = Placeholders::new(param, 1);
        let text = json!("x");
        assert_eq!(sink.render(ValueKind::Numeric("7".to_string())), "7");
        assert_eq!(sink.render(ValueKind::Null), "null");
        assert_eq!(sink.render(ValueKind::Bound(&text)), "@1");
        assert_eq!(sink.render(ValueKind::SentinelBool("Y")), "@2");
        assert_eq!(sink.into_params(), vec![json!("x"), json!("Y")]);
    }

    #[test]
    fn numeric_literals_render_plainly() {
        assert_eq!(numeric_literal(&Number::from(-3)), "-3");
        assert_eq!(numeric_literal(&Number::from_f64(1.5).unwrap()), "1.5");
        assert_eq!(increment_literal(&Number::from(4)), "5");
        assert_eq!(increment_literal(&Number::from_f64(2.5).unwrap()), "3.5");
    }
}
