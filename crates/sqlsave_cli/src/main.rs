//! Command-line front end for the save builder.
//!
//! # Responsibility
//! - Render save statements for a JSON model and entity list.
//! - Apply the same entities to a SQLite database file.
//!
//! # Invariants
//! - `build` never touches a database.
//! - `save` writes every entity in one all-or-nothing batch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use serde_json::Value;
use sqlsave_core::{
    core_version, init_logging, open_db, resolve, Dialect, Entity, LogLevel, Model, SaveBuilder,
    SqlConfig, SqlManager, SqliteBackend,
};
use std::error::Error;
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "sqlsave")]
#[command(about = "Build and apply metadata-driven save statements", long_about = None)]
struct Cli {
    /// Absolute directory for rolling log files; logging stays off when unset
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the save statement for every entity as JSON
    Build(BuildArgs),
    /// Save entities into a SQLite database file
    Save(SaveArgs),
    /// Print the core library version
    Version,
}

#[derive(Debug, Args)]
struct Inputs {
    /// Model definition JSON (`{"name": ..., "attributes": {...}}`)
    #[arg(long)]
    model: PathBuf,

    /// JSON array of entities, or a single entity object
    #[arg(long)]
    entities: PathBuf,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    inputs: Inputs,

    #[arg(long, value_enum, default_value_t = DialectArg::Conditional)]
    dialect: DialectArg,
}

#[derive(Debug, Args)]
struct SaveArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// SQLite database file; the target table must already exist
    #[arg(long)]
    db: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    Conditional,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Conditional => Dialect::Conditional,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = setup_logging(&cli).and_then(|()| match cli.command {
        Commands::Build(args) => execute_build(args),
        Commands::Save(args) => execute_save(args),
        Commands::Version => {
            println!("sqlsave_core version={}", core_version());
            Ok(())
        }
    });

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn setup_logging(cli: &Cli) -> CliResult<()> {
    let Some(dir) = &cli.log_dir else {
        return Ok(());
    };
    let level = match &cli.log_level {
        Some(level) => level.clone(),
        None => LogLevel::for_build().to_string(),
    };
    let dir = dir.to_str().ok_or("log directory must be valid UTF-8")?;
    init_logging(&level, dir)?;
    Ok(())
}

fn execute_build(args: BuildArgs) -> CliResult<()> {
    let (model, entities) = load_inputs(&args.inputs)?;
    let meta = resolve(&model.attributes)?;
    let config = SqlConfig {
        dialect: args.dialect.into(),
        ..SqlConfig::default()
    };
    let statements =
        SaveBuilder::with_config(&model.name, &meta, config).build_to_save_batch(&entities);
    println!("{}", serde_json::to_string_pretty(&statements)?);
    Ok(())
}

fn execute_save(args: SaveArgs) -> CliResult<()> {
    let (model, entities) = load_inputs(&args.inputs)?;
    let meta = resolve(&model.attributes)?;
    let conn = open_db(&args.db)?;
    let mut manager = SqlManager::new(SqliteBackend::new(&conn));

    let rows = manager.save_batch(&model.name, &meta, &entities)?;
    info!(
        "event=cli_save module=cli status=ok table={} entities={} rows={rows}",
        model.name,
        entities.len()
    );
    println!("{rows}");
    Ok(())
}

fn load_inputs(inputs: &Inputs) -> CliResult<(Model, Vec<Entity>)> {
    let model = Model::from_json(&read_text(&inputs.model)?)?;
    let entities = match serde_json::from_str::<Value>(&read_text(&inputs.entities)?)? {
        Value::Array(items) => items
            .into_iter()
            .map(into_entity)
            .collect::<CliResult<Vec<_>>>()?,
        single => vec![into_entity(single)?],
    };
    Ok((model, entities))
}

fn into_entity(value: Value) -> CliResult<Entity> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("entity must be a JSON object, got `{other}`").into()),
    }
}

fn read_text(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{}`: {err}", path.display()).into())
}
