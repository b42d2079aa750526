//! Phabric CLI: load scenario tables into a SQLite database.
//!
//! Usage:
//!   phabric check --config phabric.yml
//!   phabric load --config phabric.yml [--db path] [--fixture schema.sql] entity=table.txt...

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use phabric::{
    builtin, DataTable, OpenDatasource, Phabric, PhabricConfig, RecordId, SqliteDatasource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "phabric",
    version,
    about = "Load behaviour-driven test fixtures into a database"
)]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and list its entities
    Check {
        /// Path to the YAML configuration
        #[arg(long)]
        config: PathBuf,
    },
    /// Insert tables into a database
    Load {
        /// Path to the YAML configuration
        #[arg(long)]
        config: PathBuf,
        /// SQLite database file (overrides the configuration; in-memory if neither is set)
        #[arg(long)]
        db: Option<PathBuf>,
        /// SQL script to run first (overrides the configuration)
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Update rows with a known name and insert the rest
        #[arg(long)]
        upsert: bool,
        /// Do not apply configured defaults
        #[arg(long)]
        no_defaults: bool,
        /// Remove the loaded rows again before exiting
        #[arg(long)]
        reset: bool,
        /// Print tracked names as JSON
        #[arg(long)]
        json: bool,
        /// Tables to load, in order, as ENTITY=FILE
        #[arg(required = true)]
        tables: Vec<String>,
    },
}

/// Transformations available to every configuration loaded by the CLI
fn register_builtins(bus: &mut Phabric) -> phabric::PhabricResult<()> {
    bus.add_data_transformation("UKTOMYSQLDATE", builtin::uk_to_sql_date())?;
    bus.add_data_transformation("UPDOWNTOINT", builtin::up_down_to_int())?;
    bus.add_data_transformation("SNAKECASE", builtin::snake_case())?;
    Ok(())
}

/// A bus with the built-ins registered first, so configured lookups win
fn build_bus(ds: Arc<SqliteDatasource>, config: &PhabricConfig) -> phabric::PhabricResult<Phabric> {
    let mut bus = Phabric::new(ds);
    register_builtins(&mut bus)?;
    bus.configure(config)?;
    Ok(bus)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn load_config(path: &Path) -> Result<PhabricConfig, String> {
    PhabricConfig::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

/// Split `entity=path` arguments
fn parse_table_args(args: &[String]) -> Result<Vec<(String, PathBuf)>, String> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((entity, path)) if !entity.is_empty() && !path.is_empty() => {
                Ok((entity.to_string(), PathBuf::from(path)))
            }
            _ => Err(format!("expected ENTITY=FILE, got '{}'", arg)),
        })
        .collect()
}

fn cmd_check(config: &Path) -> i32 {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("{:<16}  {:<16}  {:<16}  {:>7}", "ENTITY", "TABLE", "NAME COLUMN", "COLUMNS");
    println!("{}", "-".repeat(62));
    for (name, entity) in &config.entities {
        println!(
            "{:<16}  {:<16}  {:<16}  {:>7}",
            name,
            entity.table,
            entity.name_column.as_deref().unwrap_or("-"),
            entity.columns.len()
        );
    }
    for (transformation, entity) in &config.lookups {
        println!("lookup {} -> {}", transformation, entity);
    }
    0
}

struct LoadOptions {
    db: Option<PathBuf>,
    fixture: Option<PathBuf>,
    upsert: bool,
    apply_defaults: bool,
    reset: bool,
    json: bool,
}

fn run_load(config: &Path, tables: &[String], opts: LoadOptions) -> Result<(), String> {
    let config = load_config(config)?;
    let tables = parse_table_args(tables)?;
    let database = config.database.clone().unwrap_or_default();

    let ds = match opts.db.or(database.path) {
        Some(path) => SqliteDatasource::open(&path)
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?,
        None => SqliteDatasource::open_in_memory().map_err(|e| format!("Failed to open database: {}", e))?,
    };
    if let Some(fixture) = opts.fixture.or(database.fixture) {
        ds.load_fixture(&fixture)
            .map_err(|e| format!("Failed to run {}: {}", fixture.display(), e))?;
    }

    let ds = Arc::new(ds);
    let bus = build_bus(ds.clone(), &config).map_err(|e| e.to_string())?;

    for (entity, path) in &tables {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let table = DataTable::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
        let ids = if opts.upsert {
            bus.upsert_from_table(entity, &table, opts.apply_defaults)
        } else {
            bus.insert_from_table(entity, &table, opts.apply_defaults)
        }
        .map_err(|e| format!("{} ({}): {}", entity, path.display(), e))?;
        eprintln!("Loaded {} row(s) into '{}'", ids.len(), entity);
    }

    let mut tracked: IndexMap<String, IndexMap<String, RecordId>> = IndexMap::new();
    for (entity, _) in &tables {
        if tracked.contains_key(entity) {
            continue;
        }
        let items = bus.get_entity(entity).map_err(|e| e.to_string())?.named_items();
        tracked.insert(entity.clone(), items.into_iter().collect());
    }

    if opts.json {
        let out = serde_json::to_string_pretty(&tracked).map_err(|e| e.to_string())?;
        println!("{}", out);
    } else {
        for (entity, items) in &tracked {
            for (name, id) in items {
                println!("{:<16}  {:<32}  {:>8}", entity, name, id.get());
            }
        }
    }

    if opts.reset {
        let rows = ds.tracked().map_err(|e| e.to_string())?.len();
        bus.reset().map_err(|e| e.to_string())?;
        eprintln!("Reset {} row(s)", rows);
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Check { config } => cmd_check(&config),
        Commands::Load {
            config,
            db,
            fixture,
            upsert,
            no_defaults,
            reset,
            json,
            tables,
        } => {
            let opts = LoadOptions {
                db,
                fixture,
                upsert,
                apply_defaults: !no_defaults,
                reset,
                json,
            };
            match run_load(&config, &tables, opts) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
    };
    std::process::exit(code);
}
