use clap::{Parser, Subcommand};
use erdb::ErdbConfig;
use tracing::Level;

mod commands;

use commands::clear::ClearArgs;
use commands::describe::DescribeArgs;
use commands::load::LoadArgs;
use commands::query::QueryArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.erdb/erdb.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// database file path, overriding the configured one
    #[clap(long)]
    db: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the user tables of the database.
    Tables,

    /// Show the fields, key and links of one table.
    Describe(DescribeArgs),

    /// Run a script of semicolon-terminated SQL statements in one transaction.
    Load(LoadArgs),

    /// Drop every table in foreign-key order.
    Clear(ClearArgs),

    /// Query a path of tables, e.g. "Genome Feature".
    Query(QueryArgs),

    /// Show the effective configuration.
    Config,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let mut config = match ErdbConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Commands::Config = cli.command {
        commands::config::run(&config);
        return;
    }

    let db = match config.open_database() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Tables => commands::tables::run(&db),
        Commands::Describe(args) => commands::describe::run(&db, args),
        Commands::Load(args) => commands::load::run(&db, args),
        Commands::Clear(args) => commands::clear::run(&db, args),
        Commands::Query(args) => commands::query::run(&db, args),
        Commands::Config => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
