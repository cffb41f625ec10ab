//! WAL Inspector
//!
//! Read-only tool for looking at a database's write-ahead log.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use strata_wal::catalog::{DataChunk, MemoryDatabase};
use strata_wal::config::DEFAULT_FILE_NAME;
use strata_wal::wal::{Entry, WalReader, WalReplay};
use strata_wal::{Result, WalConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// WAL Inspector
#[derive(Parser, Debug)]
#[command(name = "wal-inspect")]
#[command(about = "Inspect and verify a write-ahead log without modifying it")]
#[command(version)]
struct Args {
    /// Database directory containing the log
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Log file name inside the directory
    #[arg(short, long, default_value = DEFAULT_FILE_NAME)]
    file_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every decodable entry with its offset
    Dump,

    /// Report how much of the log is valid
    Verify,

    /// Replay into an in-memory database and print the resulting catalog
    Replay,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,strata_wal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = WalConfig::builder().file_name(&args.file_name).build();
    let path = config.log_path(&args.dir);

    tracing::info!("wal-inspect v{}", strata_wal::VERSION);
    tracing::info!("Log file: {}", path.display());

    let outcome = match args.command {
        Commands::Dump => dump(&path),
        Commands::Verify => verify(&config, &path),
        Commands::Replay => replay(&config, &path),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn dump(path: &std::path::Path) -> Result<()> {
    let Some(reader) = WalReader::open(path)? else {
        println!("(no log file)");
        return Ok(());
    };

    for next in reader {
        match next {
            Ok(logged) => println!("{:>10}  {}", logged.offset, describe(&logged.entry)),
            Err(e) => {
                println!("{:>10}  <stop: {}>", e.offset().unwrap_or_default(), e);
                break;
            }
        }
    }
    Ok(())
}

fn verify(config: &WalConfig, path: &std::path::Path) -> Result<()> {
    let result = WalReplay::new(config).verify(path)?;

    println!("file length:      {}", result.file_length);
    println!("valid length:     {}", result.valid_length);
    println!("flushed units:    {}", result.transactions_replayed);
    println!("flushed entries:  {}", result.entries_replayed);
    println!("unflushed tail:   {} entries", result.entries_discarded);
    if let Some(reason) = &result.stop_reason {
        println!("stopped at:       {}", reason);
    }
    Ok(())
}

fn replay(config: &WalConfig, path: &std::path::Path) -> Result<()> {
    let mut db = MemoryDatabase::new();
    WalReplay::new(config).dry_run(path, &mut db)?;

    for schema in db.schema_names() {
        println!("schema {}", schema);
        for table in db.tables(schema) {
            let columns: Vec<String> = table
                .metadata
                .columns
                .iter()
                .map(|c| {
                    let null = if c.nullable { "" } else { " NOT NULL" };
                    format!("{} {:?}{}", c.name, c.logical_type, null)
                })
                .collect();
            println!(
                "  table {} ({}) rows={}",
                table.metadata.name,
                columns.join(", "),
                table.row_count()
            );
        }
    }
    for query in db.executed_queries() {
        println!("query {}", query);
    }
    Ok(())
}

fn describe(entry: &Entry) -> String {
    let kind = entry.entry_type().name();
    match entry {
        Entry::CreateSchema { schema } | Entry::DropSchema { schema } => {
            format!("{} {}", kind, schema)
        }
        Entry::CreateTable(table) => {
            format!("{} {}.{} ({} columns)", kind, table.schema, table.name, table.columns.len())
        }
        Entry::DropTable { schema, table } => format!("{} {}.{}", kind, schema, table),
        Entry::InsertTuple { schema, table, batch } => {
            let rows = DataChunk::from_bytes(batch)
                .map(|chunk| chunk.row_count().to_string())
                .unwrap_or_else(|_| "?".to_string());
            format!("{} {}.{} ({} bytes, {} rows)", kind, schema, table, batch.len(), rows)
        }
        Entry::Query { sql } => format!("{} {}", kind, sql),
        Entry::Flush => kind.to_string(),
    }
}
