//! dynq command-line client
//!
//! Loads documents into a local store and runs find, find-one and count requests
//! against it.

mod commands;
mod formatter;

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use formatter::OutputFormat;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// dynq command-line client
#[derive(Parser, Debug)]
#[command(name = "dynq")]
#[command(version, about = "Query a partition/sort-key store with document filters")]
pub struct Args {
    /// Directory of the local store
    #[arg(short = 'd', long, default_value = "./dynq-data")]
    pub data_path: PathBuf,

    /// Use a temporary store that is removed on exit
    #[arg(long)]
    pub temporary: bool,

    /// Catalog file (JSON) describing collections and their tables
    #[arg(short = 's', long)]
    pub schema: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Default page size
    #[arg(long, default_value_t = dynq_core::config::DEFAULT_LIMIT)]
    pub default_limit: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store documents from a JSON array file into a collection
    Load {
        collection: String,
        file: PathBuf,
    },

    /// Fetch one page of documents
    Find(FindOptions),

    /// Fetch the first matching document
    FindOne(QueryOptions),

    /// Count matching documents
    Count {
        collection: String,

        /// Filter as JSON, e.g. '{"status": {"equals": "published"}}'
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        #[arg(long)]
        locale: Option<String>,
    },

    /// List the collections of the catalog
    Collections,
}

/// Options shared by find and find-one.
#[derive(ClapArgs, Debug)]
pub struct QueryOptions {
    pub collection: String,

    /// Filter as JSON, e.g. '{"status": {"equals": "published"}}'
    #[arg(short = 'w', long = "where")]
    pub filter: Option<String>,

    /// Fields to return
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Fields to leave out
    #[arg(long, value_delimiter = ',', conflicts_with = "select")]
    pub exclude: Vec<String>,

    /// Relationship paths to resolve
    #[arg(short = 'j', long = "join")]
    pub joins: Vec<String>,

    /// Locale code, or `all`
    #[arg(long)]
    pub locale: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct FindOptions {
    #[command(flatten)]
    pub query: QueryOptions,

    /// Sort terms: `field` or `-field`
    #[arg(long, allow_hyphen_values = true)]
    pub sort: Vec<String>,

    #[arg(short = 'l', long)]
    pub limit: Option<u32>,

    #[arg(short = 'p', long, default_value_t = 1)]
    pub page: u32,

    /// Continuation token printed with a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Skip counting the total number of matches
    #[arg(long)]
    pub no_count: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = commands::run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
