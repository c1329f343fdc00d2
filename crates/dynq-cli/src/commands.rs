//! Subcommand execution.

use std::path::Path;
use std::sync::Arc;

use dynq_core::proto::{CountArgs, Cursor, FilterNode, FindArgs, FindOneArgs, Select, SortSpec};
use dynq_core::{Catalog, EngineConfig, LocalStore, QueryEngine, StoreConfig, Transform};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::formatter::create_formatter;
use crate::{Args, Command, FindOptions, QueryOptions};

/// Command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid JSON in {what}: {source}")]
    Json {
        what: String,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Engine(#[from] dynq_core::Error),

    #[error(transparent)]
    Store(#[from] dynq_core::StoreError),

    #[error(transparent)]
    Protocol(#[from] dynq_core::proto::Error),
}

/// Run the parsed command line.
pub async fn run(args: Args) -> Result<(), CommandError> {
    let catalog = read_catalog(&args.schema)?;

    let config = if args.temporary {
        StoreConfig::temporary()
    } else {
        StoreConfig::new(&args.data_path)
    };
    let store = Arc::new(LocalStore::open(config)?);
    for collection in catalog.collections() {
        store.create_table(collection.table.clone())?;
    }

    let engine = QueryEngine::new(store.clone(), Arc::new(catalog))
        .with_config(EngineConfig::new().with_default_limit(args.default_limit));
    let formatter = create_formatter(args.format);

    let output = match args.command {
        Command::Load { collection, file } => {
            let loaded = load(&engine, &store, &collection, &file)?;
            formatter.format_message(&format!("loaded {} document(s) into '{}'", loaded, collection))
        }
        Command::Find(options) => {
            let page = engine.find(find_args(options)?).await?;
            formatter.format_page(&page)
        }
        Command::FindOne(options) => {
            let doc = engine.find_one(find_one_args(options)?).await?;
            formatter.format_document(doc.as_ref())
        }
        Command::Count {
            collection,
            filter,
            locale,
        } => {
            let mut count = CountArgs::new(collection.as_str());
            count.filter = parse_filter(filter.as_deref())?;
            count.locale = locale;
            let total = engine.count(count).await?;
            formatter.format_count(&collection, total)
        }
        Command::Collections => {
            let slugs: Vec<String> = engine
                .catalog()
                .collections()
                .iter()
                .map(|c| c.slug.clone())
                .collect();
            formatter.format_collections(&slugs)
        }
    };

    store.flush()?;
    println!("{}", output);
    Ok(())
}

fn read_catalog(path: &Path) -> Result<Catalog, CommandError> {
    let source = read_file(path)?;
    Catalog::from_json(&source).map_err(|source| CommandError::Json {
        what: path.display().to_string(),
        source,
    })
}

fn read_file(path: &Path) -> Result<String, CommandError> {
    std::fs::read_to_string(path).map_err(|source| CommandError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Store every document of a JSON array file. Returns the number stored.
fn load(
    engine: &QueryEngine,
    store: &LocalStore,
    collection: &str,
    file: &Path,
) -> Result<usize, CommandError> {
    let def = engine
        .catalog()
        .collection(collection)
        .ok_or_else(|| dynq_core::Error::UnknownCollection(collection.to_string()))?;

    let source = read_file(file)?;
    let value: Value = serde_json::from_str(&source).map_err(|source| CommandError::Json {
        what: file.display().to_string(),
        source,
    })?;
    let Value::Array(documents) = value else {
        return Err(CommandError::Invalid(format!(
            "'{}' must contain an array of documents",
            file.display()
        )));
    };

    let transform = dynq_core::JsonTransform;
    let mut loaded = 0;
    for document in documents {
        let Value::Object(document) = document else {
            return Err(CommandError::Invalid(format!(
                "document {} in '{}' is not an object",
                loaded,
                file.display()
            )));
        };
        let item = transform.write(collection, document)?;
        store.put_item(&def.table.name, item)?;
        loaded += 1;
    }

    // Pages cached before the load no longer line up with the data.
    engine.clear_collection(collection);
    info!(collection, loaded, "loaded documents");
    Ok(loaded)
}

fn parse_filter(source: Option<&str>) -> Result<Option<FilterNode>, CommandError> {
    let Some(source) = source else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(source).map_err(|source| CommandError::Json {
        what: "--where".to_string(),
        source,
    })?;
    Ok(FilterNode::from_json(&value)?)
}

fn select(options: &QueryOptions) -> Option<Select> {
    if !options.select.is_empty() {
        Some(Select::fields(options.select.iter().cloned()))
    } else if !options.exclude.is_empty() {
        Some(Select::excluding(options.exclude.iter().cloned()))
    } else {
        None
    }
}

fn find_args(options: FindOptions) -> Result<FindArgs, CommandError> {
    let query = options.query;

    let mut args = FindArgs::new(query.collection.as_str())
        .with_sort(SortSpec::parse(&options.sort)?)
        .with_page(options.page);
    args.filter = parse_filter(query.filter.as_deref())?;
    args.select = select(&query);
    args.locale = query.locale;
    args.limit = options.limit;
    args.cursor = options.cursor.map(Cursor::from_token);
    args.pagination = !options.no_count;
    for path in query.joins {
        args = args.join(path);
    }

    Ok(args)
}

fn find_one_args(options: QueryOptions) -> Result<FindOneArgs, CommandError> {
    let mut args = FindOneArgs::new(options.collection.as_str());
    args.filter = parse_filter(options.filter.as_deref())?;
    args.select = select(&options);
    args.locale = options.locale.clone();
    for path in &options.joins {
        args = args.join(path.as_str());
    }
    Ok(args)
}
