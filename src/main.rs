use anyhow::{bail, Context as _};
use clap::Parser;
use docstore::config::cli::{Backend, Command};
use docstore::utils::{logger, validation::Validate};
use docstore::{
    CliConfig, Context, Keyword, ListItem, SearchStore, SelectionPredicate, Storage, StoreConfig,
};
use serde_json::Value;
use std::time::Duration;
use tokio::io::AsyncReadExt;

fn parse_keyword(query: Option<String>) -> anyhow::Result<Option<Keyword>> {
    let Some(query) = query else {
        return Ok(None);
    };
    // JSON 物件視為欄位條件，其餘當作 query string
    match serde_json::from_str::<Value>(&query) {
        Ok(value @ Value::Object(_)) => Ok(Some(Keyword::try_from(value)?)),
        _ => Ok(Some(Keyword::Raw(query))),
    }
}

async fn read_document(data: Option<String>) -> anyhow::Result<Value> {
    let raw = match data {
        Some(data) => data,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    serde_json::from_str(&raw).context("document is not valid JSON")
}

async fn run<S: Storage>(store: &S, ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get { key } => {
            let doc: Value = store.get(ctx, &key).await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Put { key, data } => {
            let doc = read_document(data).await?;
            store.create(ctx, &key, &doc, None).await?;
            tracing::info!("✅ created {}", key);
        }
        Command::Update {
            key,
            data,
            resource_version,
        } => {
            let doc = read_document(Some(data)).await?;
            store.update(ctx, &key, resource_version, &doc, None).await?;
            tracing::info!("✅ updated {}", key);
        }
        Command::Delete { key } => {
            store.delete(ctx, &key).await?;
            tracing::info!("✅ deleted {}", key);
        }
        Command::List {
            key,
            query,
            from,
            limit,
            scroll,
            keys_only,
            exclude,
        } => {
            let mut sp = SelectionPredicate::new().page(from, limit);
            if let Some(keyword) = parse_keyword(query)? {
                sp = sp.keyword(keyword);
            }
            if scroll {
                sp = sp.scroll(docstore::core::DEFAULT_SCROLL_KEEP_ALIVE);
            }
            if keys_only {
                sp = sp.key_only();
            }
            let ctx = ctx.clone().with_excludes(exclude);

            let mut total = 0usize;
            loop {
                let items: Vec<ListItem<Value>> = store.list(&ctx, &key, &mut sp).await?;
                if items.is_empty() {
                    break;
                }
                total += items.len();
                for item in items {
                    match item {
                        ListItem::Object(doc) => println!("{}", serde_json::to_string(&doc)?),
                        ListItem::Key(path) => println!("{}", path),
                        ListItem::Failed { key, error } => {
                            tracing::warn!("⚠️ {} could not be read: {}", key, error)
                        }
                    }
                }
                if !sp.is_scroll() || sp.eof {
                    break;
                }
            }
            tracing::info!("📋 {} entries listed under {}", total, key);
        }
        Command::DeleteByQuery { key, query } => {
            let keyword = parse_keyword(query)?;
            let report = store.delete_by_query(ctx, &key, keyword.as_ref()).await?;
            println!(
                "deleted: {}, version conflicts: {}",
                report.deleted, report.version_conflicts
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting docstore CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    cli.validate()?;
    let config = StoreConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.validate()?;

    let ctx = match cli.timeout {
        0 => Context::new(),
        secs => Context::new().with_timeout(Duration::from_secs(secs)),
    };

    let result = match cli.backend {
        Backend::Search => {
            let Some(search) = &config.search else {
                bail!("backend \"search\" selected but [search] is not configured");
            };
            let store = SearchStore::new(search)?;
            run(&store, &ctx, cli.command).await
        }
        #[cfg(feature = "s3")]
        Backend::Object => {
            let Some(object) = &config.object else {
                bail!("backend \"object\" selected but [object] is not configured");
            };
            let backend = docstore::S3Backend::from_config(object).await;
            let store = docstore::ObjectStore::new(backend);
            run(&store, &ctx, cli.command).await
        }
        #[cfg(not(feature = "s3"))]
        Backend::Object => bail!("object backend requires the \"s3\" feature"),
    };

    if let Err(e) = &result {
        if let Some(storage_err) = e.downcast_ref::<docstore::StorageError>() {
            let http = storage_err.to_http_error();
            tracing::error!("❌ {} ({} {})", storage_err, http.status.as_u16(), http.message);
        }
    }
    result
}
