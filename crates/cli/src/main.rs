mod cli;
mod input;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::TryStreamExt;
use serde_json::Value;
use tracing::info;

use cheapo_core::config::{load_dotenv, Config};
use cheapo_warehouse::capability::{Compression, DeleteBehavior, UpdateBehavior};
use cheapo_warehouse::{
    create_warehouse, AwsCapabilities, CrawlOutcome, CrawlerOptions, StreamOptions, Warehouse,
    WarehouseOptions,
};

use crate::cli::{CliArgs, Command};
use crate::input::{parse_manifest, JsonLines};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env();
    if let Some(name) = args.warehouse.clone() {
        config.warehouse.name = Some(name);
    }
    config.log_summary();

    let mut options = WarehouseOptions::from_config(&config)?;
    if let Some(arn) = args.role_arn.clone() {
        options = options.iam_role_arn(arn);
    }

    let caps = AwsCapabilities::connect(&config.aws).await.into_capabilities();

    if let Command::Create {
        description,
        create_role,
    } = &args.command
    {
        if let Some(description) = description {
            options = options.description(description.clone());
        }
        if *create_role {
            options = options.create_iam_role(true);
        }
        let warehouse = create_warehouse(caps, options)
            .await
            .context("failed to create warehouse")?;
        println!("Warehouse {} ready", warehouse.name());
        println!("  role:    {}", warehouse.role_arn());
        println!("  results: {}", warehouse.results_location());
        return Ok(());
    }

    let warehouse = Warehouse::open(caps, options)
        .await
        .context("failed to open warehouse")?;
    run(&warehouse, args.command).await
}

async fn run(warehouse: &Warehouse, command: Command) -> Result<()> {
    match command {
        Command::Create { .. } => unreachable!("handled before the warehouse is opened"),

        Command::Crawl {
            name,
            schedule,
            table_prefix,
            update_behavior,
            delete_behavior,
            wait,
        } => {
            let options = CrawlerOptions {
                schedule,
                table_prefix,
                update_behavior: update_behavior.parse::<UpdateBehavior>()?,
                delete_behavior: delete_behavior.parse::<DeleteBehavior>()?,
            };
            let crawler = warehouse.create_crawler(&name, options).await?;
            println!("Crawler {crawler}");

            let outcome = warehouse
                .update_tables(crawler.get(), wait.map(Duration::from_secs))
                .await?;
            match outcome {
                CrawlOutcome::Failed { .. } | CrawlOutcome::Cancelled => {
                    bail!("crawler {name}: {outcome}")
                }
                _ => println!("Crawler {name}: {outcome}"),
            }
        }

        Command::Query { sql, output, json } => {
            let cursor = warehouse.query(&sql, output.as_deref()).await?;
            if json {
                let mut rows = Box::pin(cursor.rows());
                while let Some(row) = rows.try_next().await? {
                    println!("{}", serde_json::to_string(&row)?);
                }
            } else {
                println!("{}", cursor.collect().await?);
            }
        }

        Command::Ingest {
            stream,
            file,
            prefix,
            compression,
            concurrency,
        } => {
            let reader = File::open(&file)
                .with_context(|| format!("failed to open {}", file.display()))?;
            let mut records = JsonLines::new(BufReader::new(reader));

            let delivery = warehouse.stream(stream);
            let options = StreamOptions {
                prefix,
                compression: compression.parse::<Compression>()?,
                ..Default::default()
            };
            let arn = delivery.initialize(options).await?;
            info!(stream = delivery.name(), arn = %arn, "Delivery stream ready");

            let concurrency =
                concurrency.unwrap_or_else(|| warehouse.ingest_config().concurrency);
            let summary = delivery.from_records(&mut records, concurrency).await?;
            println!(
                "Sent {} records in {} batches ({} resubmitted)",
                summary.records, summary.batches, summary.resubmitted
            );
            records
                .finish()
                .with_context(|| format!("invalid JSON lines in {}", file.display()))?;
        }

        Command::Upload {
            table,
            file,
            prefix,
            tags,
        } => {
            let table = warehouse.table(&table, &prefix)?;
            let tags: Vec<(&str, &str)> = tags
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            table.upload(&file, &tags).await?;
            println!("Uploaded {} to s3://{}/{}", file.display(), warehouse.name(), table.object_key());
        }

        Command::UploadManifest { manifest, prefix } => {
            let text = std::fs::read_to_string(&manifest)
                .with_context(|| format!("failed to read {}", manifest.display()))?;
            let doc: Value = serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON in {}", manifest.display()))?;
            let base = manifest.parent().unwrap_or_else(|| Path::new("."));
            let entries = parse_manifest(&doc, base)
                .with_context(|| format!("invalid manifest {}", manifest.display()))?;

            for entry in &entries {
                let table = warehouse.table(&entry.table, &prefix)?;
                let tags: Vec<(&str, &str)> = entry
                    .tags
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                table.upload(&entry.file, &tags).await?;
                println!("Uploaded {} to s3://{}/{}", entry.file.display(), warehouse.name(), table.object_key());
            }
        }

        Command::Download {
            table,
            file,
            prefix,
        } => {
            let table = warehouse.table(&table, &prefix)?;
            table.download(&file).await?;
            println!("Downloaded s3://{}/{} to {}", warehouse.name(), table.object_key(), file.display());
        }

        Command::Versions {
            table,
            table_prefix,
        } => {
            let table = catalog_table(warehouse, &table, "", table_prefix)?;
            let versions = table.get_versions().await?;
            println!("{}", serde_json::to_string_pretty(&versions)?);
        }

        Command::Describe {
            table,
            table_prefix,
        } => {
            let table = catalog_table(warehouse, &table, "", table_prefix)?;
            let description = table.describe().await?;
            println!("{}", serde_json::to_string_pretty(&description)?);
        }

        Command::DeleteTable {
            table,
            prefix,
            table_prefix,
            include_data,
        } => {
            let table = catalog_table(warehouse, &table, &prefix, table_prefix)?;
            table.delete_table(include_data).await?;
            println!("Deleted table {}", table.catalog_name());
        }
    }

    Ok(())
}

fn catalog_table<'a>(
    warehouse: &'a Warehouse,
    name: &str,
    prefix: &str,
    table_prefix: Option<String>,
) -> Result<cheapo_warehouse::Table<'a>> {
    let table = warehouse.table(name, prefix)?;
    Ok(match table_prefix {
        Some(p) => table.with_catalog_prefix(p),
        None => table,
    })
}
