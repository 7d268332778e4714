use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Serverless data warehouse on S3, Glue, Athena and Firehose.
///
/// Connection and warehouse settings come from the environment (or a
/// `.env` file); flags here override them.
#[derive(Parser, Debug)]
#[command(name = "cheapo", about = "Serverless data warehouse on AWS")]
pub struct CliArgs {
    /// Warehouse (bucket and database) name
    #[arg(long, short = 'w', env = "CHEAPO_WAREHOUSE", global = true)]
    pub warehouse: Option<String>,

    /// Execution role ARN used by crawlers and delivery streams
    #[arg(long, global = true)]
    pub role_arn: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the bucket and database, and optionally the execution role
    Create {
        #[arg(long)]
        description: Option<String>,

        /// Create `<warehouse>-CheapoDBExecutionRole` when no role ARN is given
        #[arg(long)]
        create_role: bool,
    },

    /// Create a crawler over `<warehouse>/<name>/` and run it
    Crawl {
        name: String,

        /// Cron schedule, e.g. "cron(15 12 * * ? *)"
        #[arg(long)]
        schedule: Option<String>,

        #[arg(long)]
        table_prefix: Option<String>,

        /// UPDATE_IN_DATABASE or LOG
        #[arg(long, default_value = "UPDATE_IN_DATABASE")]
        update_behavior: String,

        /// DELETE_FROM_DATABASE, DEPRECATE_IN_DATABASE or LOG
        #[arg(long, default_value = "DELETE_FROM_DATABASE")]
        delete_behavior: String,

        /// Seconds between status checks; omit to return once started
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Run a SQL query and print the results
    Query {
        sql: String,

        /// s3:// location for the result files
        #[arg(long)]
        output: Option<String>,

        /// Print one JSON object per row instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Send a JSON-lines file through a delivery stream
    ///
    /// The file is read as it is sent; records ahead of a malformed line
    /// are delivered before the error is reported.
    Ingest {
        stream: String,
        file: PathBuf,

        /// Key prefix for delivered objects
        #[arg(long)]
        prefix: Option<String>,

        /// UNCOMPRESSED, GZIP, ZIP, Snappy or HADOOP_SNAPPY
        #[arg(long, default_value = "UNCOMPRESSED")]
        compression: String,

        /// Batches in flight (defaults to CHEAPO_INGEST_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Upload a local file as `<prefix>/<table>/<table>`
    Upload {
        table: String,
        file: PathBuf,

        #[arg(long, default_value = "")]
        prefix: String,

        /// Object tags as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Upload every file listed in a JSON manifest
    ///
    /// The manifest is an array of `{"table", "file", "tags"}` objects;
    /// relative paths resolve against the manifest's directory.
    UploadManifest {
        manifest: PathBuf,

        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Download `<prefix>/<table>/<table>` to a local file
    Download {
        table: String,
        file: PathBuf,

        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// List catalog versions of a table
    Versions {
        table: String,

        #[arg(long)]
        table_prefix: Option<String>,
    },

    /// Show a table's catalog definition
    Describe {
        table: String,

        #[arg(long)]
        table_prefix: Option<String>,
    },

    /// Remove a table from the catalog, optionally with its data
    DeleteTable {
        table: String,

        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long)]
        table_prefix: Option<String>,

        /// Also delete every object version under `<prefix>/<table>/`
        #[arg(long)]
        include_data: bool,
    },
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
