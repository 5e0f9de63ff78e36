//! CLI tool for inspecting shared tables: snapshot state, paged rows, file
//! manifests and the change data feed.

mod error;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sharelog_core::{
    catalog::{Catalog, StaticCatalog},
    config::EngineConfig,
    protocol::{ChangeParams, ManifestBuilder, QueryParams, QueryResponse, SnapshotParams},
    query::{DefaultFileReader, QueryOrchestrator},
    storage::TableLocation,
    table::SharedTable,
    transaction_log::{ColumnInfo, Protocol},
};
use snafu::{OptionExt, ResultExt};

use crate::{
    error::{
        CliResult, EngineSnafu, InvalidLocationSnafu, LoadConfigSnafu, NoTableGivenSnafu,
        OpenTableSnafu, RequestSnafu, UnknownTableSnafu,
    },
    output::{write_json, write_stream},
};

/// Which table a command works on.
#[derive(Debug, Args)]
struct TableArgs {
    /// Table root: a path, file:// URI or memory:// name
    #[arg(long, conflicts_with_all = ["share", "schema", "name"])]
    table: Option<String>,
    /// Share of a catalog table (needs --schema and --name)
    #[arg(long)]
    share: Option<String>,
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    name: Option<String>,
}

/// Resolve the table as of a past version or time.
#[derive(Debug, Args)]
struct SnapshotArgs {
    /// Version to resolve at; wins over --timestamp
    #[arg(long)]
    version: Option<u64>,
    /// ISO-8601 time to resolve at
    #[arg(long)]
    timestamp: Option<String>,
}

impl From<SnapshotArgs> for SnapshotParams {
    fn from(args: SnapshotArgs) -> Self {
        SnapshotParams {
            version: args.version,
            timestamp: args.timestamp,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize the replayed table state
    State {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Pretty-print the JSON output
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Read a page of rows from the active data files
    Query {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Rows to return (capped by maxRowsPerQuery)
        #[arg(long = "limit-hint")]
        limit_hint: Option<usize>,
        /// Rows to skip
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Stream the file manifest as line-delimited JSON
    Files {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Stream the change data feed as line-delimited JSON
    Changes {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long = "starting-version")]
        starting_version: Option<u64>,
        #[arg(long = "ending-version")]
        ending_version: Option<u64>,
        /// ISO-8601; ignored when a version bound is given
        #[arg(long = "starting-timestamp")]
        starting_timestamp: Option<String>,
        #[arg(long = "ending-timestamp")]
        ending_timestamp: Option<String>,
    },
}

#[derive(Debug, Parser)]
#[command(name = "sharelog")]
struct Cli {
    /// JSON config file (camelCase keys); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

/// JSON summary printed by `state`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateSummary {
    location: String,
    version: i64,
    protocol: Protocol,
    table_id: String,
    table_name: Option<String>,
    partition_columns: Vec<String>,
    columns: Vec<ColumnInfo>,
    num_files: usize,
    size: u64,
    num_records: Option<u64>,
    latest_commit_timestamp: Option<i64>,
}

async fn load_config(path: Option<&PathBuf>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path)
            .await
            .context(LoadConfigSnafu),
        None => Ok(EngineConfig::default()),
    }
}

fn resolve_location(args: &TableArgs, config: &EngineConfig) -> CliResult<TableLocation> {
    if let Some(spec) = &args.table {
        return TableLocation::parse(spec).context(InvalidLocationSnafu);
    }
    let (Some(share), Some(schema), Some(name)) = (&args.share, &args.schema, &args.name) else {
        return NoTableGivenSnafu.fail();
    };
    StaticCatalog::from_config(config)
        .resolve(share, schema, name)
        .context(UnknownTableSnafu {
            share: share.clone(),
            schema: schema.clone(),
            name: name.clone(),
        })
}

fn open_table(args: &TableArgs, config: &EngineConfig) -> CliResult<SharedTable> {
    let location = resolve_location(args, config)?;
    log::debug!("opening table at {location}");
    SharedTable::open(&config.backend_registry(), &location).context(OpenTableSnafu {
        location: location.to_string(),
    })
}

async fn cmd_state(
    config: &EngineConfig,
    table: TableArgs,
    snapshot: SnapshotArgs,
    pretty: bool,
) -> CliResult<()> {
    let cutoff = SnapshotParams::from(snapshot)
        .into_cutoff()
        .context(RequestSnafu)?;
    let table = open_table(&table, config)?;
    let (state, metadata) = table
        .state_with_metadata(cutoff.as_ref())
        .await
        .context(EngineSnafu)?;

    let summary = StateSummary {
        location: table.location().to_string(),
        version: state.version_or_sentinel(),
        protocol: state.protocol.clone().unwrap_or_default(),
        columns: metadata.columns(),
        table_id: metadata.id,
        table_name: metadata.name,
        partition_columns: metadata.partition_columns,
        num_files: state.active_files.len(),
        size: state.total_size(),
        num_records: state.num_records(),
        latest_commit_timestamp: state.latest_commit_timestamp,
    };
    write_json(&summary, pretty)
}

async fn cmd_query(
    config: &EngineConfig,
    table: TableArgs,
    params: QueryParams,
    pretty: bool,
) -> CliResult<()> {
    let request = params.into_request(config).context(RequestSnafu)?;
    let table = open_table(&table, config)?;
    let orchestrator = QueryOrchestrator::from_config(Arc::new(DefaultFileReader), config);
    let result = orchestrator
        .query(&table, &request)
        .await
        .context(EngineSnafu)?;
    log::info!(
        "query at version {} returned {} of {} rows",
        result.version,
        result.rows.len(),
        result.total_rows
    );
    write_json(&QueryResponse::new(result, config.max_rows_per_query), pretty)
}

async fn cmd_files(
    config: &EngineConfig,
    table: TableArgs,
    snapshot: SnapshotArgs,
) -> CliResult<()> {
    let cutoff = SnapshotParams::from(snapshot)
        .into_cutoff()
        .context(RequestSnafu)?;
    let table = open_table(&table, config)?;
    let lines = ManifestBuilder::from_config(config, config.url_cache())
        .table_manifest(&table, cutoff.as_ref())
        .await
        .context(EngineSnafu)?;
    write_stream(lines).await
}

async fn cmd_changes(
    config: &EngineConfig,
    table: TableArgs,
    params: ChangeParams,
) -> CliResult<()> {
    let range = params.into_range().context(RequestSnafu)?;
    let table = open_table(&table, config)?;
    let lines = ManifestBuilder::from_config(config, config.url_cache())
        .change_manifest(&table, range)
        .await
        .context(EngineSnafu)?;
    write_stream(lines).await
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).await?;

    match cli.cmd {
        Command::State {
            table,
            snapshot,
            pretty,
        } => cmd_state(&config, table, snapshot, pretty).await,
        Command::Query {
            table,
            snapshot,
            limit_hint,
            offset,
            pretty,
        } => {
            let params = QueryParams {
                limit_hint,
                offset,
                version: snapshot.version,
                timestamp: snapshot.timestamp,
            };
            cmd_query(&config, table, params, pretty).await
        }
        Command::Files { table, snapshot } => cmd_files(&config, table, snapshot).await,
        Command::Changes {
            table,
            starting_version,
            ending_version,
            starting_timestamp,
            ending_timestamp,
        } => {
            let params = ChangeParams {
                starting_version,
                ending_version,
                starting_timestamp,
                ending_timestamp,
            };
            cmd_changes(&config, table, params).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
