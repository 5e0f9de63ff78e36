use sharelog_core::{
    config::ConfigError, error::EngineError, protocol::RequestError, storage::StorageError,
};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Failed to load config: {source}"))]
    LoadConfig { source: ConfigError },

    #[snafu(display("{source}"))]
    InvalidLocation { source: StorageError },

    #[snafu(display(
        "Table {share}.{schema}.{name} is not in the catalog. \
         Add it to the `tables` list of the config file."
    ))]
    UnknownTable {
        share: String,
        schema: String,
        name: String,
    },

    #[snafu(display("Pass either --table <location> or all of --share, --schema and --name"))]
    NoTableGiven,

    #[snafu(display("Failed to open table {location}: {source}"))]
    OpenTable {
        location: String,
        source: StorageError,
    },

    #[snafu(display("Invalid request: {source}"))]
    Request { source: RequestError },

    #[snafu(display("{source}"))]
    Engine {
        #[snafu(source(from(EngineError, Box::new)))]
        source: Box<EngineError>,
    },

    #[snafu(display("Failed to encode output: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("Failed to write output: {source}"))]
    Write { source: std::io::Error },
}
