//! Caller-layer request parameters and their validation.
//!
//! These types are what an HTTP handler (or the CLI) deserializes from a
//! request before calling the engine. They apply the caller-side rules: the
//! default page size, the hard row cap, ISO-8601 timestamp parsing and
//! ordered ranges.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

use crate::changes::ChangeRange;
use crate::config::EngineConfig;
use crate::query::QueryRequest;
use crate::transaction_log::Cutoff;

/// Invalid request parameters.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RequestError {
    /// A timestamp parameter is not ISO-8601.
    #[snafu(display("Invalid timestamp {value:?}: expected ISO-8601 (e.g. 2024-01-31T12:00:00Z)"))]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A range's start lies after its end.
    #[snafu(display("Invalid {kind} range: start {start} is after end {end}"))]
    InvalidRange {
        /// `version` or `timestamp`.
        kind: String,
        /// Start bound as given.
        start: String,
        /// End bound as given.
        end: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, a naive date-time (taken as UTC) and a
/// bare date (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RequestError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .context(InvalidTimestampSnafu { value })
}

fn parse_optional(value: Option<&str>) -> Result<Option<DateTime<Utc>>, RequestError> {
    value.map(parse_timestamp).transpose()
}

/// Parse `timestamp` only when no version decides the request.
fn timestamp_unless_version(
    version: Option<u64>,
    timestamp: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RequestError> {
    match (version, timestamp) {
        (Some(v), Some(ts)) => {
            debug!("version {v} given; not parsing timestamp {ts:?}");
            Ok(None)
        }
        (Some(_), None) => Ok(None),
        (None, ts) => parse_optional(ts),
    }
}

/// Parameters of a row query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Requested page size; capped at the configured maximum.
    pub limit_hint: Option<usize>,
    /// Rows to skip.
    pub offset: Option<usize>,
    /// Resolve at this version.
    pub version: Option<u64>,
    /// Resolve at this time (ISO-8601); ignored when `version` is set.
    pub timestamp: Option<String>,
}

impl QueryParams {
    /// Apply defaults and caps from `config` and parse the cutoff.
    pub fn into_request(self, config: &EngineConfig) -> Result<QueryRequest, RequestError> {
        let timestamp = timestamp_unless_version(self.version, self.timestamp.as_deref())?;
        Ok(QueryRequest {
            limit: self
                .limit_hint
                .unwrap_or(config.default_limit)
                .min(config.max_rows_per_query),
            offset: self.offset.unwrap_or(0),
            cutoff: Cutoff::from_parts(self.version, timestamp),
        })
    }
}

/// Parameters of a table snapshot request (file manifest or state).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotParams {
    /// Resolve at this version.
    pub version: Option<u64>,
    /// Resolve at this time (ISO-8601); ignored when `version` is set.
    pub timestamp: Option<String>,
}

impl SnapshotParams {
    /// Parse into a cutoff, `None` for the latest version.
    pub fn into_cutoff(self) -> Result<Option<Cutoff>, RequestError> {
        let timestamp = timestamp_unless_version(self.version, self.timestamp.as_deref())?;
        Ok(Cutoff::from_parts(self.version, timestamp))
    }
}

/// Parameters of a change data feed request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeParams {
    /// First version to include.
    pub starting_version: Option<u64>,
    /// Last version to include.
    pub ending_version: Option<u64>,
    /// Earliest commit time to include (ISO-8601).
    pub starting_timestamp: Option<String>,
    /// Latest commit time to include (ISO-8601).
    pub ending_timestamp: Option<String>,
}

impl ChangeParams {
    /// Validate and convert into a range; `None` means every commit.
    ///
    /// Any version bound decides the range; the timestamps are then neither
    /// parsed nor checked.
    pub fn into_range(self) -> Result<Option<ChangeRange>, RequestError> {
        if self.starting_version.is_some() || self.ending_version.is_some() {
            if let (Some(start), Some(end)) = (self.starting_version, self.ending_version) {
                ensure!(
                    start <= end,
                    InvalidRangeSnafu {
                        kind: "version",
                        start: start.to_string(),
                        end: end.to_string(),
                    }
                );
            }
            if self.starting_timestamp.is_some() || self.ending_timestamp.is_some() {
                debug!("version bounds given; ignoring the timestamp bounds");
            }
            return Ok(ChangeRange::from_parts(
                self.starting_version,
                self.ending_version,
                None,
                None,
            ));
        }

        let starting_timestamp = parse_optional(self.starting_timestamp.as_deref())?;
        let ending_timestamp = parse_optional(self.ending_timestamp.as_deref())?;
        if let (Some(start), Some(end)) = (starting_timestamp, ending_timestamp) {
            ensure!(
                start <= end,
                InvalidRangeSnafu {
                    kind: "timestamp",
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                }
            );
        }

        Ok(ChangeRange::from_parts(
            None,
            None,
            starting_timestamp,
            ending_timestamp,
        ))
    }
}
