//! Writing engine results to stdout.

use std::io::{self, Write};

use futures::StreamExt;
use serde::Serialize;
use sharelog_core::protocol::ResponseStream;
use snafu::ResultExt;

use crate::error::{CliResult, EncodeSnafu, EngineSnafu, WriteSnafu};

/// Copy a line-delimited response to stdout as lines arrive.
pub async fn write_stream(mut lines: ResponseStream) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut count = 0usize;
    while let Some(line) = lines.next().await {
        let line = line.context(EngineSnafu)?;
        out.write_all(line.as_bytes()).context(WriteSnafu)?;
        count += 1;
    }
    out.flush().context(WriteSnafu)?;
    log::debug!("wrote {count} response lines");
    Ok(())
}

/// Print `value` as one JSON document.
pub fn write_json<T: Serialize>(value: &T, pretty: bool) -> CliResult<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context(EncodeSnafu)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{text}").context(WriteSnafu)?;
    out.flush().context(WriteSnafu)
}
