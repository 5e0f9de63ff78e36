//! Core engine for sharing tables stored in an append-only JSON commit log.
//!
//! This crate provides the read side of a table-sharing service:
//!
//! - Transaction-log replay into the set of active data files, schema and
//!   version of a table, optionally as of a past version or timestamp
//!   (`transaction_log` module).
//! - Change data feed extraction between two versions or timestamps
//!   (`changes` module).
//! - Paged row queries over the active files (`query` module).
//! - Streamed, line-delimited protocol manifests with signed file URLs
//!   (`protocol` module).
//! - A backend-agnostic storage contract with local and in-memory
//!   implementations, an explicit backend registry and a signed-URL cache
//!   (`storage` module).
//!
//! The engine never writes tables, holds no state across calls except the
//! caller-owned URL cache, and rebuilds table state from the log on every
//! request. Transport, authentication and the real catalog service are left
//! to the calling layer; the `sharelog` CLI is one such caller.
#![warn(missing_docs)]
pub mod catalog;
pub mod changes;
pub mod config;
pub mod error;
pub mod protocol;
pub mod query;
pub mod storage;
pub mod table;
pub mod transaction_log;

#[cfg(test)]
pub(crate) mod test_util;
