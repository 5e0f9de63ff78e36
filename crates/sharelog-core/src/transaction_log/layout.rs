//! On-disk naming conventions of the transaction log.
//!
//! Commits live under `<table root>/_delta_log/` as
//! `00000000000000000003.json`: the version as exactly twenty zero-padded
//! decimal digits plus a `.json` suffix. Anything else in that directory
//! (checkpoints, temp files, CRCs) is ignored by the lister.

/// Name of the log directory beneath a table root.
pub const LOG_DIR_NAME: &str = "_delta_log";

/// Width of the zero-padded version in a commit file name.
pub const COMMIT_FILENAME_DIGITS: usize = 20;

/// Path segment marking files in the dedicated change-data directory.
pub const CHANGE_DATA_MARKER: &str = "_change_data";

const COMMIT_SUFFIX: &str = ".json";

/// File name of the commit at `version`, e.g. `00000000000000000003.json`.
pub fn commit_file_name(version: u64) -> String {
    format!("{version:0width$}{COMMIT_SUFFIX}", width = COMMIT_FILENAME_DIGITS)
}

/// Path of the commit at `version`, relative to the table root.
pub fn commit_rel_path(version: u64) -> String {
    format!("{LOG_DIR_NAME}/{}", commit_file_name(version))
}

/// Extract the version from a commit file name, or `None` if the name does
/// not follow the commit naming pattern.
pub fn parse_commit_version(file_name: &str) -> Option<u64> {
    let digits = file_name.strip_suffix(COMMIT_SUFFIX)?;
    if digits.len() != COMMIT_FILENAME_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True when `path` lives under the change-data directory.
pub fn is_change_data_path(path: &str) -> bool {
    path.split('/').any(|segment| segment == CHANGE_DATA_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_names_round_trip() {
        assert_eq!(commit_file_name(3), "00000000000000000003.json");
        assert_eq!(
            commit_rel_path(12),
            "_delta_log/00000000000000000012.json"
        );
        assert_eq!(parse_commit_version("00000000000000000012.json"), Some(12));
    }

    #[test]
    fn non_commit_names_are_rejected() {
        for name in [
            "00000000000000000001.checkpoint.parquet",
            "0000000000000000001.json",
            "000000000000000000001.json",
            "0000000000000000000a.json",
            "_last_checkpoint",
            ".00000000000000000001.json.tmp",
            "+0000000000000000001.json",
        ] {
            assert_eq!(parse_commit_version(name), None, "{name}");
        }
    }

    #[test]
    fn change_data_marker_matches_whole_segments() {
        assert!(is_change_data_path("_change_data/cdc-0.parquet"));
        assert!(is_change_data_path("year=2024/_change_data/cdc-0.parquet"));
        assert!(!is_change_data_path("my_change_data_file.parquet"));
    }
}
