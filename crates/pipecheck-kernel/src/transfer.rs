//! Dataset transfer count check over captured command output.

use regex::Regex;
use std::io::{BufRead, Write};
use std::sync::OnceLock;

/// Which command produced the output being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSource {
    /// `butler transfer-from-graph`
    TransferFromGraph,
    /// `butler aggregate-graph`
    AggregateGraph,
}

impl TransferSource {
    fn pattern(self) -> &'static Regex {
        static TRANSFER: OnceLock<Regex> = OnceLock::new();
        static AGGREGATE: OnceLock<Regex> = OnceLock::new();
        match self {
            Self::TransferFromGraph => TRANSFER.get_or_init(|| {
                Regex::new(r"Number of datasets transferred: (?P<n>\d+)")
                    .expect("transfer regex must compile")
            }),
            Self::AggregateGraph => AGGREGATE.get_or_init(|| {
                Regex::new(r"Ingested (?P<n>\d+) dataset\(s\)")
                    .expect("aggregate regex must compile")
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferCountError {
    #[error("{found} datasets transferred; expected {expected}.")]
    Mismatch { found: u64, expected: u64 },

    #[error("Transferred dataset count not found in output.")]
    NotFound,

    #[error("line {line}: unreadable count `{text}`")]
    BadCount { line: usize, text: String },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Scan `input` for the transfer summary line, echoing every line to `echo`.
///
/// Every summary line must report `expected`; the first one that doesn't
/// fails immediately. Returns the number of summary lines seen.
pub fn check_transfer_count(
    input: impl BufRead,
    echo: &mut impl Write,
    expected: u64,
    source: TransferSource,
) -> Result<usize, TransferCountError> {
    let pattern = source.pattern();
    let mut found = 0usize;
    for (line_no, line) in input.lines().enumerate() {
        let line = line.map_err(|e| TransferCountError::Io(e.to_string()))?;
        writeln!(echo, "{line}").map_err(|e| TransferCountError::Io(e.to_string()))?;
        let Some(captures) = pattern.captures(&line) else {
            continue;
        };
        let text = &captures["n"];
        let n: u64 = text.parse().map_err(|_| TransferCountError::BadCount {
            line: line_no + 1,
            text: text.to_string(),
        })?;
        if n != expected {
            return Err(TransferCountError::Mismatch { found: n, expected });
        }
        log::debug!("line {}: {n} datasets as expected", line_no + 1);
        found += 1;
    }
    if found == 0 {
        return Err(TransferCountError::NotFound);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        text: &str,
        expected: u64,
        source: TransferSource,
    ) -> (Result<usize, TransferCountError>, String) {
        let mut echo = Vec::new();
        let result = check_transfer_count(text.as_bytes(), &mut echo, expected, source);
        (result, String::from_utf8(echo).expect("echo is utf-8"))
    }

    #[test]
    fn accepts_matching_transfer_count_and_echoes_input() {
        let text = "lsst.daf.butler INFO: start\nNumber of datasets transferred: 42\n";
        let (result, echo) = run(text, 42, TransferSource::TransferFromGraph);
        assert_eq!(result.expect("count should match"), 1);
        assert_eq!(echo, text);
    }

    #[test]
    fn rejects_mismatched_count() {
        let (result, _) = run(
            "Number of datasets transferred: 41\n",
            42,
            TransferSource::TransferFromGraph,
        );
        match result {
            Err(TransferCountError::Mismatch { found, expected }) => {
                assert_eq!((found, expected), (41, 42));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_summary_is_not_found() {
        let (result, _) = run("nothing here\n", 1, TransferSource::TransferFromGraph);
        assert!(matches!(result, Err(TransferCountError::NotFound)));
    }

    #[test]
    fn aggregate_mode_uses_ingest_pattern() {
        let text = "Ingested 17 dataset(s)\n";
        assert_eq!(run(text, 17, TransferSource::AggregateGraph).0.expect("match"), 1);
        assert!(matches!(
            run(text, 17, TransferSource::TransferFromGraph).0,
            Err(TransferCountError::NotFound)
        ));
    }

    #[test]
    fn overflowing_count_is_reported() {
        let (result, _) = run(
            "Number of datasets transferred: 99999999999999999999999\n",
            1,
            TransferSource::TransferFromGraph,
        );
        assert!(matches!(result, Err(TransferCountError::BadCount { line: 1, .. })));
    }
}
