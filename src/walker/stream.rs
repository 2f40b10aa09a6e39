//! The pull-based record stream returned by the walker.

use crate::cancellation::CancellationToken;
use crate::core_types::FileRecord;
use crate::errors::{Error, Result};

/// A finite, restartable-per-invocation stream of discovered records.
///
/// Yields `Ok(FileRecord)` in the walker's deterministic order. Once the
/// cancellation token fires, the next pull yields a single
/// [`Error::ScanAborted`] and the stream ends; no records follow the
/// signal.
pub struct ScanStream {
    records: std::vec::IntoIter<FileRecord>,
    token: CancellationToken,
    /// The walk itself was cut short by cancellation.
    walk_cancelled: bool,
    aborted: bool,
}

impl ScanStream {
    pub(super) fn new(
        records: Vec<FileRecord>,
        token: CancellationToken,
        walk_cancelled: bool,
    ) -> Self {
        Self {
            records: records.into_iter(),
            token,
            walk_cancelled,
            aborted: false,
        }
    }

    /// Builds a stream over records the caller already owns (used by the
    /// `format` entry points, which skip discovery).
    pub fn from_records(records: Vec<FileRecord>, token: CancellationToken) -> Self {
        Self::new(records, token, false)
    }

    /// Number of records remaining, when nothing has been cancelled.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    /// `(path, size)` of every record still queued, in order. Used to
    /// build format headers before the records are consumed.
    pub fn entries(&self) -> Vec<(String, u64)> {
        self.records
            .as_slice()
            .iter()
            .map(|record| (record.path.clone(), record.size))
            .collect()
    }
}

impl Iterator for ScanStream {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.aborted {
            return None;
        }
        if self.walk_cancelled || self.token.is_cancelled() {
            self.aborted = true;
            return Some(Err(Error::ScanAborted));
        }
        self.records.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(path: &str) -> FileRecord {
        FileRecord::new(path.into(), PathBuf::from("/base").join(path), 0, None)
    }

    #[test]
    fn yields_records_then_ends() {
        let stream = ScanStream::from_records(
            vec![record("a.txt"), record("b.txt")],
            CancellationToken::new(),
        );
        let paths: Vec<_> = stream.map(|r| r.unwrap().path).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn cancellation_mid_stream_aborts_once() {
        let token = CancellationToken::new();
        let mut stream =
            ScanStream::from_records(vec![record("a.txt"), record("b.txt")], token.clone());
        assert!(stream.next().unwrap().is_ok());
        token.cancel();
        assert!(matches!(stream.next(), Some(Err(Error::ScanAborted))));
        assert!(stream.next().is_none());
    }
}
