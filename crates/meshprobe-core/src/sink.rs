//! Result sinks. The durable one is [`CsvStore`], an append-only table shared across runs.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::dispatch::ResultRow;

/// The column header of the result table.
pub const HEADER: [&str; 7] = [
    "Source",
    "Dest",
    "Path",
    "Channel",
    "Number of Intermediate Nodes",
    "Throughput",
    "Timestamp",
];

/// A destination for result rows.
pub trait RowSink {
    /// Appends one row.
    fn append(&mut self, row: &ResultRow) -> Result<(), SinkError>;
}

impl<T: RowSink + ?Sized> RowSink for &mut T {
    fn append(&mut self, row: &ResultRow) -> Result<(), SinkError> {
        (**self).append(row)
    }
}

impl RowSink for Vec<ResultRow> {
    fn append(&mut self, row: &ResultRow) -> Result<(), SinkError> {
        self.push(row.clone());
        Ok(())
    }
}

/// An append-only CSV file.
///
/// The file is opened on the first append. If it did not exist (or was empty) at that moment, the
/// [`HEADER`] is written first; otherwise rows are appended after whatever is there, and the
/// existing header is left alone. Every row is flushed as soon as it is written, so a crash can
/// cost at most the row being written.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvStore {
    /// Creates a store backed by `path`. Nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Get a reference to the store's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<csv::Writer<File>, SinkError> {
        let fresh = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SinkError::Open {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(writer)
    }
}

impl RowSink for CsvStore {
    fn append(&mut self, row: &ResultRow) -> Result<(), SinkError> {
        let writer = match self.writer.take() {
            Some(w) => w,
            None => self.open()?,
        };
        let writer = self.writer.insert(writer);
        writer.write_record(record(row))?;
        writer.flush()?;
        Ok(())
    }
}

// Column order is fixed by `HEADER`.
fn record(row: &ResultRow) -> [String; 7] {
    [
        row.source.to_string(),
        row.destination.to_string(),
        row.path_string(),
        row.channel.to_string(),
        row.nr_intermediate.to_string(),
        row.throughput.to_string(),
        row.timestamp.clone(),
    ]
}

/// Persistence error.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The store could not be opened for appending.
    #[error("failed to open {path}")]
    Open {
        /// The store's path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A row could not be encoded or written.
    #[error("failed to write row")]
    Csv(#[from] csv::Error),

    /// A row could not be flushed.
    #[error("IO error")]
    Io(#[from] io::Error),
}
