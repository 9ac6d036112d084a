// src/acquisition/recorder.rs
//! Batched CSV persistence of adapter output
//!
//! Each pushed matrix is transposed so that every sample becomes one CSV row
//! and every adapter row becomes one column. Rows are buffered and written
//! after `batch_size` pushes, or on [`CsvRecorder::flush`].

use crate::error::{TrignoError, TrignoResult};
use crate::hal::types::SampleMatrix;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct CsvRecorder {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: usize,
    batch_size: usize,
    label: Option<f64>,
    pending: Vec<Vec<f64>>,
    pushes_since_flush: usize,
    rows_written: u64,
}

impl fmt::Debug for CsvRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvRecorder")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("batch_size", &self.batch_size)
            .field("pending", &self.pending.len())
            .field("rows_written", &self.rows_written)
            .finish()
    }
}

impl CsvRecorder {
    /// Open `path` for appending; the header is written only into an empty file
    pub fn create<P: AsRef<Path>>(
        path: P,
        header: Vec<String>,
        batch_size: usize,
    ) -> TrignoResult<Self> {
        let path = path.as_ref().to_path_buf();
        if header.is_empty() {
            return Err(TrignoError::Configuration(
                "CSV header must name at least one column".to_string(),
            ));
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(&header)?;
            writer.flush()?;
        }

        info!("Recording to {} ({} columns)", path.display(), header.len());
        Ok(Self {
            path,
            writer,
            columns: header.len(),
            batch_size: batch_size.max(1),
            label: None,
            pending: Vec::new(),
            pushes_since_flush: 0,
            rows_written: 0,
        })
    }

    /// Append a constant trailing column to every row
    pub fn with_label(mut self, label: f64) -> Self {
        self.label = Some(label);
        self
    }

    /// Buffer one adapter read; flushes once `batch_size` reads are pending
    pub fn push(&mut self, matrix: &SampleMatrix) -> TrignoResult<()> {
        let columns = matrix.nrows() + usize::from(self.label.is_some());
        if columns != self.columns {
            return Err(TrignoError::Configuration(format!(
                "{} expects {} columns, got {}",
                self.path.display(),
                self.columns,
                columns
            )));
        }

        for sample in matrix.columns() {
            let mut row: Vec<f64> = sample.to_vec();
            if let Some(label) = self.label {
                row.push(label);
            }
            self.pending.push(row);
        }

        self.pushes_since_flush += 1;
        if self.pushes_since_flush >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write all buffered rows; returns how many were written
    pub fn flush(&mut self) -> TrignoResult<usize> {
        let rows = self.pending.len();
        for row in self.pending.drain(..) {
            self.writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        self.writer.flush()?;

        self.pushes_since_flush = 0;
        self.rows_written += rows as u64;
        if rows > 0 {
            debug!("Flushed {} rows to {}", rows, self.path.display());
        }
        Ok(rows)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
