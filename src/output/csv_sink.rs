use crate::model::Item;
use crate::output::traits::{RecordSink, SinkError, SinkResult};
use chrono::NaiveDate;
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// CSV record sink for one (site, date)
///
/// The file lives at `<root>/<site>/<site>_<YYYY-MM-DD>.csv` and is opened in
/// append mode. The header row is written only if the file was empty when
/// opened, so a second run on the same day adds rows under the existing
/// header.
pub struct CsvRecordSink {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    writer: csv::Writer<File>,
    written: u64,
}

impl CsvRecordSink {
    /// Opens (or creates) the record file for a site and date
    pub fn open(root: &Path, site: &str, date: NaiveDate) -> SinkResult<Self> {
        let dir = root.join(site);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let path = dir.join(Self::file_name(site, date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;

        let is_empty = file.metadata().map_err(|e| io_error(&path, e))?.len() == 0;
        let writer = WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);

        tracing::debug!(
            "Opened record file {} (header {})",
            path.display(),
            if is_empty { "pending" } else { "present" }
        );

        Ok(Self {
            path,
            inner: Mutex::new(Inner { writer, written: 0 }),
        })
    }

    /// `<site>_<YYYY-MM-DD>.csv`
    pub fn file_name(site: &str, date: NaiveDate) -> String {
        format!("{}_{}.csv", site, date.format("%Y-%m-%d"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl RecordSink for CsvRecordSink {
    fn append(&self, item: &Item) -> SinkResult<()> {
        let mut inner = self.inner.lock().map_err(|_| SinkError::Poisoned)?;
        inner.writer.serialize(item)?;
        inner
            .writer
            .flush()
            .map_err(|e| io_error(&self.path, e))?;
        inner.written += 1;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.inner.lock().map(|inner| inner.written).unwrap_or(0)
    }
}
