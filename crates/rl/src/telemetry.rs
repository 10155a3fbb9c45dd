use ml::{TracingLogger, TrainingLogger, UpdateReport};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PROGRESS_FILE: &str = "progress.jsonl";

/// Appends one JSON object per logged update to `<dir>/progress.jsonl` and
/// mirrors it to `tracing`.
pub struct JsonlLogger {
    path: PathBuf,
    writer: BufWriter<File>,
    mirror: TracingLogger,
}

impl JsonlLogger {
    /// Open (or create) the progress file under `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the directory or file cannot be created.
    pub fn new(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(PROGRESS_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            mirror: TracingLogger,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrainingLogger for JsonlLogger {
    fn log_update(&mut self, report: &UpdateReport) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.mirror.log_update(report)
    }
}
