use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

/// Reason carried alongside a rejected row: either a single short string or
/// a list of them (e.g. `["Codec error", detail]`).
#[derive(Debug, Clone)]
pub enum Reason {
    One(String),
    Many(Vec<String>),
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::One(s) => write!(f, "{}", s),
            Reason::Many(parts) => write!(f, "{}", parts.join(": ")),
        }
    }
}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        Reason::One(s.to_string())
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Reason::One(s)
    }
}

impl From<Vec<String>> for Reason {
    fn from(v: Vec<String>) -> Self {
        Reason::Many(v)
    }
}

/// External contract a row-rejection is handed to. Implementers supply an
/// appender backed by whatever storage they like; the loader only ever
/// writes through this trait.
pub trait RejectSink: Send + Sync {
    fn log(&self, reason: Reason, original_input_line: &[u8]);

    /// Human-readable location of persisted rejects, for log messages.
    fn reject_log(&self) -> &Path;
}

/// Default file-backed implementation: appends `reason\toriginal_line\n`
/// records to a single file.
pub struct FileRejectSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileRejectSink {
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl RejectSink for FileRejectSink {
    fn log(&self, reason: Reason, original_input_line: &[u8]) {
        let mut file = self.file.lock().expect("reject log mutex poisoned");
        let _ = write!(file, "{}\t", reason);
        let _ = file.write_all(original_input_line);
        let _ = file.write_all(b"\n");
    }

    fn reject_log(&self) -> &Path {
        &self.path
    }
}
