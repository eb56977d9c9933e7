//! Study descriptors, byte sources and the sequential study loader
//!
//! Files are fetched one at a time, each under a timeout, and decoded on the
//! calling thread. A file that cannot be fetched or decoded leaves an empty
//! slot in the [`SliceStore`]; the rest of the study still loads.

use crate::dicom::{self, DecodeError};
use crate::store::SliceStore;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Descriptor file looked up inside a study directory
pub const DESCRIPTOR_FILE: &str = "study.json";

pub const DEFAULT_MAX_FILES: usize = 50;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Patient/study metadata plus the ordered file ids of one study
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyDescriptor {
    pub study_id: String,
    pub patient_name: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub patient_age: Option<String>,
    pub patient_gender: Option<String>,
    pub modality: Option<String>,
    pub status: Option<String>,
    pub file_ids: Vec<String>,
    pub notes: Option<String>,
}

/// Ages arrive either as JSON numbers or strings
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Number(serde_json::Number),
        Text(String),
    }

    Ok(Option::<Value>::deserialize(deserializer)?.map(|v| match v {
        Value::Number(n) => n.to_string(),
        Value::Text(s) => s,
    }))
}

#[derive(Debug, Error)]
pub enum StudyLoadError {
    #[error("Study {0} not found")]
    NotFound(String),

    #[error("Failed to read study {study_id}: {message}")]
    Source { study_id: String, message: String },

    #[error("Invalid study descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Study {0} lists no files")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileFetchError {
    #[error("File {0} not found")]
    NotFound(String),

    #[error("Failed to read {file_id}: {message}")]
    Io { file_id: String, message: String },

    #[error("Fetching {file_id} timed out after {timeout:?}")]
    TimedOut { file_id: String, timeout: Duration },

    #[error("Load cancelled")]
    Cancelled,

    #[error("Source failure: {0}")]
    Source(String),
}

/// Where study descriptors and file bytes come from
pub trait StudySource: Send + Sync {
    fn descriptor(&self, study_id: &str) -> Result<StudyDescriptor, StudyLoadError>;

    fn fetch(&self, file_id: &str) -> Result<Vec<u8>, FileFetchError>;
}

/// A study stored as one directory
///
/// `study.json` supplies the descriptor when present; otherwise every `.dcm`
/// file in the directory is used, in file name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self, study_id: &str) -> Result<StudyDescriptor, StudyLoadError> {
        let source_error = |e: io::Error| StudyLoadError::Source {
            study_id: study_id.to_string(),
            message: e.to_string(),
        };

        let mut file_ids: Vec<String> = fs::read_dir(&self.root)
            .map_err(source_error)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        file_ids.sort();

        Ok(StudyDescriptor {
            study_id: study_id.to_string(),
            file_ids,
            ..StudyDescriptor::default()
        })
    }
}

impl StudySource for DirectorySource {
    fn descriptor(&self, study_id: &str) -> Result<StudyDescriptor, StudyLoadError> {
        if !self.root.is_dir() {
            return Err(StudyLoadError::NotFound(self.root.display().to_string()));
        }

        let path = self.root.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return self.scan(study_id);
        }

        let text = fs::read_to_string(&path).map_err(|e| StudyLoadError::Source {
            study_id: study_id.to_string(),
            message: format!("{}: {e}", path.display()),
        })?;
        let mut descriptor: StudyDescriptor = serde_json::from_str(&text)
            .map_err(|e| StudyLoadError::InvalidDescriptor(format!("{}: {e}", path.display())))?;
        if descriptor.study_id.is_empty() {
            descriptor.study_id = study_id.to_string();
        }
        Ok(descriptor)
    }

    fn fetch(&self, file_id: &str) -> Result<Vec<u8>, FileFetchError> {
        // Ids name files directly inside the study directory
        let name = Path::new(file_id);
        if name.components().count() != 1 || name.file_name().is_none() {
            return Err(FileFetchError::NotFound(file_id.to_string()));
        }

        fs::read(self.root.join(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileFetchError::NotFound(file_id.to_string()),
            _ => FileFetchError::Io {
                file_id: file_id.to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// In-memory study, for demos and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    descriptor: StudyDescriptor,
    files: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
}

impl MemorySource {
    #[must_use]
    pub fn new(study_id: &str) -> Self {
        Self {
            descriptor: StudyDescriptor {
                study_id: study_id.to_string(),
                ..StudyDescriptor::default()
            },
            ..Self::default()
        }
    }

    /// Source for `descriptor` without any file content yet
    #[must_use]
    pub fn with_descriptor(descriptor: StudyDescriptor) -> Self {
        Self {
            descriptor,
            ..Self::default()
        }
    }

    /// Append a file to the study
    pub fn add_file(&mut self, file_id: &str, bytes: Vec<u8>) {
        self.descriptor.file_ids.push(file_id.to_string());
        self.files.insert(file_id.to_string(), bytes);
    }

    /// List a file id that has no content
    pub fn add_missing(&mut self, file_id: &str) {
        self.descriptor.file_ids.push(file_id.to_string());
    }

    /// Hold every fetch of `file_id` for `delay`
    pub fn delay(&mut self, file_id: &str, delay: Duration) {
        self.delays.insert(file_id.to_string(), delay);
    }

    pub fn descriptor_mut(&mut self) -> &mut StudyDescriptor {
        &mut self.descriptor
    }
}

impl StudySource for MemorySource {
    fn descriptor(&self, study_id: &str) -> Result<StudyDescriptor, StudyLoadError> {
        if study_id != self.descriptor.study_id {
            return Err(StudyLoadError::NotFound(study_id.to_string()));
        }
        Ok(self.descriptor.clone())
    }

    fn fetch(&self, file_id: &str) -> Result<Vec<u8>, FileFetchError> {
        if let Some(delay) = self.delays.get(file_id) {
            thread::sleep(*delay);
        }
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| FileFetchError::NotFound(file_id.to_string()))
    }
}

/// Shared flag that stops a load between two fetches
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    Fetch(FileFetchError),
    Decode(DecodeError),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Fetch(e) => write!(f, "{e}"),
            FailureCause::Decode(e) => write!(f, "{e}"),
        }
    }
}

/// One file that did not produce a slice
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub index: usize,
    pub file_id: String,
    pub cause: FailureCause,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadReport {
    /// Files listed by the descriptor
    pub expected: usize,
    /// Files the loader tried (capped, and short of the cap when cancelled)
    pub attempted: usize,
    pub loaded: usize,
    pub failures: Vec<LoadFailure>,
    pub cancelled: bool,
}

impl LoadReport {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.loaded < self.expected
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loaded {} of {} files", self.loaded, self.expected)?;
        if self.attempted < self.expected {
            write!(f, " ({} attempted)", self.attempted)?;
        }
        if self.cancelled {
            f.write_str(", cancelled")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedStudy {
    pub descriptor: StudyDescriptor,
    pub store: SliceStore,
    pub report: LoadReport,
}

/// Sequential, capped study loader
#[derive(Clone)]
pub struct StudyLoader {
    source: Arc<dyn StudySource>,
    max_files: usize,
    timeout: Duration,
    cancel: CancelToken,
}

impl fmt::Debug for StudyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyLoader")
            .field("max_files", &self.max_files)
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StudyLoader {
    pub fn new(source: Arc<dyn StudySource>) -> Self {
        Self {
            source,
            max_files: DEFAULT_MAX_FILES,
            timeout: DEFAULT_FETCH_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }

    /// Load at most `max_files` files (at least one)
    #[must_use]
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch the descriptor, then fetch and decode its files in order
    pub fn load(&self, study_id: &str) -> Result<LoadedStudy, StudyLoadError> {
        self.load_with_progress(study_id, |_, _| {})
    }

    /// Like [`load`](Self::load), calling `progress(done, total)` after
    /// every file
    pub fn load_with_progress<F>(&self, study_id: &str, mut progress: F) -> Result<LoadedStudy, StudyLoadError>
    where
        F: FnMut(usize, usize),
    {
        let descriptor = self.source.descriptor(study_id)?;
        if descriptor.file_ids.is_empty() {
            return Err(StudyLoadError::Empty(descriptor.study_id));
        }

        let expected = descriptor.file_ids.len();
        let total = expected.min(self.max_files);
        if total < expected {
            info!("Study {study_id} lists {expected} files, loading the first {total}");
        }

        let mut store = SliceStore::new();
        let mut report = LoadReport {
            expected,
            ..LoadReport::default()
        };

        for (index, file_id) in descriptor.file_ids.iter().take(total).enumerate() {
            if self.cancel.is_cancelled() {
                info!("Loading of study {study_id} cancelled after {index} files");
                report.cancelled = true;
                break;
            }
            report.attempted += 1;

            let outcome = self
                .fetch_with_timeout(file_id)
                .map_err(FailureCause::Fetch)
                .and_then(|bytes| dicom::decode(&bytes).map_err(FailureCause::Decode));

            match outcome {
                Ok(slice) => {
                    debug!(index, file_id, "Decoded {}", slice.dimensions());
                    store.push(slice);
                    report.loaded += 1;
                }
                Err(cause) => {
                    warn!(study = study_id, index, file_id, "Skipping file: {cause}");
                    store.push_missing();
                    report.failures.push(LoadFailure {
                        index,
                        file_id: file_id.clone(),
                        cause,
                    });
                }
            }
            progress(index + 1, total);
        }

        info!("Study {study_id}: {report}");
        Ok(LoadedStudy {
            descriptor,
            store,
            report,
        })
    }

    /// Run one fetch on a worker thread and wait at most the timeout
    ///
    /// A fetch that overruns is abandoned; its thread finishes on its own.
    fn fetch_with_timeout(&self, file_id: &str) -> Result<Vec<u8>, FileFetchError> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let id = file_id.to_string();
        thread::Builder::new()
            .name(format!("fetch-{file_id}"))
            .spawn(move || {
                // The receiver is gone when the fetch timed out
                let _ = tx.send(source.fetch(&id));
            })
            .map_err(|e| FileFetchError::Source(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(FileFetchError::TimedOut {
                file_id: file_id.to_string(),
                timeout: self.timeout,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(FileFetchError::Source(format!("fetch worker for {file_id} exited")))
            }
        }
    }
}
