/// Durable record of log files that were already uploaded.
///
/// The on-disk form is an append-only, newline-delimited list of basenames
/// (`uploaded_logs.txt`). It is read fully into memory at startup and only ever
/// appended to afterwards; it is never rewritten or compacted.
///
/// One mutex guards the in-memory set, the set of names currently being
/// uploaded, and the file append, so "is this name known, and if not, claim it"
/// is a single critical section. No other lock is taken while it is held.
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::LedgerError;

pub struct PersistedLedger {
    path: PathBuf,
    inner: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    uploaded: HashSet<String>,
    /// Claimed by an upload task that has not finished yet.
    in_flight: HashSet<String>,
}

impl PersistedLedger {
    /// Loads every name from `path`. A missing file is an empty ledger; an
    /// unreadable one is logged and also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let uploaded = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), "could not read ledger file: {e}");
                HashSet::new()
            }
        };
        tracing::info!("loaded {} previously uploaded logs", uploaded.len());

        Self {
            path,
            inner: Mutex::new(LedgerState {
                uploaded,
                in_flight: HashSet::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().uploaded.contains(name)
    }

    pub fn len(&self) -> usize {
        self.state().uploaded.len()
    }

    /// Records `name` as uploaded. Idempotent: a known name is not appended again.
    ///
    /// The in-memory record takes effect even when the disk append fails, so
    /// the name is skipped for the rest of this process but may be uploaded
    /// again after a restart.
    pub fn add(&self, name: &str) -> Result<(), LedgerError> {
        let mut state = self.state();
        self.record(&mut state, name)
    }

    /// Claims `name` for upload. Returns `None` if it was already uploaded or
    /// another task holds a claim on it.
    pub fn claim(&self, name: &str) -> Option<Claim<'_>> {
        let mut state = self.state();
        if state.uploaded.contains(name) || state.in_flight.contains(name) {
            return None;
        }
        state.in_flight.insert(name.to_string());
        Some(Claim {
            ledger: self,
            name: name.to_string(),
            settled: false,
        })
    }

    fn record(&self, state: &mut LedgerState, name: &str) -> Result<(), LedgerError> {
        state.in_flight.remove(name);
        if !state.uploaded.insert(name.to_string()) {
            return Ok(());
        }
        self.append(name).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn append(&self, name: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{name}")
    }

    fn release(&self, name: &str) {
        self.state().in_flight.remove(name);
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive right to upload one file. Dropping it without [`Claim::commit`]
/// releases the name so a later scan can try again.
pub struct Claim<'a> {
    ledger: &'a PersistedLedger,
    name: String,
    settled: bool,
}

impl Claim<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Moves the claimed name into the uploaded set and appends it to disk.
    pub fn commit(mut self) -> Result<(), LedgerError> {
        self.settled = true;
        let mut state = self.ledger.state();
        self.ledger.record(&mut state, &self.name)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.release(&self.name);
        }
    }
}
