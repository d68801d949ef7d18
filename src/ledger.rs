//! Append-only record of every combination already issued
//!
//! Each line of the log is `<combination key>|<edition>`. Keys themselves
//! contain `|`, so a line is split at its last `|`. The in-memory set is
//! rebuilt by replaying the log when the ledger is opened.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sampler::CombinationKey;

/// Error type for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to read ledger {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to append to ledger {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Set of registered combination keys backed by a durable log.
#[derive(Debug, Default)]
pub struct UniquenessLedger {
    keys: HashSet<CombinationKey>,
    highest_edition: u64,
    /// `None` for in-memory ledgers
    path: Option<PathBuf>,
}

impl UniquenessLedger {
    /// Open the log at `path`, replaying any existing entries.
    ///
    /// A missing file is an empty ledger; it is created on first
    /// registration. Lines that don't end in `|<edition>` are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut ledger = Self { path: Some(path.clone()), ..Default::default() };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ledger),
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| LedgerError::Read { path: path.clone(), source })?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((key, edition)) => {
                    ledger.highest_edition = ledger.highest_edition.max(edition);
                    ledger.keys.insert(key);
                }
                None => {
                    tracing::warn!(path = %path.display(), line = number + 1, "skipping malformed ledger entry");
                }
            }
        }

        tracing::debug!(path = %path.display(), entries = ledger.keys.len(), "ledger loaded");
        Ok(ledger)
    }

    /// Ledger with no backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_unique(&self, key: &CombinationKey) -> bool {
        !self.keys.contains(key)
    }

    pub fn contains(&self, key: &CombinationKey) -> bool {
        self.keys.contains(key)
    }

    /// Record `key` as issued to `edition`.
    ///
    /// The log line is appended and synced before the key joins the
    /// in-memory set. Registering a known key is a no-op.
    pub fn register(&mut self, key: &CombinationKey, edition: u64) -> Result<(), LedgerError> {
        if self.keys.contains(key) {
            return Ok(());
        }

        if let Some(path) = &self.path {
            append_line(path, &format!("{}|{}", key, edition))
                .map_err(|source| LedgerError::Append { path: path.clone(), source })?;
        }

        self.keys.insert(key.clone());
        self.highest_edition = self.highest_edition.max(edition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest edition number seen in the log, 0 if none.
    pub fn highest_edition(&self) -> u64 {
        self.highest_edition
    }
}

fn parse_line(line: &str) -> Option<(CombinationKey, u64)> {
    let (key, edition) = line.rsplit_once('|')?;
    if key.is_empty() {
        return None;
    }
    let edition = edition.trim().parse().ok()?;
    Some((CombinationKey::from_raw(key), edition))
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.sync_all()
}
