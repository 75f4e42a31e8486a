//! Record store with optimistic concurrency control.
//!
//! [`MemoryRecordStore`] holds the authoritative record table under a single
//! exclusive lock. Reads return the stored value together with a
//! [`ReadProof`] capturing exactly what was observed; writes apply only if
//! the table still holds that observed value. Both the comparison and the
//! mutation happen under one lock acquisition, so no two concurrent writes
//! for the same identifier can both observe a stale match.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use crate::error::{RecordStoreError, StoreResult};
use crate::record::{RecordId, UserRecord};
use crate::snapshot;

/// Opaque witness of the record value observed by a prior read.
///
/// Pass the proof from a [`RecordStore::get_record`] call to the immediately
/// following [`RecordStore::write_record`] for the same identifier. The
/// proof is a value snapshot, not a version counter: two reads that observed
/// an identical value are indistinguishable.
#[derive(Debug, Clone)]
pub struct ReadProof {
    observed: Option<UserRecord>,
}

impl ReadProof {
    /// Proof that no record existed at read time.
    const fn absent() -> Self {
        Self { observed: None }
    }

    /// Proof capturing the exact record value read.
    fn of(record: &UserRecord) -> Self {
        Self {
            observed: Some(record.clone()),
        }
    }
}

/// A table of per-user registration records with conditional writes.
///
/// Callers follow a strict read-compute-write cycle: read a record and its
/// proof, derive a new record, then write it back under that proof. A
/// conflicting interleaved write surfaces as [`RecordStoreError::Conflict`];
/// retry policy belongs entirely to the caller.
pub trait RecordStore: Send + Sync {
    /// Reads the record for `id`.
    ///
    /// Identifiers never written return the default `NotRegistered` record
    /// and a proof of absence.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Lock`] if the record table mutex is
    /// poisoned.
    fn get_record(&self, id: &RecordId) -> StoreResult<(UserRecord, ReadProof)>;

    /// Replaces the record for `id` with `record`, iff the table still holds
    /// the value captured by `proof`.
    ///
    /// There is no delete operation; deletion is modeled by writing
    /// `NotRegistered`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Conflict`] if the stored record changed
    /// since the paired read, leaving the table untouched, or
    /// [`RecordStoreError::Lock`] if the record table mutex is poisoned.
    fn write_record(&self, id: &RecordId, record: UserRecord, proof: ReadProof)
        -> StoreResult<()>;
}

/// In-memory record store, optionally mirrored to a snapshot file.
///
/// The in-memory table is the source of truth. When a snapshot path is
/// configured the full table is rewritten after every successful write and
/// reloaded at construction; persistence failures are logged and swallowed,
/// never surfaced to the writer.
pub struct MemoryRecordStore {
    records: Mutex<HashMap<RecordId, UserRecord>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryRecordStore {
    /// Creates an empty store with no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Creates a store mirrored to the snapshot file at `path`, loading any
    /// records the file already holds.
    ///
    /// A missing file starts the store empty. An unreadable or corrupt file
    /// is logged and also starts the store empty; individual malformed
    /// records are skipped with a warning while the rest load normally.
    #[must_use]
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match snapshot::load(&path) {
            Ok(loaded) => {
                for skipped in &loaded.skipped {
                    warn!(
                        id = %skipped.id,
                        error = %skipped.reason,
                        "skipping malformed snapshot record"
                    );
                }
                info!(
                    count = loaded.records.len(),
                    path = %path.display(),
                    "loaded records from snapshot"
                );
                loaded.records
            }
            Err(err) => {
                warn!(
                    error = %err,
                    path = %path.display(),
                    "could not load snapshot, starting empty"
                );
                HashMap::new()
            }
        };
        Self {
            records: Mutex::new(records),
            snapshot_path: Some(path),
        }
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Lock`] if the record table mutex is
    /// poisoned.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock_records()?.len())
    }

    /// Returns `true` if no records are stored.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Lock`] if the record table mutex is
    /// poisoned.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock_records()?.is_empty())
    }

    fn lock_records(&self) -> StoreResult<MutexGuard<'_, HashMap<RecordId, UserRecord>>> {
        self.records
            .lock()
            .map_err(|_| RecordStoreError::Lock("record table mutex poisoned".to_owned()))
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecordStore")
            .field("snapshot_path", &self.snapshot_path)
            .finish_non_exhaustive()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get_record(&self, id: &RecordId) -> StoreResult<(UserRecord, ReadProof)> {
        let records = self.lock_records()?;
        Ok(records.get(id).map_or_else(
            || (UserRecord::default(), ReadProof::absent()),
            |record| (record.clone(), ReadProof::of(record)),
        ))
    }

    fn write_record(
        &self,
        id: &RecordId,
        record: UserRecord,
        proof: ReadProof,
    ) -> StoreResult<()> {
        let mut records = self.lock_records()?;

        let unchanged = match (records.get(id), proof.observed.as_ref()) {
            (None, None) => true,
            (Some(current), Some(observed)) => current == observed,
            _ => false,
        };
        if !unchanged {
            return Err(RecordStoreError::Conflict);
        }

        records.insert(id.clone(), record);

        // Best-effort mirror: the in-memory table stays authoritative even
        // when the snapshot write fails.
        if let Some(path) = &self.snapshot_path {
            if let Err(err) = snapshot::save(path, &records) {
                warn!(
                    error = %err,
                    path = %path.display(),
                    "failed to persist snapshot after write"
                );
            }
        }
        Ok(())
    }
}
