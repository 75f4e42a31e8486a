//! Snapshot file I/O.
//!
//! A snapshot is the full record table serialized to a single JSON document,
//! used for restart recovery only; it is not a transaction log. Saves
//! rewrite the whole file atomically (write to a sibling temp file, fsync,
//! rename) so a crash mid-save never corrupts the previous snapshot. The
//! file holds private key material, so it is created owner-readable only.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{RecordStoreError, StoreResult};
use crate::persist::{PersistedRecord, PersistedTable};
use crate::record::{RecordId, UserRecord};

/// Outcome of loading a snapshot file.
#[derive(Debug, Default)]
pub struct SnapshotLoad {
    /// Records that decoded successfully.
    pub records: HashMap<RecordId, UserRecord>,
    /// Entries that were skipped, with the reason each failed to decode.
    pub skipped: Vec<SkippedRecord>,
}

/// A snapshot entry that failed to decode and was dropped from the load.
#[derive(Debug)]
pub struct SkippedRecord {
    /// Identifier string of the offending entry.
    pub id: String,
    /// Why the entry failed to decode.
    pub reason: RecordStoreError,
}

/// Loads the record table from the snapshot file at `path`.
///
/// A missing file yields an empty load. Entries that fail to decode are
/// dropped into [`SnapshotLoad::skipped`] rather than failing the load;
/// only an unreadable file or an unparseable document is an error.
///
/// # Errors
///
/// Returns [`RecordStoreError::Io`] if the file exists but cannot be read,
/// or [`RecordStoreError::Serialization`] if it is not a valid snapshot
/// document.
pub fn load(path: &Path) -> StoreResult<SnapshotLoad> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(SnapshotLoad::default());
        }
        Err(err) => return Err(RecordStoreError::io("reading snapshot file", err)),
    };

    let table: PersistedTable = serde_json::from_slice(&data)
        .map_err(|err| RecordStoreError::Serialization(err.to_string()))?;

    let mut loaded = SnapshotLoad::default();
    for (id, persisted) in table.records {
        match UserRecord::try_from(persisted) {
            Ok(record) => {
                loaded.records.insert(RecordId::from(id), record);
            }
            Err(reason) => loaded.skipped.push(SkippedRecord { id, reason }),
        }
    }
    Ok(loaded)
}

/// Serializes the full record table to the snapshot file at `path`.
///
/// # Errors
///
/// Returns [`RecordStoreError::Serialization`] if encoding fails, or
/// [`RecordStoreError::Io`] if the temp file cannot be written or renamed
/// into place.
pub fn save(path: &Path, records: &HashMap<RecordId, UserRecord>) -> StoreResult<()> {
    let table = PersistedTable {
        records: records
            .iter()
            .map(|(id, record)| (id.as_str().to_owned(), PersistedRecord::from(record)))
            .collect(),
    };
    let data = serde_json::to_vec_pretty(&table)
        .map_err(|err| RecordStoreError::Serialization(err.to_string()))?;
    write_atomic(path, &data)
}

/// Writes `data` to `path` via a sibling temp file, fsync, and rename.
fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let tmp = tmp_path(path);
    let mut file =
        File::create(&tmp).map_err(|err| RecordStoreError::io("creating snapshot temp file", err))?;
    restrict_permissions(&file)?;
    file.write_all(data)
        .map_err(|err| RecordStoreError::io("writing snapshot temp file", err))?;
    file.sync_all()
        .map_err(|err| RecordStoreError::io("syncing snapshot temp file", err))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|err| RecordStoreError::io("publishing snapshot file", err))
}

/// Returns the sibling temp path for `path` (the path with `.tmp` appended).
fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Restricts the snapshot to the owning user; it contains key material.
#[cfg(unix)]
fn restrict_permissions(file: &File) -> StoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(|err| RecordStoreError::io("restricting snapshot permissions", err))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File) -> StoreResult<()> {
    Ok(())
}
