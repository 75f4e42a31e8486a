//! Embeddable record store for a secret-sharing realm.
//!
//! Holds per-user cryptographic registration state and enforces an
//! optimistic-concurrency read/write protocol over it:
//!
//! 1. [`RecordStore::get_record`] returns the current record together with a
//!    [`ReadProof`] capturing exactly what was observed.
//! 2. The caller derives a new record from what it read.
//! 3. [`RecordStore::write_record`] applies the new record only if the table
//!    is unchanged since the matching read, otherwise it fails with
//!    [`RecordStoreError::Conflict`] and the caller starts over.
//!
//! The in-memory table is the source of truth. A store constructed with
//! [`MemoryRecordStore::with_snapshot`] additionally mirrors the full table
//! to a JSON snapshot file after every successful write and reloads it at
//! startup; the mirror is best-effort restart recovery, not a durability
//! guarantee.
//!
//! All cryptographic fields in a record are opaque fixed-size byte buffers.
//! This crate never generates, derives, or interprets key material.

mod error;
pub mod persist;
mod record;
pub mod snapshot;
mod store;

pub use error::{RecordStoreError, StoreResult};
pub use record::{
    EncryptedSecret, EncryptedSecretCommitment, EncryptionKeyScalarShare, OprfPrivateKey,
    OprfPublicKey, OprfSignature, OprfSignedPublicKey, OprfVerifyingKey, Policy, RecordId,
    RegisteredState, RegistrationVersion, UnlockKeyCommitment, UnlockKeyTag, UserRecord,
};
pub use store::{MemoryRecordStore, ReadProof, RecordStore};
