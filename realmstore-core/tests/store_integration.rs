//! End-to-end tests for the record store: snapshot recovery, corrupt-entry
//! isolation, and the concurrent compare-and-swap race.

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use realmstore_core::{
    EncryptedSecret, EncryptedSecretCommitment, EncryptionKeyScalarShare, MemoryRecordStore,
    OprfPrivateKey, OprfPublicKey, OprfSignature, OprfSignedPublicKey, OprfVerifyingKey, Policy,
    RecordId, RecordStore, RecordStoreError, RegisteredState, RegistrationVersion,
    UnlockKeyCommitment, UnlockKeyTag, UserRecord,
};

fn registered_record(fill: u8) -> UserRecord {
    UserRecord::Registered(Box::new(RegisteredState {
        version: RegistrationVersion::new([fill; 16]),
        oprf_private_key: OprfPrivateKey::new([fill; 32]),
        oprf_signed_public_key: OprfSignedPublicKey {
            public_key: OprfPublicKey::new([fill; 32]),
            verifying_key: OprfVerifyingKey::new([fill; 32]),
            signature: OprfSignature::new([fill; 64]),
        },
        unlock_key_commitment: UnlockKeyCommitment::new([fill; 32]),
        unlock_key_tag: UnlockKeyTag::new([fill; 16]),
        encryption_key_scalar_share: EncryptionKeyScalarShare::new([fill; 32]),
        encrypted_secret: EncryptedSecret::new([fill; 145]),
        encrypted_secret_commitment: EncryptedSecretCommitment::new([fill; 16]),
        guess_count: 1,
        policy: Policy { num_guesses: 3 },
    }))
}

#[test]
fn test_snapshot_survives_store_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let id = RecordId::from("alice");
    let record = registered_record(0xC4);

    {
        let store = MemoryRecordStore::with_snapshot(&path);
        let (_, proof) = store.get_record(&id).unwrap();
        store.write_record(&id, record.clone(), proof).unwrap();
    }

    let store = MemoryRecordStore::with_snapshot(&path);
    let (read_back, _) = store.get_record(&id).unwrap();
    assert_eq!(read_back, record);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn test_missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryRecordStore::with_snapshot(dir.path().join("absent.json"));
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_corrupt_snapshot_document_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    fs::write(&path, b"}} definitely not json").unwrap();

    let store = MemoryRecordStore::with_snapshot(&path);
    assert!(store.is_empty().unwrap());

    // The store still works; the first write replaces the corrupt file.
    let id = RecordId::from("alice");
    let (_, proof) = store.get_record(&id).unwrap();
    store
        .write_record(&id, UserRecord::NoGuesses, proof)
        .unwrap();
    let reopened = MemoryRecordStore::with_snapshot(&path);
    let (record, _) = reopened.get_record(&id).unwrap();
    assert_eq!(record, UserRecord::NoGuesses);
}

#[test]
fn test_malformed_entry_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    fs::write(
        &path,
        r#"{"records":{
            "mallory": {"registration_state": "Registered"},
            "bob": {"registration_state": "NotRegistered"}
        }}"#,
    )
    .unwrap();

    let store = MemoryRecordStore::with_snapshot(&path);
    assert_eq!(store.len().unwrap(), 1);

    // The valid entry is present; reading it yields a proof of existence,
    // so a stale absent proof for it conflicts.
    let (bob, bob_proof) = store.get_record(&RecordId::from("bob")).unwrap();
    assert_eq!(bob, UserRecord::NotRegistered);
    store
        .write_record(&RecordId::from("bob"), UserRecord::NoGuesses, bob_proof)
        .unwrap();

    // The malformed entry acts as never written.
    let (mallory, mallory_proof) = store.get_record(&RecordId::from("mallory")).unwrap();
    assert_eq!(mallory, UserRecord::NotRegistered);
    store
        .write_record(&RecordId::from("mallory"), registered_record(0x01), mallory_proof)
        .unwrap();
}

#[test]
fn test_write_against_exhausted_registration_scenario() {
    let store = MemoryRecordStore::new();
    let id = RecordId::from("alice");

    let (_, absent_proof) = store.get_record(&id).unwrap();
    store
        .write_record(&id, UserRecord::NoGuesses, absent_proof.clone())
        .unwrap();

    let (record, _) = store.get_record(&id).unwrap();
    assert_eq!(record, UserRecord::NoGuesses);

    let err = store
        .write_record(&id, registered_record(0x02), absent_proof)
        .unwrap_err();
    assert!(matches!(err, RecordStoreError::Conflict));
}

#[test]
fn test_concurrent_cas_race_has_exactly_one_winner() {
    let store = Arc::new(MemoryRecordStore::new());
    let id = RecordId::from("alice");
    let (_, proof) = store.get_record(&id).unwrap();

    let contenders = [UserRecord::NoGuesses, registered_record(0x0F)];
    let barrier = Arc::new(Barrier::new(contenders.len()));

    let handles: Vec<_> = contenders
        .iter()
        .map(|record| {
            let store = Arc::clone(&store);
            let id = id.clone();
            let proof = proof.clone();
            let record = record.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let outcome = store.write_record(&id, record.clone(), proof);
                (outcome, record)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter(|(outcome, _)| outcome.is_ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one write must win the race");
    for (outcome, _) in &results {
        if let Err(err) = outcome {
            assert!(matches!(err, RecordStoreError::Conflict));
        }
    }

    let (stored, _) = store.get_record(&id).unwrap();
    assert_eq!(&stored, &winners[0].1);
}

#[test]
fn test_snapshot_is_rewritten_after_every_successful_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let store = MemoryRecordStore::with_snapshot(&path);

    let id = RecordId::from("alice");
    let (_, proof) = store.get_record(&id).unwrap();
    store
        .write_record(&id, UserRecord::NoGuesses, proof)
        .unwrap();
    let after_first = fs::read(&path).unwrap();

    let (_, proof) = store.get_record(&id).unwrap();
    store
        .write_record(&id, registered_record(0x2A), proof)
        .unwrap();
    let after_second = fs::read(&path).unwrap();

    assert_ne!(after_first, after_second);
    assert!(!path.with_extension("json.tmp").exists());

    // A conflicting write must not touch the file.
    let (_, stale) = MemoryRecordStore::new().get_record(&id).unwrap();
    assert!(store.write_record(&id, UserRecord::NoGuesses, stale).is_err());
    assert_eq!(fs::read(&path).unwrap(), after_second);
}
