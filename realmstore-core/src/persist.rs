//! Canonical on-disk representation of records.
//!
//! Snapshot files store one JSON document per table: a mapping from record
//! identifier to [`PersistedRecord`], with every fixed-size buffer
//! hex-encoded and the variant carried as an explicit string tag. This
//! module owns the conversions between that form and [`UserRecord`].
//!
//! Decoding is deliberately lenient: a buffer field whose hex is
//! undecodable or the wrong length yields a buffer with the decodable
//! prefix copied and the remainder zero-filled, and an unknown state tag
//! decodes to `NotRegistered`. The only hard failure is a `"Registered"`
//! tag without its payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RecordStoreError;
use crate::record::{
    EncryptedSecret, EncryptedSecretCommitment, EncryptionKeyScalarShare, OprfPrivateKey,
    OprfPublicKey, OprfSignature, OprfSignedPublicKey, OprfVerifyingKey, Policy, RegisteredState,
    RegistrationVersion, UnlockKeyCommitment, UnlockKeyTag, UserRecord,
};

/// State tag for a live registration.
pub const STATE_REGISTERED: &str = "Registered";
/// State tag for an absent registration.
pub const STATE_NOT_REGISTERED: &str = "NotRegistered";
/// State tag for an exhausted registration.
pub const STATE_NO_GUESSES: &str = "NoGuesses";

/// A full record table as laid out in a snapshot file.
///
/// Keys are ordered so that equal tables serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTable {
    /// Records keyed by their identifier string.
    pub records: BTreeMap<String, PersistedRecord>,
}

/// One record as laid out in a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Variant tag: `"Registered"`, `"NotRegistered"`, or `"NoGuesses"`.
    pub registration_state: String,
    /// Registration payload, present only when the tag is `"Registered"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<PersistedRegistered>,
}

/// Hex-encoded payload of a live registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRegistered {
    /// Registration version stamp.
    pub version: String,
    /// The realm's private OPRF key.
    pub oprf_private_key: String,
    /// The signed OPRF public key.
    pub oprf_signed_public_key: PersistedSignedPublicKey,
    /// Commitment to the unlock key.
    pub unlock_key_commitment: String,
    /// Tag proving knowledge of the unlock key.
    pub unlock_key_tag: String,
    /// This realm's share of the encryption key scalar.
    pub encryption_key_scalar_share: String,
    /// Ciphertext of the user's secret share.
    pub encrypted_secret: String,
    /// Tag over the encrypted secret.
    pub encrypted_secret_commitment: String,
    /// Failed recovery guesses so far.
    pub guess_count: u16,
    /// Guess-limiting policy, passed through unchanged.
    pub policy: Policy,
}

/// Hex-encoded form of [`OprfSignedPublicKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSignedPublicKey {
    /// The OPRF public key.
    pub public_key: String,
    /// Key the signature verifies against.
    pub verifying_key: String,
    /// Signature over the public key.
    pub signature: String,
}

impl From<&UserRecord> for PersistedRecord {
    fn from(record: &UserRecord) -> Self {
        match record {
            UserRecord::Registered(state) => Self {
                registration_state: STATE_REGISTERED.to_owned(),
                registered: Some(PersistedRegistered {
                    version: state.version.to_hex(),
                    oprf_private_key: state.oprf_private_key.to_hex(),
                    oprf_signed_public_key: PersistedSignedPublicKey {
                        public_key: state.oprf_signed_public_key.public_key.to_hex(),
                        verifying_key: state.oprf_signed_public_key.verifying_key.to_hex(),
                        signature: state.oprf_signed_public_key.signature.to_hex(),
                    },
                    unlock_key_commitment: state.unlock_key_commitment.to_hex(),
                    unlock_key_tag: state.unlock_key_tag.to_hex(),
                    encryption_key_scalar_share: state.encryption_key_scalar_share.to_hex(),
                    encrypted_secret: state.encrypted_secret.to_hex(),
                    encrypted_secret_commitment: state.encrypted_secret_commitment.to_hex(),
                    guess_count: state.guess_count,
                    policy: state.policy,
                }),
            },
            UserRecord::NoGuesses => Self {
                registration_state: STATE_NO_GUESSES.to_owned(),
                registered: None,
            },
            UserRecord::NotRegistered => Self {
                registration_state: STATE_NOT_REGISTERED.to_owned(),
                registered: None,
            },
        }
    }
}

impl TryFrom<PersistedRecord> for UserRecord {
    type Error = RecordStoreError;

    fn try_from(persisted: PersistedRecord) -> Result<Self, Self::Error> {
        match persisted.registration_state.as_str() {
            STATE_REGISTERED => {
                let r = persisted
                    .registered
                    .ok_or(RecordStoreError::MalformedRecord)?;
                Ok(Self::Registered(Box::new(RegisteredState {
                    version: RegistrationVersion::new(decode_lenient(&r.version)),
                    oprf_private_key: OprfPrivateKey::new(decode_lenient(&r.oprf_private_key)),
                    oprf_signed_public_key: OprfSignedPublicKey {
                        public_key: OprfPublicKey::new(decode_lenient(
                            &r.oprf_signed_public_key.public_key,
                        )),
                        verifying_key: OprfVerifyingKey::new(decode_lenient(
                            &r.oprf_signed_public_key.verifying_key,
                        )),
                        signature: OprfSignature::new(decode_lenient(
                            &r.oprf_signed_public_key.signature,
                        )),
                    },
                    unlock_key_commitment: UnlockKeyCommitment::new(decode_lenient(
                        &r.unlock_key_commitment,
                    )),
                    unlock_key_tag: UnlockKeyTag::new(decode_lenient(&r.unlock_key_tag)),
                    encryption_key_scalar_share: EncryptionKeyScalarShare::new(decode_lenient(
                        &r.encryption_key_scalar_share,
                    )),
                    encrypted_secret: EncryptedSecret::new(decode_lenient(&r.encrypted_secret)),
                    encrypted_secret_commitment: EncryptedSecretCommitment::new(decode_lenient(
                        &r.encrypted_secret_commitment,
                    )),
                    guess_count: r.guess_count,
                    policy: r.policy,
                })))
            }
            STATE_NO_GUESSES => Ok(Self::NoGuesses),
            // Unknown and absent tags fail open to the default state.
            _ => Ok(Self::NotRegistered),
        }
    }
}

/// Decodes hex into a fixed-size buffer, tolerating bad input.
///
/// The decodable prefix is copied and the remainder left zero-filled, so a
/// corrupt field degrades to zeroes instead of failing the whole record.
fn decode_lenient<const N: usize>(hex_str: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    if let Ok(bytes) = hex::decode(hex_str) {
        let n = bytes.len().min(N);
        buf[..n].copy_from_slice(&bytes[..n]);
    }
    buf
}
