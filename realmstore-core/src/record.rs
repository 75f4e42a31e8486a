//! Core type definitions for realm registration records.
//!
//! A [`UserRecord`] is the per-user registration state held by a realm: one
//! of exactly three variants. All cryptographic fields are fixed-size opaque
//! byte buffers; the store never interprets them.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identifier of a user's registration record.
///
/// Opaque and printable; used only as a map key and as the JSON object key
/// in snapshot files.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Defines a fixed-size opaque byte buffer with hex conversions.
macro_rules! opaque_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length of the buffer in bytes.
            pub const LEN: usize = $len;

            /// Creates a new buffer from raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Converts the buffer to a lowercase hexadecimal string.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Creates a buffer from a hexadecimal string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not valid hex or does not
            /// decode to exactly [`Self::LEN`] bytes.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

/// Defines a fixed-size secret byte buffer.
///
/// Secret buffers zeroize on drop, compare in constant time, and redact
/// their contents in `Debug` output. Hex conversion is still provided for
/// snapshot serialization.
macro_rules! secret_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Zeroize, ZeroizeOnDrop)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length of the buffer in bytes.
            pub const LEN: usize = $len;

            /// Creates a new buffer from raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Converts the buffer to a lowercase hexadecimal string.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Creates a buffer from a hexadecimal string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not valid hex or does not
            /// decode to exactly [`Self::LEN`] bytes.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0.ct_eq(&other.0).into()
            }
        }

        impl Eq for $name {}

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }
    };
}

opaque_bytes!(
    /// Random version stamp assigned at registration time.
    RegistrationVersion,
    16
);

opaque_bytes!(
    /// Ristretto255 point: the blinded-evaluation public key of the OPRF.
    OprfPublicKey,
    32
);

opaque_bytes!(
    /// Ed25519 key against which the OPRF public-key signature verifies.
    OprfVerifyingKey,
    32
);

opaque_bytes!(
    /// Ed25519 signature over the OPRF public key.
    OprfSignature,
    64
);

opaque_bytes!(
    /// Commitment to the user's unlock key.
    UnlockKeyCommitment,
    32
);

opaque_bytes!(
    /// MAC tag proving knowledge of the unlock key.
    UnlockKeyTag,
    16
);

opaque_bytes!(
    /// Ciphertext of the user's secret share.
    EncryptedSecret,
    145
);

opaque_bytes!(
    /// MAC tag over the encrypted secret.
    EncryptedSecretCommitment,
    16
);

secret_bytes!(
    /// Ristretto255 scalar: the realm's private OPRF key for this user.
    OprfPrivateKey,
    32
);

secret_bytes!(
    /// This realm's share of the scalar protecting the encryption key.
    EncryptionKeyScalarShare,
    32
);

/// The OPRF public key together with the signature attesting to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OprfSignedPublicKey {
    /// The OPRF public key.
    pub public_key: OprfPublicKey,
    /// Key the signature verifies against.
    pub verifying_key: OprfVerifyingKey,
    /// Signature over the public key.
    pub signature: OprfSignature,
}

/// Guess-limiting policy attached to a registration.
///
/// Stored and returned verbatim; the store never evaluates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Number of failed recovery guesses allowed before the registration
    /// is exhausted.
    pub num_guesses: u16,
}

/// Payload of a live registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredState {
    /// Version stamp for this registration.
    pub version: RegistrationVersion,
    /// The realm's private OPRF key for this user.
    pub oprf_private_key: OprfPrivateKey,
    /// The signed OPRF public key handed back to clients.
    pub oprf_signed_public_key: OprfSignedPublicKey,
    /// Commitment to the unlock key.
    pub unlock_key_commitment: UnlockKeyCommitment,
    /// Tag proving knowledge of the unlock key.
    pub unlock_key_tag: UnlockKeyTag,
    /// This realm's share of the encryption key scalar.
    pub encryption_key_scalar_share: EncryptionKeyScalarShare,
    /// Ciphertext of the user's secret share.
    pub encrypted_secret: EncryptedSecret,
    /// Tag over the encrypted secret.
    pub encrypted_secret_commitment: EncryptedSecretCommitment,
    /// Failed recovery guesses so far.
    pub guess_count: u16,
    /// Guess-limiting policy, passed through unchanged.
    pub policy: Policy,
}

/// Per-user registration state held by the realm.
///
/// A record is always exactly one of these three variants. `NotRegistered`
/// is the canonical default and is what reads return for identifiers that
/// were never written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserRecord {
    /// No registration exists.
    #[default]
    NotRegistered,
    /// A live registration. Boxed to keep the enum small.
    Registered(Box<RegisteredState>),
    /// The registration's guess budget is exhausted. Terminal.
    NoGuesses,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_not_registered() {
        assert_eq!(UserRecord::default(), UserRecord::NotRegistered);
    }

    #[test]
    fn test_opaque_bytes_hex_roundtrip() {
        let version = RegistrationVersion::new([0xAB; 16]);
        let hex = version.to_hex();
        assert_eq!(hex, "ab".repeat(16));
        assert_eq!(RegistrationVersion::from_hex(&hex).unwrap(), version);
    }

    #[test]
    fn test_opaque_bytes_from_hex_rejects_wrong_length() {
        assert!(UnlockKeyCommitment::from_hex("abcd").is_err());
        assert!(UnlockKeyCommitment::from_hex("not hex").is_err());
    }

    #[test]
    fn test_secret_bytes_debug_is_redacted() {
        let key = OprfPrivateKey::new([0x42; 32]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "OprfPrivateKey(..)");
        assert!(!debug.contains("42"));
    }

    #[test]
    fn test_secret_bytes_equality() {
        let a = EncryptionKeyScalarShare::new([7; 32]);
        let b = EncryptionKeyScalarShare::new([7; 32]);
        let c = EncryptionKeyScalarShare::new([8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::from("alice");
        assert_eq!(id.to_string(), "alice");
        assert_eq!(id.as_str(), "alice");
    }
}
