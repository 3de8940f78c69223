//! Fixed-size key newtypes.
//!
//! Every newtype that can hold private material derives [`Zeroize`] /
//! [`ZeroizeOnDrop`] so dropping a key, chain, or session struct scrubs it —
//! the same discipline `PQRatchetState` in the pack's `secure-legion-core`
//! applies by hand in a manual `Drop` impl.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A raw 256-bit symmetric key: the output of HKDF, the password KDF, or a
/// ratchet chain/message key.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey(pub(crate) [u8; 32]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct X25519SecretKey(pub(crate) [u8; 32]);

impl std::fmt::Debug for X25519SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X25519SecretKey(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X25519KeyPair {
    pub secret: X25519SecretKey,
    pub public: X25519PublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Ed25519SecretKey(pub(crate) [u8; 32]);

impl std::fmt::Debug for Ed25519SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519SecretKey(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ed25519KeyPair {
    pub secret: Ed25519SecretKey,
    pub public: Ed25519PublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

// `[u8; 64]` falls outside serde's blanket array impl (which only covers
// N <= 32), so the fixed-size array is (de)serialized element-by-element as
// a tuple, matching the wire format serde itself uses for smaller arrays.
impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(self.0.len())?;
        for byte in &self.0 {
            tup.serialize_element(byte)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("64 bytes")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = [0u8; 64];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_tuple(64, SignatureVisitor)
    }
}

/// ML-KEM-1024 public key. Variable-length (the Kyber1024 parameter set
/// does not fit in a fixed array the way the curve keys do).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemPublicKey(pub Vec<u8>);

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KemSecretKey(pub(crate) Vec<u8>);

impl std::fmt::Debug for KemSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemSecretKey(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KemKeyPair {
    pub secret: KemSecretKey,
    pub public: KemPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemCiphertext(pub Vec<u8>);
