//! AES-128-CBC with PKCS#7 padding.
//!
//! The engine knows nothing about storage or identity: it turns plaintext and
//! a 16-byte key into `(iv, ciphertext)` and back. A fresh IV is drawn from
//! the thread-local CSPRNG on every [`encrypt`] call and is never accepted
//! from the caller.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const BLOCK_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidCiphertextLength(usize),

    /// Padding check failed. Deliberately carries no detail.
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Raw 128-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Constant-time equality; runtime does not depend on where the keys differ.
    pub fn matches(&self, other: &EncryptionKey) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl TryFrom<Vec<u8>> for EncryptionKey {
    type Error = CryptoError;

    fn try_from(mut bytes: Vec<u8>) -> Result<Self, Self::Error> {
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Initialization vector. Not secret, but required for decryption.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Iv([u8; IV_LEN]);

impl Iv {
    pub fn random() -> Self {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);
        Self(iv)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; IV_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidIvLength {
            expected: IV_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Iv {
    type Error = CryptoError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_slice(&bytes)
    }
}

/// Output of [`encrypt`]; transient, never persisted as a unit.
#[derive(Debug, Clone)]
pub struct CipherFile {
    pub iv: Iv,
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
///
/// The ciphertext is always a non-empty multiple of [`BLOCK_LEN`]: an
/// empty plaintext still produces one full padding block.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> CipherFile {
    let iv = Iv::random();
    let ciphertext = Aes128CbcEnc::new(key.as_bytes().into(), iv.as_bytes().into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    CipherFile { iv, ciphertext }
}

/// Reverse [`encrypt`].
///
/// A padding failure is the usual symptom of a wrong key or IV, or of
/// corrupted ciphertext. The error never includes partially decrypted bytes.
pub fn decrypt(ciphertext: &[u8], key: &EncryptionKey, iv: &Iv) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }

    Aes128CbcDec::new(key.as_bytes().into(), iv.as_bytes().into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
