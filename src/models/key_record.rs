//! Key custody record for a single (owner, file) pair.

use crate::services::crypto_engine::{EncryptionKey, Iv};
use sqlx::FromRow;
use uuid::Uuid;

/// Key material and IV used to encrypt one file.
///
/// The raw key is held server-side, so the server is a full key custodian
/// rather than a zero-knowledge store. `key_material` zeroes itself on drop.
#[derive(Clone, FromRow, Debug)]
pub struct KeyRecord {
    pub owner_id: String,

    /// Must reference an existing `files.id` (enforced by foreign key).
    pub file_id: Uuid,

    #[sqlx(try_from = "Vec<u8>")]
    pub key_material: EncryptionKey,

    #[sqlx(try_from = "Vec<u8>")]
    pub iv: Iv,
}
