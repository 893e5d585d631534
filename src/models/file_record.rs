//! Identity and metadata of an uploaded file.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::FromRow;
use uuid::Uuid;

/// Prefix under which every ciphertext object is stored.
pub const OBJECT_PREFIX: &str = "uploads/";

/// Random bytes in the object-name token (hex encoded, 128 bits).
const OBJECT_TOKEN_LEN: usize = 16;

/// Longest logical-name suffix kept in the object name.
const MAX_NAME_SUFFIX_LEN: usize = 128;

/// A stored file, as seen by the catalog.
///
/// Holds no key material. `stored_object_name` is the only link to the
/// ciphertext in the object store.
#[derive(Clone, FromRow, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Generated on creation.
    pub id: Uuid,

    /// Owner identity attached by the auth middleware.
    pub owner_id: String,

    /// Filename supplied by the uploader.
    pub logical_name: String,

    /// Unique object-store name: random token + sanitized logical name.
    pub stored_object_name: String,

    /// Ciphertext size in bytes.
    pub size_bytes: i64,

    /// MIME type supplied by the uploader.
    pub content_type: String,

    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build a new record with a fresh id and a collision-resistant object name.
    pub fn new(
        owner_id: impl Into<String>,
        logical_name: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: i64,
    ) -> Self {
        let logical_name = logical_name.into();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            stored_object_name: stored_object_name(&logical_name),
            logical_name,
            size_bytes,
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// Generate `uploads/{32 hex chars}_{name}`.
///
/// Uniqueness rests on the 128-bit random token, not on locking; the name
/// suffix is only there to keep the object store browsable.
pub fn stored_object_name(logical_name: &str) -> String {
    let mut token = [0u8; OBJECT_TOKEN_LEN];
    rand::rng().fill_bytes(&mut token);
    format!(
        "{}{}_{}",
        OBJECT_PREFIX,
        hex::encode(token),
        sanitize_name(logical_name)
    )
}

/// Reduce a client-supplied filename to a safe single path segment.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(MAX_NAME_SUFFIX_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.replace("..", "_")
    }
}
