//! Persistent records of the vault.
//!
//! File metadata and key material live in separate tables so that leaking
//! one does not leak the other. Both map to rows via `sqlx::FromRow`.

pub mod file_record;
pub mod key_record;
