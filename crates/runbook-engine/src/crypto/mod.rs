//! Credential encryption.
//!
//! Provides AES-256-GCM encryption for stored credential secrets.

pub mod encryption;

pub use encryption::Encryptor;
