//! Codec modules for stream compression and encryption primitives.
//!
//! - `aes`: AES-CBC encryption/decryption and PKCS#7 unpadding
//! - `arcfour`: RC4 stream cipher
//! - `filters`: deflate, predictor reconstruction, filter-chain helpers

pub mod aes;
pub mod arcfour;
pub mod filters;

// Re-export main functions for convenience
pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
pub use arcfour::Arcfour;
pub use filters::{flate_decode, flate_encode, png_predictor_decode, png_predictor_encode};
