//! AES_ENCRYPT / AES_DECRYPT compatible encryption
//!
//! Matches MySQL's default `block_encryption_mode` (`aes-128-ecb`): raw key
//! material of any length is folded into 16 bytes with cyclic XOR, plaintext
//! is padded PKCS-style to a whole number of blocks, and every block is
//! encrypted independently. There is no IV.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::{DbError, Result};

/// AES block size and key size in bytes
pub const BLOCK_LEN: usize = 16;

/// Highest byte value removed by the compatibility trim
const MAX_PAD_BYTE: u8 = BLOCK_LEN as u8;

/// How padding is removed after decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// Strip every trailing byte in `0x00..=0x10`. Lossy for plaintext that
    /// legitimately ends in such bytes, but matches existing stored data.
    #[default]
    Compat,
    /// Verify the PKCS pad and remove exactly that many bytes
    Strict,
}

/// Fold raw key material into a 16 byte AES-128 key
pub fn derive_key(raw: &[u8]) -> [u8; BLOCK_LEN] {
    let mut key = [0u8; BLOCK_LEN];
    for (i, byte) in raw.iter().enumerate() {
        key[i % BLOCK_LEN] ^= byte;
    }
    key
}

/// AES-128-ECB cipher bound to a derived key
pub struct CipherCompat {
    cipher: Aes128,
    padding: PaddingMode,
}

impl CipherCompat {
    pub fn new(key: &[u8; BLOCK_LEN], padding: PaddingMode) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            padding,
        }
    }

    /// Derive the key from raw material and build the cipher
    pub fn from_raw_key(raw: &[u8], padding: PaddingMode) -> Self {
        Self::new(&derive_key(raw), padding)
    }

    /// Encrypt; `None` passes through
    pub fn encrypt(&self, plain: Option<&[u8]>) -> Option<Vec<u8>> {
        let plain = plain?;

        // Always at least one pad byte, a full block when already aligned
        let pad = BLOCK_LEN - plain.len() % BLOCK_LEN;
        let mut buf = Vec::with_capacity(plain.len() + pad);
        buf.extend_from_slice(plain);
        buf.resize(plain.len() + pad, pad as u8);

        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Some(buf)
    }

    /// Decrypt; `None` passes through
    pub fn decrypt(&self, encrypted: Option<&[u8]>) -> Result<Option<Vec<u8>>> {
        let Some(encrypted) = encrypted else {
            return Ok(None);
        };
        if encrypted.is_empty() || encrypted.len() % BLOCK_LEN != 0 {
            return Err(DbError::cipher(format!(
                "ciphertext length {} is not a positive multiple of {}",
                encrypted.len(),
                BLOCK_LEN
            )));
        }

        let mut buf = encrypted.to_vec();
        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }

        match self.padding {
            PaddingMode::Compat => {
                while buf.last().is_some_and(|b| *b <= MAX_PAD_BYTE) {
                    buf.pop();
                }
            }
            PaddingMode::Strict => {
                let pad = buf.last().copied().unwrap_or_default();
                let valid = (1..=MAX_PAD_BYTE).contains(&pad)
                    && buf[buf.len() - pad as usize..].iter().all(|b| *b == pad);
                if !valid {
                    return Err(DbError::cipher("invalid padding"));
                }
                buf.truncate(buf.len() - pad as usize);
            }
        }
        Ok(Some(buf))
    }
}
