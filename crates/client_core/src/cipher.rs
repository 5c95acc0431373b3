//! Reversible XOR obfuscation for chat text.
//!
//! This is NOT encryption in any meaningful sense. The key is derived
//! deterministically from the username alone, so anyone who knows (or can
//! guess) the username can reproduce it and read every message. It exists
//! so that casual inspection of stored payloads does not show plaintext,
//! nothing more. An earlier variant of this scheme generated a random key
//! per process; two such instances could never decrypt each other's output,
//! so the deterministic derivation below is the only supported one.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{ClientError, Result};

const KEY_LEN: usize = 32;
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Derives the fixed-length obfuscation key for a username.
///
/// Pure and deterministic: the same username yields the same key across
/// calls and across client instances. The hash is the classic 32-bit
/// `h = h * 31 + unit` string hash over UTF-16 code units, matching the
/// key stream of existing deployments byte for byte.
pub fn derive_key(username: &str) -> String {
    let mut hash: i32 = 0;
    for unit in username.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }

    let mut key = String::with_capacity(KEY_LEN);
    for i in 0..KEY_LEN {
        let index = (i64::from(hash) + i as i64 * 13) % KEY_ALPHABET.len() as i64;
        key.push(KEY_ALPHABET[index.unsigned_abs() as usize] as char);
    }
    key
}

/// XORs the plaintext against the repeating key and base64-encodes the
/// result for transport. Inverse of [`decrypt`].
pub fn encrypt(plaintext: &str, key: &str) -> String {
    STANDARD.encode(xor_with_key(plaintext.as_bytes(), key.as_bytes()))
}

/// Reverses [`encrypt`]. Malformed transport encoding and non-UTF-8
/// plaintext both report [`ClientError::Decode`] rather than panicking.
pub fn decrypt(ciphertext: &str, key: &str) -> Result<String> {
    let raw = STANDARD
        .decode(ciphertext)
        .map_err(|err| ClientError::Decode(format!("invalid ciphertext encoding: {err}")))?;
    String::from_utf8(xor_with_key(&raw, key.as_bytes()))
        .map_err(|_| ClientError::Decode("decrypted bytes are not valid UTF-8".to_string()))
}

fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()])
        .collect()
}
