use anyhow::{anyhow, Result};
use base64::Engine;
use sha2::{Digest, Sha256};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

const NONCE_LEN: usize = 24;

/// Hex blake3 digest, used as the content fingerprint for badge bodies.
pub fn blake3_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hex sha256 digest, used by the issuer salted-recipient convention.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn derive_key(secret: &str) -> Key {
    Key::clone_from_slice(blake3::hash(secret.as_bytes()).as_bytes())
}

/// Encrypts `plaintext` into a base64 token. The random nonce is prepended
/// to the ciphertext before encoding.
pub fn encrypt(plaintext: &str, secret: &str) -> Result<String> {
    let cipher = XSalsa20Poly1305::new(&derive_key(secret));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::fill(&mut nonce_bytes[..]);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("encryption failed: {}", e))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Decrypts a token produced by [`encrypt`].
pub fn decrypt(token: &str, secret: &str) -> Result<String> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|e| anyhow!("invalid token encoding: {}", e))?;

    if raw.len() <= NONCE_LEN {
        return Err(anyhow!("token too short"));
    }

    let cipher = XSalsa20Poly1305::new(&derive_key(secret));
    let nonce = Nonce::clone_from_slice(&raw[..NONCE_LEN]);
    let plaintext = cipher
        .decrypt(&nonce, &raw[NONCE_LEN..])
        .map_err(|e| anyhow!("decryption failed: {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("invalid token payload: {}", e))
}
