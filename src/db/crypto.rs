use anyhow::{bail, ensure, Result};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key, XChaCha20Poly1305, XNonce,
};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 24;
pub const KEY_LEN: usize = 32;

const SYNTHETIC_NONCE_DOMAIN: &[u8] = b"quentis-link/synthetic-nonce/v1";

pub trait Cipher {
    type EncryptionKey;

    fn new_key() -> Self::EncryptionKey;
    fn with_key(key: &Self::EncryptionKey) -> Self;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Authenticated encryption with XChaCha20-Poly1305. Ciphertexts are `nonce || ciphertext || tag`.
#[derive(Clone)]
pub struct XChaCha20Poly1305Cipher {
    key: Key,
    cipher: XChaCha20Poly1305,
}

impl Cipher for XChaCha20Poly1305Cipher {
    type EncryptionKey = Key;

    fn new_key() -> Key {
        XChaCha20Poly1305::generate_key(&mut OsRng)
    }

    fn with_key(key: &Key) -> Self {
        Self {
            key: key.clone(),
            cipher: XChaCha20Poly1305::new(key),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        self.encrypt_with_nonce(&nonce, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let (nonce, ciphertext) = split_nonce(ciphertext)?;
        let plaintext = self.cipher.decrypt(nonce, ciphertext)?;
        Ok(plaintext)
    }
}

impl XChaCha20Poly1305Cipher {
    /// Like [Cipher::encrypt], but the nonce is derived from the key and the plaintext,
    /// so equal plaintexts produce equal ciphertexts.
    pub fn encrypt_deterministic(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.synthetic_nonce(plaintext);
        self.encrypt_with_nonce(&nonce, plaintext)
    }

    /// Inverse of [Self::encrypt_deterministic]. Also checks that the nonce is the one
    /// [Self::encrypt_deterministic] would have chosen for the recovered plaintext.
    pub fn decrypt_deterministic(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let (nonce, _) = split_nonce(ciphertext)?;
        let plaintext = self.decrypt(ciphertext)?;
        ensure!(
            *nonce == self.synthetic_nonce(&plaintext),
            "Nonce doesn't match plaintext"
        );
        Ok(plaintext)
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> XNonce {
        let digest = Sha256::new()
            .chain_update(SYNTHETIC_NONCE_DOMAIN)
            .chain_update(self.key.as_slice())
            .chain_update(plaintext)
            .finalize();
        XNonce::clone_from_slice(&digest[..NONCE_LEN])
    }

    fn encrypt_with_nonce(&self, nonce: &XNonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt(nonce, plaintext)?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(nonce);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }
}

fn split_nonce(ciphertext: &[u8]) -> Result<(&XNonce, &[u8])> {
    if ciphertext.len() < NONCE_LEN {
        bail!("Ciphertext too small for nonce");
    }
    let (nonce, ciphertext) = ciphertext.split_at(NONCE_LEN);
    Ok((XNonce::from_slice(nonce), ciphertext))
}

/// Parses a key from its 32 raw bytes
pub fn key_from_slice(bytes: &[u8]) -> Result<Key> {
    ensure!(
        bytes.len() == KEY_LEN,
        "Key must be {KEY_LEN} bytes but is {} bytes",
        bytes.len()
    );
    Ok(Key::clone_from_slice(bytes))
}
