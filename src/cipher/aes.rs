//! AES-256-GCM cipher with HKDF-derived keys.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hkdf::Hkdf;
use sha2::Sha256;

use super::Cipher;
use crate::error::{KvError, Result};

/// Secret used when no key material is configured.
pub const DEFAULT_SECRET: &str = "typedkv-default-secret";

const NONCE_LEN: usize = 12;
const FIXED_KEY_INFO: &[u8] = b"typedkv/fixed/key";
const FIXED_NONCE_INFO: &[u8] = b"typedkv/fixed/nonce";
const ENTRY_KEY_INFO: &str = "typedkv/entry/";

/// How encryption keys and nonces are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// One key and one nonce for every entry. Equal plaintexts produce equal
    /// ciphertexts; kept for stores written that way.
    Fixed(String),
    /// A key derived per entry key and a fresh random nonce per write. The
    /// nonce is stored in front of the ciphertext.
    PerEntry(String),
}

impl KeyMaterial {
    fn secret(&self) -> &str {
        match self {
            Self::Fixed(secret) | Self::PerEntry(secret) => secret,
        }
    }
}

impl Default for KeyMaterial {
    fn default() -> Self {
        Self::Fixed(DEFAULT_SECRET.to_string())
    }
}

struct FixedState {
    cipher: Aes256Gcm,
    nonce: [u8; NONCE_LEN],
}

/// AES-256-GCM over base64 text.
pub struct AesCipher {
    material: KeyMaterial,
    fixed: Option<FixedState>,
}

impl AesCipher {
    pub fn new(material: KeyMaterial) -> Self {
        Self {
            material,
            fixed: None,
        }
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    fn entry_cipher(&self, key: &str) -> Result<Aes256Gcm> {
        let info = format!("{ENTRY_KEY_INFO}{key}");
        let bytes: [u8; 32] = expand(self.material.secret(), info.as_bytes())?;
        Aes256Gcm::new_from_slice(&bytes).map_err(|e| KvError::encode("cipher key", e))
    }

    fn fixed_state(&self) -> Result<&FixedState> {
        self.fixed
            .as_ref()
            .ok_or_else(|| KvError::encode("cipher", "cipher was not initialized"))
    }
}

impl Default for AesCipher {
    fn default() -> Self {
        Self::new(KeyMaterial::default())
    }
}

fn expand<const N: usize>(secret: &str, info: &[u8]) -> Result<[u8; N]> {
    let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut out = [0u8; N];
    hkdf.expand(info, &mut out)
        .map_err(|e| KvError::encode("cipher key", format!("HKDF expansion failed: {e:?}")))?;
    Ok(out)
}

impl Cipher for AesCipher {
    fn init(&mut self) -> bool {
        if self.material.secret().is_empty() {
            return false;
        }
        match &self.material {
            KeyMaterial::Fixed(secret) => {
                let state = expand::<32>(secret, FIXED_KEY_INFO).and_then(|key| {
                    let cipher = Aes256Gcm::new_from_slice(&key)
                        .map_err(|e| KvError::encode("cipher key", e))?;
                    let nonce = expand::<NONCE_LEN>(secret, FIXED_NONCE_INFO)?;
                    Ok(FixedState { cipher, nonce })
                });
                match state {
                    Ok(state) => {
                        self.fixed = Some(state);
                        true
                    },
                    Err(_) => false,
                }
            },
            KeyMaterial::PerEntry(_) => true,
        }
    }

    fn encrypt(&self, key: &str, plaintext: &str) -> Result<String> {
        match self.material {
            KeyMaterial::Fixed(_) => {
                let state = self.fixed_state()?;
                let ciphertext = state
                    .cipher
                    .encrypt(Nonce::from_slice(&state.nonce), plaintext.as_bytes())
                    .map_err(|e| KvError::encode("ciphertext", e))?;
                Ok(STANDARD.encode(ciphertext))
            },
            KeyMaterial::PerEntry(_) => {
                let cipher = self.entry_cipher(key)?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, plaintext.as_bytes())
                    .map_err(|e| KvError::encode("ciphertext", e))?;
                let mut out = nonce.to_vec();
                out.extend_from_slice(&ciphertext);
                Ok(STANDARD.encode(out))
            },
        }
    }

    fn decrypt(&self, key: &str, ciphertext: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| KvError::decode("ciphertext", e))?;

        let plain = match self.material {
            KeyMaterial::Fixed(_) => {
                let state = self.fixed_state()?;
                state
                    .cipher
                    .decrypt(Nonce::from_slice(&state.nonce), bytes.as_slice())
                    .map_err(|e| KvError::decode("ciphertext", e))?
            },
            KeyMaterial::PerEntry(_) => {
                if bytes.len() < NONCE_LEN {
                    return Err(KvError::decode("ciphertext", "ciphertext too short"));
                }
                let (nonce, body) = bytes.split_at(NONCE_LEN);
                self.entry_cipher(key)?
                    .decrypt(Nonce::from_slice(nonce), body)
                    .map_err(|e| KvError::decode("ciphertext", e))?
            },
        };
        String::from_utf8(plain).map_err(|e| KvError::decode("plaintext", e))
    }

    fn name(&self) -> &'static str {
        match self.material {
            KeyMaterial::Fixed(_) => "aes-256-gcm/fixed",
            KeyMaterial::PerEntry(_) => "aes-256-gcm/per-entry",
        }
    }
}
