//! Symmetric encryption of cookie values at rest.

use fernet::Fernet;

use crate::collab::Keychain;

/// Encrypts cookie values when a key is available.
///
/// Without a key values are stored as plaintext and flagged so; reading
/// branches on the stored flag only.
pub struct CookieCipher {
    fernet: Option<Fernet>,
}

impl CookieCipher {
    pub fn new(key: Option<&str>) -> Self {
        let fernet = key.and_then(|k| {
            let f = Fernet::new(k);
            if f.is_none() {
                tracing::warn!("Cookie key is not a valid Fernet key, storing cookies unencrypted");
            }
            f
        });
        Self { fernet }
    }

    pub fn plaintext() -> Self {
        Self { fernet: None }
    }

    /// Use the key from the keychain, creating one when the keychain is
    /// reachable but empty.
    pub fn from_keychain(keychain: &dyn Keychain) -> Self {
        if let Some(key) = keychain.get() {
            return Self::new(Some(&key));
        }
        let key = Fernet::generate_key();
        if keychain.set(&key) {
            Self::new(Some(&key))
        } else {
            tracing::info!("Keychain unavailable, storing cookies unencrypted");
            Self::plaintext()
        }
    }

    pub fn is_encrypting(&self) -> bool {
        self.fernet.is_some()
    }

    /// Returns the stored value and whether it is encrypted.
    pub fn seal(&self, value: &str) -> (String, bool) {
        match &self.fernet {
            Some(f) => (f.encrypt(value.as_bytes()), true),
            None => (value.to_string(), false),
        }
    }

    /// Recover a stored value. Failures yield an empty string.
    pub fn open(&self, stored: &str, encrypted: bool) -> String {
        if !encrypted {
            return stored.to_string();
        }
        let Some(f) = &self.fernet else {
            tracing::warn!("Encrypted cookie found but no key is available");
            return String::new();
        };
        match f.decrypt(stored) {
            Ok(bytes) => String::from_utf8(bytes).unwrap_or_default(),
            Err(_) => {
                tracing::warn!("Failed to decrypt cookie value");
                String::new()
            }
        }
    }
}
