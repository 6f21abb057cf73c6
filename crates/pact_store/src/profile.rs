//! Profiles: password-unlocked, encrypted-at-rest identity records.
//!
//! A profile's 24-byte hex id doubles as the Argon2id salt, so unlocking
//! needs no separate salt record: iterate the stored profiles, derive a key
//! from the password and each id, and trial-decrypt. The first profile that
//! decrypts and parses wins.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use pact_crypto::cipher::Cipher;
use pact_crypto::kdf::derive_key;
use pact_crypto::random::{rand_bytes, rand_hex};

use crate::backend::Store;
use crate::error::StoreError;

/// Key prefix for stored profiles.
pub const PROFILE_PREFIX: &str = "profiles/";
/// Profile id length in bytes (hex-encoded for storage); also the KDF salt.
const PROFILE_ID_LEN: usize = 24;
/// Profile key length in bytes.
const PROFILE_KEY_LEN: usize = 32;

/// Default session TTL in seconds.
const DEFAULT_SESSION_TTL: i64 = 300;

/// A successfully decrypted profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub key: Vec<u8>,
    #[serde(default)]
    pub settings: ProfileSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub session_ttl: i64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl Drop for Profile {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl Profile {
    fn generate() -> Self {
        Self {
            id: rand_hex(PROFILE_ID_LEN),
            key: rand_bytes(PROFILE_KEY_LEN),
            settings: ProfileSettings::default(),
        }
    }
}

/// True iff any profile is stored. Used on startup to decide between login
/// and first-run setup.
pub fn profiles_exist(store: &Store) -> Result<bool, StoreError> {
    Ok(!store.list(PROFILE_PREFIX)?.is_empty())
}

/// Create the first profile. Refuses to run when any profile exists.
pub fn new_genesis_profile(
    store: &mut Store,
    cipher: &Cipher,
    password: &str,
) -> Result<(), StoreError> {
    if profiles_exist(store)? {
        return Err(StoreError::ProfileExists);
    }
    init_profile(store, cipher, Profile::generate(), password)
}

fn init_profile(
    store: &mut Store,
    cipher: &Cipher,
    profile: Profile,
    password: &str,
) -> Result<(), StoreError> {
    let salt = hex::decode(&profile.id).map_err(|_| StoreError::InvalidPassword)?;
    let mut key = derive_key(password.as_bytes(), &salt)?;
    let encoded = serde_json::to_vec(&profile)?;
    let data = cipher.encrypt(&encoded, &key)?;
    key.zeroize();
    store.set(&format!("{PROFILE_PREFIX}{}", profile.id), data)?;
    Ok(())
}

/// Unlock a stored profile with a password: derive a key per stored profile
/// id and trial-decrypt. Returns the profile and its storage key.
pub fn unlock(
    store: &Store,
    cipher: &Cipher,
    password: &str,
) -> Result<(Profile, [u8; 32]), StoreError> {
    let paths = store.list(PROFILE_PREFIX)?;
    if paths.is_empty() {
        return Err(StoreError::NoProfiles);
    }
    for path in paths {
        let id_hex = path.trim_start_matches(PROFILE_PREFIX);
        let Ok(salt) = hex::decode(id_hex) else {
            continue;
        };
        let key = derive_key(password.as_bytes(), &salt)?;
        let Some(data) = store.get(&path)? else {
            continue;
        };
        let Ok(decoded) = cipher.decrypt(&data, &key) else {
            continue;
        };
        if let Ok(profile) = serde_json::from_slice::<Profile>(&decoded) {
            return Ok((profile, key));
        }
    }
    Err(StoreError::InvalidPassword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_kv(dir.path().join("pact.kv")).unwrap();
        (dir, store)
    }

    #[test]
    fn genesis_then_unlock() {
        let (_dir, mut store) = temp_store();
        let cipher = Cipher::time_series();
        assert!(!profiles_exist(&store).unwrap());
        new_genesis_profile(&mut store, &cipher, "hunter2").unwrap();
        assert!(profiles_exist(&store).unwrap());

        let (profile, _key) = unlock(&store, &cipher, "hunter2").unwrap();
        assert_eq!(profile.id.len(), PROFILE_ID_LEN * 2);
        assert_eq!(profile.key.len(), PROFILE_KEY_LEN);
    }

    #[test]
    fn wrong_password_rejected() {
        let (_dir, mut store) = temp_store();
        let cipher = Cipher::time_series();
        new_genesis_profile(&mut store, &cipher, "hunter2").unwrap();
        assert!(matches!(
            unlock(&store, &cipher, "hunter3"),
            Err(StoreError::InvalidPassword)
        ));
    }

    #[test]
    fn genesis_refuses_second_run() {
        let (_dir, mut store) = temp_store();
        let cipher = Cipher::time_series();
        new_genesis_profile(&mut store, &cipher, "first").unwrap();
        assert!(matches!(
            new_genesis_profile(&mut store, &cipher, "second"),
            Err(StoreError::ProfileExists)
        ));
    }

    #[test]
    fn unlock_with_no_profiles() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            unlock(&store, &Cipher::time_series(), "pw"),
            Err(StoreError::NoProfiles)
        ));
    }
}
