//! Best-streak persistence. One decimal integer under `<namespace>_highscore`.

use std::cell::Cell;

use crate::error::StorageError;

pub const STORAGE_NAMESPACE: &str = "zenpulse";

pub fn high_score_key(namespace: &str) -> String {
    format!("{namespace}_highscore")
}

/// Missing or garbled values read as 0.
pub fn parse_high_score(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

pub trait HighScoreStore {
    fn load(&self) -> u32;
    fn save(&self, score: u32) -> Result<(), StorageError>;
}

/// `window.localStorage` backed store.
pub struct LocalStorageStore {
    key: String,
}

impl LocalStorageStore {
    pub fn new(namespace: &str) -> Self {
        Self {
            key: high_score_key(namespace),
        }
    }

    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|w| w.local_storage().ok().flatten())
    }
}

impl HighScoreStore for LocalStorageStore {
    fn load(&self) -> u32 {
        let raw = Self::storage().and_then(|s| s.get_item(&self.key).ok().flatten());
        parse_high_score(raw.as_deref())
    }

    fn save(&self, score: u32) -> Result<(), StorageError> {
        let storage = Self::storage().ok_or(StorageError::Unavailable)?;
        storage
            .set_item(&self.key, &score.to_string())
            .map_err(|e| StorageError::Write(format!("{e:?}")))
    }
}

/// In-process store for native runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Cell<Option<u32>>,
}

impl MemoryStore {
    pub fn with_score(score: u32) -> Self {
        Self {
            value: Cell::new(Some(score)),
        }
    }

    pub fn stored(&self) -> Option<u32> {
        self.value.get()
    }
}

impl HighScoreStore for MemoryStore {
    fn load(&self) -> u32 {
        self.value.get().unwrap_or(0)
    }

    fn save(&self, score: u32) -> Result<(), StorageError> {
        self.value.set(Some(score));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(high_score_key(STORAGE_NAMESPACE), "zenpulse_highscore");
    }

    #[test]
    fn test_parse_high_score() {
        assert_eq!(parse_high_score(None), 0);
        assert_eq!(parse_high_score(Some("17")), 17);
        assert_eq!(parse_high_score(Some(" 4 ")), 4);
        assert_eq!(parse_high_score(Some("NaN")), 0);
        assert_eq!(parse_high_score(Some("-3")), 0);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert_eq!(store.load(), 0);
        store.save(9).unwrap();
        assert_eq!(store.load(), 9);
        assert_eq!(store.stored(), Some(9));
    }
}
