//! In-process `CharacterStore`, for tests and running without MySQL.

use std::collections::HashMap;
use tokio::sync::Mutex;

use super::db::{Account, CharacterStore, NewCharacter};
use super::stats::CharacterStats;
use super::{AccountError, CharacterError};
use crate::protocol::records::{CharacterPreview, GuildcardEntry};

struct MemoryAccount {
    password: String,
    account: Account,
    banned: bool,
}

/// A stored character row.
#[derive(Debug, Clone, Copy)]
pub struct StoredCharacter {
    pub preview: CharacterPreview,
    pub stats: CharacterStats,
    pub meseta: u32,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, MemoryAccount>,
    key_configs: HashMap<u32, Vec<u8>>,
    key_config_inserts: usize,
    /// (guildcard, slot) -> rows; a correct store never holds more than one.
    characters: HashMap<(u32, u32), Vec<StoredCharacter>>,
    guildcards: HashMap<u32, Vec<GuildcardEntry>>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_account(&self, username: &str, password: &str, guildcard: u32, team_id: u32) {
        let mut t = self.tables.lock().await;
        t.accounts.insert(
            username.to_string(),
            MemoryAccount {
                password: password.to_string(),
                account: Account { guildcard, team_id },
                banned: false,
            },
        );
    }

    pub async fn ban(&self, username: &str) {
        if let Some(acc) = self.tables.lock().await.accounts.get_mut(username) {
            acc.banned = true;
        }
    }

    pub async fn add_character(&self, guildcard: u32, slot: u32, preview: CharacterPreview) {
        let row = StoredCharacter { preview, stats: CharacterStats::default(), meseta: 0 };
        self.tables.lock().await.characters.insert((guildcard, slot), vec![row]);
    }

    pub async fn add_guildcard_entry(&self, guildcard: u32, entry: GuildcardEntry) {
        self.tables.lock().await.guildcards.entry(guildcard).or_default().push(entry);
    }

    pub async fn characters(&self, guildcard: u32, slot: u32) -> Vec<StoredCharacter> {
        self.tables
            .lock()
            .await
            .characters
            .get(&(guildcard, slot))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn stored_key_config(&self, guildcard: u32) -> Option<Vec<u8>> {
        self.tables.lock().await.key_configs.get(&guildcard).cloned()
    }

    /// How many times a key config has been inserted.
    pub async fn key_config_inserts(&self) -> usize {
        self.tables.lock().await.key_config_inserts
    }

    /// Makes every write fail with a database error.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.tables.lock().await.fail_writes = fail;
    }
}

fn write_failure() -> CharacterError {
    CharacterError::Database(sqlx::Error::Protocol("writes disabled".to_string()))
}

impl CharacterStore for MemoryStore {
    async fn verify_account(&self, username: &str, password: &str) -> Result<Account, CharacterError> {
        let t = self.tables.lock().await;
        let acc = t
            .accounts
            .get(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        if acc.password != password {
            return Err(AccountError::WrongPassword(username.to_string()).into());
        }
        if acc.banned {
            return Err(AccountError::Banned(acc.account.guildcard).into());
        }
        Ok(acc.account)
    }

    async fn key_config(&self, guildcard: u32) -> Result<Option<Vec<u8>>, CharacterError> {
        Ok(self.tables.lock().await.key_configs.get(&guildcard).cloned())
    }

    async fn insert_key_config(&self, guildcard: u32, key_config: &[u8]) -> Result<(), CharacterError> {
        let mut t = self.tables.lock().await;
        if t.fail_writes {
            return Err(write_failure());
        }
        t.key_configs.insert(guildcard, key_config.to_vec());
        t.key_config_inserts += 1;
        Ok(())
    }

    async fn character_preview(
        &self,
        guildcard: u32,
        slot: u32,
    ) -> Result<Option<CharacterPreview>, CharacterError> {
        let t = self.tables.lock().await;
        Ok(t.characters
            .get(&(guildcard, slot))
            .and_then(|rows| rows.first())
            .map(|row| row.preview))
    }

    async fn guildcard_entries(
        &self,
        guildcard: u32,
        limit: usize,
    ) -> Result<Vec<GuildcardEntry>, CharacterError> {
        let t = self.tables.lock().await;
        Ok(t.guildcards
            .get(&guildcard)
            .map(|entries| entries.iter().take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn update_character(
        &self,
        guildcard: u32,
        slot: u32,
        preview: &CharacterPreview,
    ) -> Result<(), CharacterError> {
        let mut t = self.tables.lock().await;
        if t.fail_writes {
            return Err(write_failure());
        }
        if let Some(rows) = t.characters.get_mut(&(guildcard, slot)) {
            for row in rows.iter_mut() {
                apply_appearance(&mut row.preview, preview);
            }
        }
        Ok(())
    }

    async fn replace_character(
        &self,
        guildcard: u32,
        slot: u32,
        character: &NewCharacter,
    ) -> Result<(), CharacterError> {
        let mut t = self.tables.lock().await;
        if t.fail_writes {
            return Err(write_failure());
        }
        let row = StoredCharacter {
            preview: CharacterPreview { experience: 0, level: 1, playtime: 0, ..character.preview },
            stats: character.stats,
            meseta: character.meseta,
        };
        t.characters.insert((guildcard, slot), vec![row]);
        Ok(())
    }
}

/// The columns a dressing room edit rewrites; level, experience and
/// playtime stay.
fn apply_appearance(dst: &mut CharacterPreview, src: &CharacterPreview) {
    dst.name_color = src.name_color;
    dst.model = src.model;
    dst.name_color_chksm = src.name_color_chksm;
    dst.section_id = src.section_id;
    dst.class = src.class;
    dst.costume = src.costume;
    dst.skin = src.skin;
    dst.face = src.face;
    dst.head = src.head;
    dst.hair = src.hair;
    dst.hair_red = src.hair_red;
    dst.hair_green = src.hair_green;
    dst.hair_blue = src.hair_blue;
    dst.prop_x = src.prop_x;
    dst.prop_y = src.prop_y;
    dst.name = src.name;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_account() {
        let store = MemoryStore::new();
        store.add_account("alice", "pw", 42000001, 5).await;

        let acc = store.verify_account("alice", "pw").await.unwrap();
        assert_eq!(acc.guildcard, 42000001);
        assert_eq!(acc.team_id, 5);

        assert!(matches!(
            store.verify_account("alice", "nope").await,
            Err(CharacterError::Account(AccountError::WrongPassword(_)))
        ));
        assert!(matches!(
            store.verify_account("bob", "pw").await,
            Err(CharacterError::Account(AccountError::UnknownUser(_)))
        ));

        store.ban("alice").await;
        assert!(matches!(
            store.verify_account("alice", "pw").await,
            Err(CharacterError::Account(AccountError::Banned(42000001)))
        ));
    }

    #[tokio::test]
    async fn test_replace_leaves_one_row() {
        let store = MemoryStore::new();
        store.add_character(1, 0, CharacterPreview { level: 50, ..Default::default() }).await;
        let new = NewCharacter {
            preview: CharacterPreview { class: 3, level: 50, ..Default::default() },
            stats: CharacterStats::default(),
            meseta: 300,
        };
        store.replace_character(1, 0, &new).await.unwrap();

        let rows = store.characters(1, 0).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].preview.class, 3);
        assert_eq!(rows[0].preview.level, 1);
        assert_eq!(rows[0].meseta, 300);
    }

    #[tokio::test]
    async fn test_update_keeps_progress() {
        let store = MemoryStore::new();
        store
            .add_character(1, 2, CharacterPreview { level: 30, experience: 999, ..Default::default() })
            .await;
        let edit = CharacterPreview { hair: 4, level: 1, ..Default::default() };
        store.update_character(1, 2, &edit).await.unwrap();

        let row = store.character_preview(1, 2).await.unwrap().unwrap();
        assert_eq!(row.hair, 4);
        assert_eq!(row.level, 30);
        assert_eq!(row.experience, 999);
    }

    #[tokio::test]
    async fn test_guildcard_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .add_guildcard_entry(7, GuildcardEntry { guildcard: i, ..Default::default() })
                .await;
        }
        assert_eq!(store.guildcard_entries(7, 3).await.unwrap().len(), 3);
        assert!(store.guildcard_entries(8, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true).await;
        assert!(matches!(
            store.insert_key_config(1, &[0; 420]).await,
            Err(CharacterError::Database(_))
        ));
        assert_eq!(store.key_config_inserts().await, 0);
    }
}
