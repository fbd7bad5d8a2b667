use std::future::Future;

use sqlx::{MySqlPool, Row};

use super::stats::CharacterStats;
use super::{AccountError, CharacterError};
use crate::protocol::copy_utf16_bytes;
use crate::protocol::records::{CharacterPreview, GuildcardEntry};

/// Meseta a new character starts with.
pub const STARTING_MESETA: u32 = 300;

/// Placeholder blob sizes for a new character row.
pub const INVENTORY_SIZE: usize = 0x34C;
pub const TECHNIQUES_SIZE: usize = 0x14;
pub const CHAR_OPTIONS_SIZE: usize = 0xE8;

/// The account a login resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub guildcard: u32,
    pub team_id: u32,
}

/// Everything needed to insert a brand new character row.
#[derive(Debug, Clone, Copy)]
pub struct NewCharacter {
    pub preview: CharacterPreview,
    pub stats: CharacterStats,
    pub meseta: u32,
}

/// Persistence the CHARACTER port relies on.
///
/// Not-found is reported as `Ok(None)`; `Err` always means the store itself
/// failed (or, for `verify_account`, that the login was refused).
pub trait CharacterStore: Send + Sync + 'static {
    fn verify_account(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Account, CharacterError>> + Send;

    fn key_config(
        &self,
        guildcard: u32,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, CharacterError>> + Send;

    fn insert_key_config(
        &self,
        guildcard: u32,
        key_config: &[u8],
    ) -> impl Future<Output = Result<(), CharacterError>> + Send;

    fn character_preview(
        &self,
        guildcard: u32,
        slot: u32,
    ) -> impl Future<Output = Result<Option<CharacterPreview>, CharacterError>> + Send;

    /// At most `limit` friend records for the account.
    fn guildcard_entries(
        &self,
        guildcard: u32,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<GuildcardEntry>, CharacterError>> + Send;

    /// Dressing room edit of an existing character's appearance.
    fn update_character(
        &self,
        guildcard: u32,
        slot: u32,
        preview: &CharacterPreview,
    ) -> impl Future<Output = Result<(), CharacterError>> + Send;

    /// Deletes whatever occupies the slot and inserts `character` in its place.
    fn replace_character(
        &self,
        guildcard: u32,
        slot: u32,
        character: &NewCharacter,
    ) -> impl Future<Output = Result<(), CharacterError>> + Send;
}

/// `CharacterStore` backed by the MySQL schema in `migrations/`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> CharacterError {
    tracing::error!("[char] [db_error] {}", e);
    CharacterError::Database(e)
}

impl CharacterStore for MySqlStore {
    async fn verify_account(&self, username: &str, password: &str) -> Result<Account, CharacterError> {
        let row: Option<(String, u32, u32, u8, u8)> = sqlx::query_as(
            "SELECT `password`, `guildcard`, `team_id`, `is_banned`, `is_active` \
             FROM `accounts` WHERE `username` = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some((hash, guildcard, team_id, is_banned, is_active)) = row else {
            return Err(AccountError::UnknownUser(username.to_string()).into());
        };
        if !bcrypt::verify(password, &hash).unwrap_or(false) {
            return Err(AccountError::WrongPassword(username.to_string()).into());
        }
        if is_banned != 0 {
            return Err(AccountError::Banned(guildcard).into());
        }
        if is_active == 0 {
            return Err(AccountError::Inactive(guildcard).into());
        }
        Ok(Account { guildcard, team_id })
    }

    async fn key_config(&self, guildcard: u32) -> Result<Option<Vec<u8>>, CharacterError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT `key_config` FROM `player_options` WHERE `guildcard` = ?",
        )
        .bind(guildcard)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(|(data,)| data))
    }

    async fn insert_key_config(&self, guildcard: u32, key_config: &[u8]) -> Result<(), CharacterError> {
        sqlx::query("INSERT INTO `player_options` (`guildcard`, `key_config`) VALUES (?, ?)")
            .bind(guildcard)
            .bind(key_config)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn character_preview(
        &self,
        guildcard: u32,
        slot: u32,
    ) -> Result<Option<CharacterPreview>, CharacterError> {
        let row = sqlx::query(
            "SELECT `experience`, `level`, `guildcard_str`, `name_color`, \
             `name_color_chksm`, `model`, `section_id`, `char_class`, `v2_flags`, \
             `version`, `v1_flags`, `costume`, `skin`, `face`, `head`, `hair`, \
             `hair_red`, `hair_green`, `hair_blue`, `proportion_x`, `proportion_y`, \
             `name`, `playtime` \
             FROM `characters` WHERE `guildcard` = ? AND `slot_num` = ?",
        )
        .bind(guildcard)
        .bind(slot)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else { return Ok(None) };

        let mut prev = CharacterPreview {
            experience: row.try_get(0).map_err(db_error)?,
            level: row.try_get(1).map_err(db_error)?,
            name_color: row.try_get(3).map_err(db_error)?,
            name_color_chksm: row.try_get(4).map_err(db_error)?,
            model: row.try_get(5).map_err(db_error)?,
            section_id: row.try_get(6).map_err(db_error)?,
            class: row.try_get(7).map_err(db_error)?,
            v2_flags: row.try_get(8).map_err(db_error)?,
            version: row.try_get(9).map_err(db_error)?,
            v1_flags: row.try_get(10).map_err(db_error)?,
            costume: row.try_get(11).map_err(db_error)?,
            skin: row.try_get(12).map_err(db_error)?,
            face: row.try_get(13).map_err(db_error)?,
            head: row.try_get(14).map_err(db_error)?,
            hair: row.try_get(15).map_err(db_error)?,
            hair_red: row.try_get(16).map_err(db_error)?,
            hair_green: row.try_get(17).map_err(db_error)?,
            hair_blue: row.try_get(18).map_err(db_error)?,
            prop_x: row.try_get(19).map_err(db_error)?,
            prop_y: row.try_get(20).map_err(db_error)?,
            playtime: row.try_get(22).map_err(db_error)?,
            ..Default::default()
        };
        let gc_str: Vec<u8> = row.try_get(2).map_err(db_error)?;
        let name: Vec<u8> = row.try_get(21).map_err(db_error)?;
        copy_bytes(&mut prev.guildcard_str, &gc_str);
        copy_bytes(&mut prev.name, &name);
        Ok(Some(prev))
    }

    async fn guildcard_entries(
        &self,
        guildcard: u32,
        limit: usize,
    ) -> Result<Vec<GuildcardEntry>, CharacterError> {
        let rows = sqlx::query(
            "SELECT `friend_gc`, `name`, `team_name`, `description`, `language`, \
             `section_id`, `char_class`, `comment` FROM `guildcard_entries` \
             WHERE `guildcard` = ? ORDER BY `id` LIMIT ?",
        )
        .bind(guildcard)
        .bind(limit as u64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entry = GuildcardEntry {
                guildcard: row.try_get(0).map_err(db_error)?,
                language: row.try_get(4).map_err(db_error)?,
                section_id: row.try_get(5).map_err(db_error)?,
                char_class: row.try_get(6).map_err(db_error)?,
                ..Default::default()
            };
            let name: Vec<u8> = row.try_get(1).map_err(db_error)?;
            let team_name: Vec<u8> = row.try_get(2).map_err(db_error)?;
            let description: Vec<u8> = row.try_get(3).map_err(db_error)?;
            let comment: Vec<u8> = row.try_get(7).map_err(db_error)?;
            copy_utf16_bytes(&mut entry.name, &name);
            copy_utf16_bytes(&mut entry.team_name, &team_name);
            copy_utf16_bytes(&mut entry.description, &description);
            copy_utf16_bytes(&mut entry.comment, &comment);
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn update_character(
        &self,
        guildcard: u32,
        slot: u32,
        prev: &CharacterPreview,
    ) -> Result<(), CharacterError> {
        sqlx::query(
            "UPDATE `characters` SET `name_color` = ?, `model` = ?, `name_color_chksm` = ?, \
             `section_id` = ?, `char_class` = ?, `costume` = ?, `skin` = ?, `face` = ?, \
             `head` = ?, `hair` = ?, `hair_red` = ?, `hair_green` = ?, `hair_blue` = ?, \
             `proportion_x` = ?, `proportion_y` = ?, `name` = ? \
             WHERE `guildcard` = ? AND `slot_num` = ?",
        )
        .bind(prev.name_color)
        .bind(prev.model)
        .bind(prev.name_color_chksm)
        .bind(prev.section_id)
        .bind(prev.class)
        .bind(prev.costume)
        .bind(prev.skin)
        .bind(prev.face)
        .bind(prev.head)
        .bind(prev.hair)
        .bind(prev.hair_red)
        .bind(prev.hair_green)
        .bind(prev.hair_blue)
        .bind(prev.prop_x)
        .bind(prev.prop_y)
        .bind(&prev.name[..])
        .bind(guildcard)
        .bind(slot)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn replace_character(
        &self,
        guildcard: u32,
        slot: u32,
        character: &NewCharacter,
    ) -> Result<(), CharacterError> {
        let prev = &character.preview;
        let stats = &character.stats;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM `characters` WHERE `guildcard` = ? AND `slot_num` = ?")
            .bind(guildcard)
            .bind(slot)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO `characters` (`guildcard`, `slot_num`, `experience`, `level`, \
             `guildcard_str`, `name_color`, `model`, `name_color_chksm`, `section_id`, \
             `char_class`, `v2_flags`, `version`, `v1_flags`, `costume`, `skin`, `face`, \
             `head`, `hair`, `hair_red`, `hair_green`, `hair_blue`, `proportion_x`, \
             `proportion_y`, `name`, `playtime`, `atp`, `mst`, `evp`, `hp`, `dfp`, `ata`, \
             `lck`, `meseta`, `inventory`, `techniques`, `options`) \
             VALUES (?, ?, 0, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
             0, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(guildcard)
        .bind(slot)
        .bind(&prev.guildcard_str[..])
        .bind(prev.name_color)
        .bind(prev.model)
        .bind(prev.name_color_chksm)
        .bind(prev.section_id)
        .bind(prev.class)
        .bind(prev.v2_flags)
        .bind(prev.version)
        .bind(prev.v1_flags)
        .bind(prev.costume)
        .bind(prev.skin)
        .bind(prev.face)
        .bind(prev.head)
        .bind(prev.hair)
        .bind(prev.hair_red)
        .bind(prev.hair_green)
        .bind(prev.hair_blue)
        .bind(prev.prop_x)
        .bind(prev.prop_y)
        .bind(&prev.name[..])
        .bind(stats.atp)
        .bind(stats.mst)
        .bind(stats.evp)
        .bind(stats.hp)
        .bind(stats.dfp)
        .bind(stats.ata)
        .bind(stats.lck)
        .bind(character.meseta)
        .bind(vec![0u8; INVENTORY_SIZE])
        .bind(vec![0xFFu8; TECHNIQUES_SIZE])
        .bind(vec![0u8; CHAR_OPTIONS_SIZE])
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

/// Copies a stored byte column into a fixed field, zero-padding the rest.
fn copy_bytes(dst: &mut [u8], src: &[u8]) {
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src[..len]);
    dst[len..].fill(0);
}

#[cfg(test)]
mod tests {
    // MySqlStore needs a live DATABASE_URL; the dispatcher tests run
    // against MemoryStore instead.
    use super::*;

    #[test]
    fn test_copy_bytes_pads() {
        let mut field = [0xFFu8; 4];
        copy_bytes(&mut field, &[1, 2]);
        assert_eq!(field, [1, 2, 0, 0]);
        copy_bytes(&mut field, &[9; 8]);
        assert_eq!(field, [9; 4]);
    }

    #[test]
    fn test_placeholder_sizes() {
        // 30 inventory slots of 28 bytes behind a 4 byte header
        assert_eq!(INVENTORY_SIZE, 4 + 30 * 28);
        assert_eq!(STARTING_MESETA, 300);
    }
}
