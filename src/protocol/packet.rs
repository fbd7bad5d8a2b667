//! Builders for every packet the CHARACTER port sends.
//!
//! Each builder returns the finished packet bytes: header stamped with the
//! padded size, body little-endian. Only packets with a variable length body
//! (ship list, scroll message, parameter header) can outgrow the size field.

use chrono::{DateTime, Utc};

use super::records::{
    CharAck, CharPreviewBody, CharacterPreview, ClientConfig, GuildcardHeaderBody,
    KeyTeamConfig, SecurityBody,
};
use super::*;
use crate::config::ShipEntry;

/// Security error code for a successful login.
pub const LOGIN_ERROR_NONE: u32 = 0;

const PLAYER_TAG: u32 = 0x0001_0000;
const CAPABILITIES: u32 = 0x0000_0102;

/// Menu id the ship select entries are tagged with.
pub const SHIP_SELECT_MENU_ID: u16 = 0x0012;

/// Status carried by the character ack (0xE4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CharAckStatus {
    /// Character created or updated.
    Updated = 0,
    Selected = 1,
    EmptySlot = 2,
}

pub fn build_security(
    error_code: u32,
    guildcard: u32,
    team_id: u32,
    config: &ClientConfig,
) -> Result<Vec<u8>, PacketTooLarge> {
    let body = SecurityBody {
        error_code,
        player_tag: PLAYER_TAG,
        guildcard,
        team_id,
        config: *config,
        capabilities: CAPABILITIES,
    };
    let mut w = PacketWriter::new(SECURITY_TYPE, 0);
    w.put_record(&body);
    w.finish()
}

/// Timestamp in the `YYYY:MM:DD: HH:MM:SS.mmm` form the client expects.
pub fn build_timestamp(now: DateTime<Utc>) -> Result<Vec<u8>, PacketTooLarge> {
    let text = now.format("%Y:%m:%d: %H:%M:%S%.3f").to_string();
    let mut field = [0u8; 28];
    copy_ascii(&mut field, &text);
    let mut w = PacketWriter::new(TIMESTAMP_TYPE, 0);
    w.put_slice(&field);
    w.finish()
}

pub fn build_ship_list(server_name: &str, ships: &[ShipEntry]) -> Result<Vec<u8>, PacketTooLarge> {
    let mut name = [0u8; 0x22];
    let mut w = PacketWriter::new(SHIP_LIST_TYPE, ships.len() as u32);
    w.put_u16(0).put_u16(0x0020).put_u32(0xFFFF_FFF4).put_u16(0x0004);
    copy_ascii(&mut name, server_name);
    w.put_slice(&name);
    for ship in ships {
        copy_ascii(&mut name, &ship.name);
        w.put_u16(SHIP_SELECT_MENU_ID).put_u32(ship.id).put_u16(0);
        w.put_slice(&name);
    }
    w.finish()
}

pub fn build_scroll_message(message: &str) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(SCROLL_MESSAGE_TYPE, 0);
    w.put_u32(0).put_u32(0);
    w.put_slice(&encode_utf16(message));
    w.finish()
}

/// Options packet carrying the 420 byte key config and the team defaults.
pub fn build_options(key_config: &[u8], guildcard: u32, team_id: u32) -> Result<Vec<u8>, PacketTooLarge> {
    let mut cfg: Box<KeyTeamConfig> = bytemuck::zeroed_box();
    let split = cfg.key_config.len();
    let keys = &key_config[..split.min(key_config.len())];
    cfg.key_config[..keys.len()].copy_from_slice(keys);
    if key_config.len() > split {
        let joy = &key_config[split..];
        let n = joy.len().min(cfg.joystick_config.len());
        cfg.joystick_config[..n].copy_from_slice(&joy[..n]);
    }
    cfg.guildcard = guildcard;
    cfg.team_id = team_id;
    cfg.team_rewards = [0xFFFF_FFFF; 2];

    let mut w = PacketWriter::new(OPTIONS_TYPE, 0);
    w.put_record(&*cfg);
    w.finish()
}

pub fn build_char_ack(slot: u32, status: CharAckStatus) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(CHAR_ACK_TYPE, 0);
    w.put_record(&CharAck { slot, status: status as u32 });
    w.finish()
}

pub fn build_char_preview(slot: u32, character: &CharacterPreview) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(CHAR_PREVIEW_TYPE, 0);
    w.put_record(&CharPreviewBody { slot, character: *character });
    w.finish()
}

pub fn build_checksum_ack(ack: u32) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(CHECKSUM_ACK_TYPE, 0);
    w.put_u32(ack);
    w.finish()
}

pub fn build_guildcard_header(checksum: u32, length: u16) -> Result<Vec<u8>, PacketTooLarge> {
    let body = GuildcardHeaderBody { unknown: 1, length, padding: 0, checksum };
    let mut w = PacketWriter::new(GUILDCARD_HEADER_TYPE, 0);
    w.put_record(&body);
    w.finish()
}

pub fn build_guildcard_chunk(index: u32, data: &[u8]) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(GUILDCARD_CHUNK_TYPE, 0);
    w.put_u32(0).put_u32(index).put_slice(data);
    w.finish()
}

pub fn build_param_header(file_count: u32, header: &[u8]) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(PARAM_HEADER_TYPE, file_count);
    w.put_slice(header);
    w.finish()
}

pub fn build_param_chunk(index: u32, data: &[u8]) -> Result<Vec<u8>, PacketTooLarge> {
    let mut w = PacketWriter::new(PARAM_CHUNK_TYPE, 0);
    w.put_u32(index).put_slice(data);
    w.finish()
}
