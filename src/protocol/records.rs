//! Fixed-layout records exchanged with the client.
//!
//! Every record is `#[repr(C)]` with explicit padding fields, so the in-memory
//! layout is the wire layout. Sizes are pinned by the `layout_tests` below.

use bytemuck::{Pod, Zeroable};

/// Decodes a record from the front of `buf`.
///
/// Panics if `buf` is shorter than the record. Callers check the declared
/// packet length against `size_of::<T>()` before decoding.
pub fn decode<T: Pod>(buf: &[u8]) -> T {
    bytemuck::pod_read_unaligned(&buf[..std::mem::size_of::<T>()])
}

/// Raw wire bytes of a record.
pub fn encode<T: Pod>(record: &T) -> &[u8] {
    bytemuck::bytes_of(record)
}

/// Marks a client config as one this server handed out.
pub const CLIENT_CONFIG_MAGIC: u32 = 0x4861_5467;

/// Login state the client keeps between connections. Sent inside every
/// security packet and echoed back in the login packet.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ClientConfig {
    pub magic: u32,
    pub char_selected: u8,
    pub slot: u8,
    pub flags: u16,
    pub ports: [u16; 4],
    pub unused: [u32; 4],
    pub unused2: [u32; 2],
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { magic: CLIENT_CONFIG_MAGIC, ..Self::zeroed() }
    }
}

/// Body of the login packet (0x93).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LoginRequest {
    pub unknown: [u8; 8],
    pub client_version: u16,
    pub unknown2: [u8; 6],
    pub team_id: u32,
    pub username: [u8; 16],
    pub padding: [u8; 32],
    pub password: [u8; 16],
    pub padding2: [u8; 40],
    pub hardware_info: [u8; 8],
    pub security: [u8; 40],
}

impl LoginRequest {
    pub fn username(&self) -> String {
        fixed_str(&self.username)
    }

    pub fn password(&self) -> String {
        fixed_str(&self.password)
    }

    /// The config the client echoed back from an earlier security packet.
    pub fn client_config(&self) -> ClientConfig {
        decode(&self.security)
    }
}

/// Reads a NUL-padded byte field as text.
pub fn fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Body of the character select/preview request (0xE3).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CharSelectRequest {
    pub slot: u8,
    pub padding: [u8; 3],
    pub selecting: u8,
    pub padding2: [u8; 3],
}

/// One character slot as shown on the character select screen.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CharacterPreview {
    pub experience: u32,
    pub level: u32,
    pub guildcard_str: [u8; 16],
    pub unknown: [u32; 2],
    pub name_color: u32,
    pub model: u8,
    pub padding: [u8; 15],
    pub name_color_chksm: u32,
    pub section_id: u8,
    pub class: u8,
    pub v2_flags: u8,
    pub version: u8,
    pub v1_flags: u32,
    pub costume: u16,
    pub skin: u16,
    pub face: u16,
    pub head: u16,
    pub hair: u16,
    pub hair_red: u16,
    pub hair_green: u16,
    pub hair_blue: u16,
    pub prop_x: f32,
    pub prop_y: f32,
    pub name: [u8; 24],
    pub playtime: u32,
}

/// Slot number plus preview: the body of 0xE5 in both directions.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CharPreviewBody {
    pub slot: u32,
    pub character: CharacterPreview,
}

/// Body of the character ack (0xE4).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CharAck {
    pub slot: u32,
    pub status: u32,
}

/// Body of the security packet (0xE6).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SecurityBody {
    pub error_code: u32,
    pub player_tag: u32,
    pub guildcard: u32,
    pub team_id: u32,
    pub config: ClientConfig,
    pub capabilities: u32,
}

/// Body of the set-flag packet (0xEC).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SetFlagRequest {
    pub flag: u32,
}

/// One friend list record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GuildcardEntry {
    pub guildcard: u32,
    pub name: [u16; 24],
    pub team_name: [u16; 16],
    pub description: [u16; 88],
    pub reserved: u8,
    pub language: u8,
    pub section_id: u8,
    pub char_class: u8,
    pub padding: u32,
    pub comment: [u16; 88],
}

impl Default for GuildcardEntry {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

/// Number of friend records the guildcard file has room for.
pub const GUILDCARD_SLOTS: usize = 104;

/// The guildcard file as the client stores it.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct GuildcardData {
    pub unknown: [u8; 0x114],
    /// Blocked sender list; not modelled yet.
    pub blocked: [u8; 0x1DE8],
    pub unknown2: [u8; 0x78],
    pub entries: [GuildcardEntry; GUILDCARD_SLOTS],
    pub unknown3: [u8; 0x1BC],
}

/// Body of the guildcard header (0x01DC).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GuildcardHeaderBody {
    pub unknown: u32,
    pub length: u16,
    pub padding: u16,
    pub checksum: u32,
}

/// Body of the guildcard chunk request (0x03DC).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GuildcardChunkRequest {
    pub unknown: u32,
    pub chunk: u32,
    pub cont: u32,
}

/// Directory entry for one parameter file.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ParameterEntry {
    pub size: u32,
    pub checksum: u32,
    pub offset: u32,
    pub filename: [u8; 0x40],
}

/// Key bindings and team membership (body of 0xE2).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct KeyTeamConfig {
    pub unknown: [u8; 0x114],
    pub key_config: [u8; 0x16C],
    pub joystick_config: [u8; 0x38],
    pub guildcard: u32,
    pub team_id: u32,
    pub team_info: [u32; 2],
    pub team_privilege: u16,
    pub reserved: u16,
    pub team_name: [u16; 16],
    pub team_flag: [u8; 2048],
    pub team_rewards: [u32; 2],
}
