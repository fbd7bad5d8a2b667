//! Blue Burst login protocol: packet header, packet type ids and the
//! writer every outbound packet is assembled with.
//!
//! All integers on the wire are little-endian. Fixed-layout records live in
//! [`records`]; one builder per outbound packet lives in [`packet`].

pub mod packet;
pub mod records;

use bytes::{BufMut, BytesMut};
use flate2::Crc;

// Records are cast straight to and from wire bytes.
#[cfg(not(target_endian = "little"))]
compile_error!("the wire records assume a little-endian host");

/// Every packet starts with an 8 byte header.
pub const HEADER_SIZE: usize = 8;

/// Outbound packets are padded to a multiple of this.
pub const PACKET_ALIGN: usize = 8;

/// Largest slice of a chunked transfer the client accepts per packet.
pub const MAX_CHUNK_SIZE: usize = 0x6800;

/// Largest padded packet the 16-bit size field can describe.
pub const MAX_PACKET_SIZE: usize = 0xFFF8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("packet {pkt_type:#06x} is {len} bytes, over the {max} byte limit", max = MAX_PACKET_SIZE)]
pub struct PacketTooLarge {
    pub pkt_type: u16,
    pub len: usize,
}

// ── Inbound packet types ─────────────────────────────────────────────────────
pub const DISCONNECT_TYPE: u16 = 0x0005;
pub const MENU_SELECT_TYPE: u16 = 0x0010;
pub const LOGIN_TYPE: u16 = 0x0093;
pub const OPTIONS_REQUEST_TYPE: u16 = 0x00E0;
pub const CHAR_SELECT_TYPE: u16 = 0x00E3;
pub const SET_FLAG_TYPE: u16 = 0x00EC;
pub const CHECKSUM_TYPE: u16 = 0x01E8;
pub const GUILDCARD_REQ_TYPE: u16 = 0x03E8;
pub const GUILDCARD_CHUNK_REQ_TYPE: u16 = 0x03DC;
pub const PARAM_CHUNK_REQ_TYPE: u16 = 0x03EB;
pub const PARAM_HEADER_REQ_TYPE: u16 = 0x04EB;

/// Character preview: sent by the server, and by the client to create or
/// update a character.
pub const CHAR_PREVIEW_TYPE: u16 = 0x00E5;

// ── Outbound packet types ────────────────────────────────────────────────────
pub const SHIP_LIST_TYPE: u16 = 0x00A0;
pub const TIMESTAMP_TYPE: u16 = 0x00B1;
pub const OPTIONS_TYPE: u16 = 0x00E2;
pub const CHAR_ACK_TYPE: u16 = 0x00E4;
pub const SECURITY_TYPE: u16 = 0x00E6;
pub const SCROLL_MESSAGE_TYPE: u16 = 0x00EE;
pub const GUILDCARD_HEADER_TYPE: u16 = 0x01DC;
pub const GUILDCARD_CHUNK_TYPE: u16 = 0x02DC;
pub const CHECKSUM_ACK_TYPE: u16 = 0x02E8;
pub const PARAM_HEADER_TYPE: u16 = 0x01EB;
pub const PARAM_CHUNK_TYPE: u16 = 0x02EB;

/// The 8 byte header in front of every packet.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PacketHeader {
    /// Total packet length including this header.
    pub size: u16,
    pub pkt_type: u16,
    pub flags: u32,
}

impl PacketHeader {
    /// Decodes the header at the front of `buf`.
    ///
    /// Panics if `buf` is shorter than [`HEADER_SIZE`]; the transport never
    /// hands over a packet without a complete header.
    pub fn parse(buf: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&buf[..HEADER_SIZE])
    }
}

/// Rounds `len` up to the packet alignment.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(PACKET_ALIGN) * PACKET_ALIGN
}

/// Builds one outbound packet: header first, body appended, then padded and
/// stamped with its final size by [`PacketWriter::finish`].
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new(pkt_type: u16, flags: u32) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u16_le(0);
        buf.put_u16_le(pkt_type);
        buf.put_u32_le(flags);
        Self { buf }
    }

    pub fn put_record<T: bytemuck::Pod>(&mut self, record: &T) -> &mut Self {
        self.buf.put_slice(bytemuck::bytes_of(record));
        self
    }

    pub fn put_slice(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    pub fn put_u16(&mut self, val: u16) -> &mut Self {
        self.buf.put_u16_le(val);
        self
    }

    pub fn put_u32(&mut self, val: u32) -> &mut Self {
        self.buf.put_u32_le(val);
        self
    }

    /// Pads the packet and stamps its size. Fails if the padded length does
    /// not fit the header's size field.
    pub fn finish(mut self) -> Result<Vec<u8>, PacketTooLarge> {
        let len = padded_len(self.buf.len());
        let size = u16::try_from(len).map_err(|_| PacketTooLarge {
            pkt_type: u16::from_le_bytes([self.buf[2], self.buf[3]]),
            len,
        })?;
        self.buf.resize(len, 0);
        self.buf[..2].copy_from_slice(&size.to_le_bytes());
        Ok(self.buf.to_vec())
    }
}

/// CRC32 (IEEE), the checksum the client verifies chunked transfers with.
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Number of [`MAX_CHUNK_SIZE`] slices needed to carry `len` bytes.
pub fn chunk_count(len: usize) -> usize {
    len.div_ceil(MAX_CHUNK_SIZE)
}

/// The `index`-th slice of `data`; the last one may be short.
pub fn chunk_at(data: &[u8], index: u32) -> Option<&[u8]> {
    let start = (index as usize).checked_mul(MAX_CHUNK_SIZE)?;
    if start >= data.len() {
        return None;
    }
    let end = (start + MAX_CHUNK_SIZE).min(data.len());
    Some(&data[start..end])
}

/// Copies `src` into a fixed byte field, truncating and zero-padding.
pub fn copy_ascii(dst: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    let len = bytes.len().min(dst.len());
    dst[..len].copy_from_slice(&bytes[..len]);
    dst[len..].fill(0);
}

/// Copies a stored UTF-16LE byte blob into a fixed wide-character field.
/// An odd trailing byte is dropped.
pub fn copy_utf16_bytes(dst: &mut [u16], src: &[u8]) {
    let mut chars = src.chunks_exact(2).map(|p| u16::from_le_bytes([p[0], p[1]]));
    for slot in dst.iter_mut() {
        *slot = chars.next().unwrap_or(0);
    }
}

/// Encodes `text` as UTF-16LE followed by a terminating NUL character.
pub fn encode_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Renders a packet as `offset | hex | ascii` rows for debug logging.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:04x} | {:<47} | {}\n", row * 16, hex.join(" "), ascii));
    }
    out
}
