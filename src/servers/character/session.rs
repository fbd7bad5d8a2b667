use std::net::SocketAddr;

use super::guildcard::GuildcardTransfer;
use crate::protocol::records::{ClientConfig, CLIENT_CONFIG_MAGIC};

/// Set-flag value the client sends before a dressing room edit.
pub const DRESSING_ROOM_FLAG: u8 = 0x02;

/// Everything one connection remembers between packets.
pub struct ClientSession {
    pub peer: SocketAddr,
    pub guildcard: u32,
    pub team_id: u32,
    pub config: ClientConfig,
    pub flag: u8,
    pub guildcard_transfer: GuildcardTransfer,
    outbox: Vec<Vec<u8>>,
    closed: bool,
}

impl ClientSession {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            guildcard: 0,
            team_id: 0,
            config: ClientConfig::default(),
            flag: 0,
            guildcard_transfer: GuildcardTransfer::default(),
            outbox: Vec::new(),
            closed: false,
        }
    }

    pub fn char_selected(&self) -> bool {
        self.config.char_selected == 1
    }

    pub fn select_slot(&mut self, slot: u8) {
        self.config.char_selected = 1;
        self.config.slot = slot;
    }

    pub fn is_dressing_room(&self) -> bool {
        self.flag == DRESSING_ROOM_FLAG
    }

    /// Takes over the config a returning client echoed back, unless this
    /// connection already picked a character. Returns whether it was taken.
    pub fn adopt_client_config(&mut self, echoed: ClientConfig) -> bool {
        if echoed.magic != CLIENT_CONFIG_MAGIC || self.char_selected() {
            return false;
        }
        self.config = echoed;
        true
    }

    /// Queues a finished packet for the connection task to write.
    pub fn send(&mut self, pkt: Vec<u8>) {
        self.outbox.push(pkt);
    }

    pub fn outbox(&self) -> &[Vec<u8>] {
        &self.outbox
    }

    pub fn take_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    pub fn discard_outbox(&mut self) {
        self.outbox.clear();
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
