//! The CHARACTER port: character roster, key config, guildcards and the
//! parameter files, served to a client that has already passed the login
//! port.

pub mod db;
pub mod dispatch;
pub mod guildcard;
pub mod memory;
pub mod params;
pub mod session;
pub mod stats;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::network::{read_packet, PacketCipher, Plaintext};
use crate::protocol::PacketTooLarge;
use db::CharacterStore;
use params::ParameterCache;
use session::ClientSession;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("no account named {0}")]
    UnknownUser(String),
    #[error("wrong password for {0}")]
    WrongPassword(String),
    #[error("account {0} is banned")]
    Banned(u32),
    #[error("account {0} is not activated")]
    Inactive(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum CharacterError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("login refused: {0}")]
    Account(#[from] AccountError),
    #[error("packet {pkt_type:#06x} is {len} bytes, need {need}")]
    Truncated { pkt_type: u16, len: usize, need: usize },
    #[error("unknown character class {0:#04x}")]
    UnknownClass(u8),
    #[error("guildcard chunk requested before the header")]
    TransferNotStarted,
    #[error("chunk {index} out of range ({count} chunks)")]
    ChunkOutOfRange { index: u32, count: usize },
    #[error("slot {0} out of range")]
    BadSlot(u32),
    #[error(transparent)]
    Oversize(#[from] PacketTooLarge),
}

/// Shared by every connection on the port.
pub struct CharacterState<S: CharacterStore> {
    pub store: S,
    pub config: ServerConfig,
    pub params: Arc<ParameterCache>,
    /// Key config installed for accounts that have none yet.
    pub default_key_config: Vec<u8>,
}

impl<S: CharacterStore> CharacterState<S> {
    pub fn new(
        store: S,
        config: ServerConfig,
        params: Arc<ParameterCache>,
        default_key_config: Vec<u8>,
    ) -> Self {
        Self { store, config, params, default_key_config }
    }

    pub async fn run(state: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!("[char] [ready] addr={}", bind_addr);
        Self::serve(state, listener).await
    }

    /// Accept loop over an already bound listener.
    pub async fn serve(state: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let s = Arc::clone(&state);
            tokio::spawn(async move {
                handle_new_connection(s, stream, peer).await;
            });
        }
    }
}

async fn handle_new_connection<S: CharacterStore>(
    state: Arc<CharacterState<S>>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    tracing::info!("[char] [connect] peer={}", peer);
    let (mut reader, mut writer) = stream.into_split();
    let mut cipher = Plaintext;
    let mut session = ClientSession::new(peer);

    loop {
        let pkt = match read_packet(&mut reader, &mut cipher).await {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!("[char] [read_end] peer={} reason={}", peer, e);
                break;
            }
        };

        if let Err(e) = dispatch::process_character_packet(&state, &mut session, &pkt).await {
            tracing::warn!("[char] [session_error] peer={} err={}", peer, e);
            break;
        }

        if let Err(e) = flush(&mut writer, &mut cipher, &mut session).await {
            tracing::debug!("[char] [write_end] peer={} reason={}", peer, e);
            break;
        }

        if session.is_closed() {
            break;
        }
    }
    tracing::info!("[char] [disconnect] peer={} guildcard={}", peer, session.guildcard);
}

async fn flush<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    cipher: &mut impl PacketCipher,
    session: &mut ClientSession,
) -> std::io::Result<()> {
    for mut pkt in session.take_outbox() {
        cipher.encrypt(&mut pkt);
        writer.write_all(&pkt).await?;
    }
    Ok(())
}
