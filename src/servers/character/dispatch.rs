//! Packet dispatch for the CHARACTER port.
//!
//! One inbound packet is handled to completion before the next is read.
//! Responses are queued on the session; if a handler fails, whatever it had
//! queued is discarded and the error ends the connection.

use bytemuck::Pod;
use std::mem::size_of;

use super::db::{CharacterStore, NewCharacter, STARTING_MESETA};
use super::guildcard::MAX_GUILDCARD_ENTRIES;
use super::session::ClientSession;
use super::stats::CharClass;
use super::{CharacterError, CharacterState};
use crate::protocol::packet::*;
use crate::protocol::records::{
    decode, CharPreviewBody, CharSelectRequest, GuildcardChunkRequest, LoginRequest,
    SetFlagRequest,
};
use crate::protocol::*;

pub async fn process_character_packet<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    let result = dispatch(state, session, pkt).await;
    if result.is_err() {
        session.discard_outbox();
    }
    result
}

async fn dispatch<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    if pkt.len() < HEADER_SIZE {
        return Err(CharacterError::Truncated { pkt_type: 0, len: pkt.len(), need: HEADER_SIZE });
    }
    let hdr = PacketHeader::parse(pkt);

    if state.config.debug_mode {
        tracing::debug!("[char] [packet_in] peer={} size={}\n{}", session.peer, pkt.len(), hex_dump(pkt));
    }

    match hdr.pkt_type {
        LOGIN_TYPE => handle_login(state, session, &hdr, pkt).await,
        DISCONNECT_TYPE => {
            session.close();
            Ok(())
        }
        OPTIONS_REQUEST_TYPE => handle_key_config(state, session).await,
        CHAR_SELECT_TYPE => handle_character_select(state, session, &hdr, pkt).await,
        CHECKSUM_TYPE => {
            // The client's checksum isn't verified.
            session.send(build_checksum_ack(1)?);
            Ok(())
        }
        GUILDCARD_REQ_TYPE => handle_guildcard_start(state, session).await,
        GUILDCARD_CHUNK_REQ_TYPE => handle_guildcard_chunk(session, &hdr, pkt),
        PARAM_HEADER_REQ_TYPE => {
            let params = &state.params;
            session.send(build_param_header(params.file_count(), params.header())?);
            Ok(())
        }
        PARAM_CHUNK_REQ_TYPE => {
            let data = state.params.chunk(hdr.flags)?;
            session.send(build_param_chunk(hdr.flags, data)?);
            Ok(())
        }
        SET_FLAG_TYPE => {
            let req: SetFlagRequest = body(&hdr, pkt)?;
            session.flag = req.flag as u8;
            Ok(())
        }
        CHAR_PREVIEW_TYPE => handle_character_update(state, session, &hdr, pkt).await,
        MENU_SELECT_TYPE => {
            tracing::debug!("[char] [menu_select] peer={}", session.peer);
            Ok(())
        }
        other => {
            tracing::warn!("[char] [packet_unknown] type={:04X} peer={}", other, session.peer);
            Ok(())
        }
    }
}

/// Decodes the body after checking the packet is long enough to hold it.
fn body<T: Pod>(hdr: &PacketHeader, pkt: &[u8]) -> Result<T, CharacterError> {
    let need = HEADER_SIZE + size_of::<T>();
    if pkt.len() < need {
        return Err(CharacterError::Truncated { pkt_type: hdr.pkt_type, len: pkt.len(), need });
    }
    Ok(decode(&pkt[HEADER_SIZE..]))
}

fn send_security(session: &mut ClientSession) -> Result<(), CharacterError> {
    let pkt = build_security(LOGIN_ERROR_NONE, session.guildcard, session.team_id, &session.config)?;
    session.send(pkt);
    Ok(())
}

async fn handle_login<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
    hdr: &PacketHeader,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    let req: LoginRequest = body(hdr, pkt)?;
    let username = req.username();
    let account = match state.store.verify_account(&username, &req.password()).await {
        Ok(acc) => acc,
        Err(e) => {
            tracing::info!("[char] [login_failed] peer={} user={} reason={}", session.peer, username, e);
            return Err(e);
        }
    };
    session.guildcard = account.guildcard;
    session.team_id = account.team_id;
    session.adopt_client_config(req.client_config());
    tracing::info!(
        "[char] [login] peer={} guildcard={} selected={}",
        session.peer,
        session.guildcard,
        session.char_selected()
    );

    send_security(session)?;
    if session.char_selected() {
        session.send(build_timestamp(chrono::Utc::now())?);
        session.send(build_ship_list(&state.config.server_name, &state.config.ships)?);
        session.send(build_scroll_message(&state.config.scroll_message)?);
    }
    Ok(())
}

async fn handle_key_config<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
) -> Result<(), CharacterError> {
    let key_config = match state.store.key_config(session.guildcard).await? {
        Some(kc) => kc,
        None => {
            state
                .store
                .insert_key_config(session.guildcard, &state.default_key_config)
                .await?;
            tracing::debug!("[char] [key_config] installed default guildcard={}", session.guildcard);
            state.default_key_config.clone()
        }
    };
    session.send(build_options(&key_config, session.guildcard, session.team_id)?);
    Ok(())
}

async fn handle_character_select<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
    hdr: &PacketHeader,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    let req: CharSelectRequest = body(hdr, pkt)?;
    let slot = req.slot as u32;

    let Some(preview) = state.store.character_preview(session.guildcard, slot).await? else {
        session.send(build_char_ack(slot, CharAckStatus::EmptySlot)?);
        return Ok(());
    };

    if req.selecting == 1 {
        session.select_slot(req.slot);
        send_security(session)?;
        session.send(build_char_ack(slot, CharAckStatus::Selected)?);
    } else {
        session.send(build_char_preview(slot, &preview)?);
    }
    Ok(())
}

async fn handle_guildcard_start<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
) -> Result<(), CharacterError> {
    let entries = state
        .store
        .guildcard_entries(session.guildcard, MAX_GUILDCARD_ENTRIES)
        .await?;
    let (checksum, length) = session.guildcard_transfer.build(&entries);
    session.send(build_guildcard_header(checksum, length as u16)?);
    Ok(())
}

fn handle_guildcard_chunk(
    session: &mut ClientSession,
    hdr: &PacketHeader,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    let req: GuildcardChunkRequest = body(hdr, pkt)?;
    if req.cont != 1 {
        return Ok(());
    }
    let out = build_guildcard_chunk(req.chunk, session.guildcard_transfer.chunk(req.chunk)?)?;
    session.send(out);
    Ok(())
}

async fn handle_character_update<S: CharacterStore>(
    state: &CharacterState<S>,
    session: &mut ClientSession,
    hdr: &PacketHeader,
    pkt: &[u8],
) -> Result<(), CharacterError> {
    let req: CharPreviewBody = body(hdr, pkt)?;
    let slot = u8::try_from(req.slot).map_err(|_| CharacterError::BadSlot(req.slot))?;
    let preview = req.character;

    if session.is_dressing_room() {
        state
            .store
            .update_character(session.guildcard, req.slot, &preview)
            .await?;
    } else {
        let class = CharClass::try_from(preview.class)?;
        let character = NewCharacter {
            preview,
            stats: class.base_stats(),
            meseta: STARTING_MESETA,
        };
        state
            .store
            .replace_character(session.guildcard, req.slot, &character)
            .await?;
        tracing::info!(
            "[char] [created] guildcard={} slot={} class={:?}",
            session.guildcard,
            req.slot,
            class
        );
    }

    session.select_slot(slot);
    send_security(session)?;
    session.send(build_char_ack(req.slot, CharAckStatus::Updated)?);
    Ok(())
}
