use std::sync::Arc;
use std::time::Duration;
use bytemuck::Zeroable;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use archon::config::{ServerConfig, ShipEntry};
use archon::network::{read_packet, Plaintext};
use archon::protocol::records::{
    decode, encode, CharAck, CharSelectRequest, CharacterPreview, ClientConfig,
    GuildcardChunkRequest, GuildcardEntry, GuildcardHeaderBody, LoginRequest, SecurityBody,
};
use archon::protocol::*;
use archon::servers::character::memory::MemoryStore;
use archon::servers::character::params::ParameterCache;
use archon::servers::character::CharacterState;

const GC: u32 = 42000001;

async fn start_test_server() -> (std::net::SocketAddr, Arc<CharacterState<MemoryStore>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ServerConfig::from_str(
        "sql_ip: 127.0.0.1\nsql_id: u\nsql_pw: p\nsql_db: d\ncharacter_ip: 127.0.0.1\n",
    )
    .unwrap();
    config.ships = vec![ShipEntry { id: 1, name: "Ship01".to_string() }];
    config.scroll_message = "Welcome to Archon".to_string();

    let store = MemoryStore::new();
    store.add_account("alice", "secret", GC, 0).await;
    store
        .add_character(GC, 0, CharacterPreview { level: 10, class: 0x03, ..Default::default() })
        .await;
    for i in 0..20 {
        store
            .add_guildcard_entry(GC, GuildcardEntry { guildcard: 42000100 + i, ..Default::default() })
            .await;
    }
    let params = ParameterCache::from_files(&[
        ("ItemPMT.prs".to_string(), vec![0x11; 0x9000]),
        ("PlyLevelTbl.prs".to_string(), vec![0x22; 0x100]),
    ]);

    let state = Arc::new(CharacterState::new(store, config, Arc::new(params), vec![0u8; 420]));
    let serving = Arc::clone(&state);
    tokio::spawn(async move {
        let _ = CharacterState::serve(serving, listener).await;
    });

    (addr, state)
}

fn login_packet(password: &str, echoed: Option<ClientConfig>) -> Vec<u8> {
    let mut req: LoginRequest = Zeroable::zeroed();
    copy_ascii(&mut req.username, "alice");
    copy_ascii(&mut req.password, password);
    if let Some(cfg) = echoed {
        req.security.copy_from_slice(encode(&cfg));
    }
    let mut w = PacketWriter::new(LOGIN_TYPE, 0);
    w.put_record(&req);
    w.finish().unwrap()
}

async fn recv(client: &mut TcpStream) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(5), read_packet(client, &mut Plaintext))
        .await
        .expect("timed out waiting for a packet")
        .unwrap()
}

fn pkt_type(pkt: &[u8]) -> u16 {
    PacketHeader::parse(pkt).pkt_type
}

#[tokio::test]
async fn test_login_then_select_then_relogin() {
    let (addr, _state) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&login_packet("secret", None)).await.unwrap();
    let security = recv(&mut client).await;
    assert_eq!(pkt_type(&security), SECURITY_TYPE);
    let body: SecurityBody = decode(&security[HEADER_SIZE..]);
    assert_eq!(body.guildcard, GC);

    let mut w = PacketWriter::new(CHAR_SELECT_TYPE, 0);
    w.put_record(&CharSelectRequest { slot: 0, selecting: 1, ..Default::default() });
    client.write_all(&w.finish().unwrap()).await.unwrap();

    let security = recv(&mut client).await;
    let body: SecurityBody = decode(&security[HEADER_SIZE..]);
    assert_eq!(body.config.char_selected, 1);
    let ack = recv(&mut client).await;
    let ack: CharAck = decode(&ack[HEADER_SIZE..]);
    assert_eq!(ack, CharAck { slot: 0, status: 1 });

    // The client reconnects carrying the config from the last security packet.
    drop(client);
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&login_packet("secret", Some(body.config))).await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(pkt_type(&recv(&mut client).await));
    }
    assert_eq!(seen, vec![SECURITY_TYPE, TIMESTAMP_TYPE, SHIP_LIST_TYPE, SCROLL_MESSAGE_TYPE]);
}

#[tokio::test]
async fn test_bad_password_closes_connection() {
    let (addr, _state) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&login_packet("wrong", None)).await.unwrap();

    let mut buf = [0u8; 8];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_options_inserted_once_across_connections() {
    let (addr, state) = start_test_server().await;
    for _ in 0..2 {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&login_packet("secret", None)).await.unwrap();
        recv(&mut client).await;
        client.write_all(&PacketWriter::new(OPTIONS_REQUEST_TYPE, 0).finish().unwrap()).await.unwrap();
        let options = recv(&mut client).await;
        assert_eq!(pkt_type(&options), OPTIONS_TYPE);
        assert_eq!(options.len(), padded_len(HEADER_SIZE + 0xAF4));
    }
    assert_eq!(state.store.key_config_inserts().await, 1);
}

#[tokio::test]
async fn test_guildcard_transfer_over_tcp() {
    let (addr, _state) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&login_packet("secret", None)).await.unwrap();
    recv(&mut client).await;

    client.write_all(&PacketWriter::new(GUILDCARD_REQ_TYPE, 0).finish().unwrap()).await.unwrap();
    let header = recv(&mut client).await;
    assert_eq!(pkt_type(&header), GUILDCARD_HEADER_TYPE);
    let header: GuildcardHeaderBody = decode(&header[HEADER_SIZE..]);
    let length = header.length as usize;

    let mut blob = Vec::new();
    let mut index = 0;
    while blob.len() < length {
        let mut w = PacketWriter::new(GUILDCARD_CHUNK_REQ_TYPE, 0);
        w.put_record(&GuildcardChunkRequest { unknown: 0, chunk: index, cont: 1 });
        client.write_all(&w.finish().unwrap()).await.unwrap();

        let chunk = recv(&mut client).await;
        assert_eq!(pkt_type(&chunk), GUILDCARD_CHUNK_TYPE);
        assert_eq!(&chunk[12..16], &index.to_le_bytes());
        let take = (length - blob.len()).min(MAX_CHUNK_SIZE);
        blob.extend_from_slice(&chunk[16..16 + take]);
        index += 1;
    }
    assert_eq!(index as usize, chunk_count(length));
    assert_eq!(compute_crc32(&blob), header.checksum);
    assert_eq!(&blob[0x1F74..0x1F78], &42000100u32.to_le_bytes());
}

#[tokio::test]
async fn test_parameter_files_over_tcp() {
    let (addr, state) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&login_packet("secret", None)).await.unwrap();
    recv(&mut client).await;

    client.write_all(&PacketWriter::new(PARAM_HEADER_REQ_TYPE, 0).finish().unwrap()).await.unwrap();
    let header = recv(&mut client).await;
    assert_eq!(PacketHeader::parse(&header).flags, 2);

    let mut joined = Vec::new();
    for i in 0..state.params.chunk_count() as u32 {
        client.write_all(&PacketWriter::new(PARAM_CHUNK_REQ_TYPE, i).finish().unwrap()).await.unwrap();
        let chunk = recv(&mut client).await;
        assert_eq!(pkt_type(&chunk), PARAM_CHUNK_TYPE);
        joined.extend_from_slice(state.params.chunk(i).unwrap());
        assert_eq!(&chunk[12..12 + 4], &state.params.chunk(i).unwrap()[..4]);
    }
    assert_eq!(joined.len(), 0x9000 + 0x100);
}

#[tokio::test]
async fn test_unknown_packet_keeps_connection() {
    let (addr, _state) = start_test_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&login_packet("secret", None)).await.unwrap();
    recv(&mut client).await;

    client.write_all(&PacketWriter::new(0x7777, 0).finish().unwrap()).await.unwrap();
    client.write_all(&PacketWriter::new(CHECKSUM_TYPE, 0).finish().unwrap()).await.unwrap();

    // The first reply belongs to the checksum; the unknown packet got none.
    let ack = recv(&mut client).await;
    assert_eq!(pkt_type(&ack), CHECKSUM_ACK_TYPE);
}
