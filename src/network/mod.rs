use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::{PacketHeader, HEADER_SIZE};

/// Transforms packet bytes in place on their way in and out.
pub trait PacketCipher: Send {
    fn decrypt(&mut self, data: &mut [u8]);
    fn encrypt(&mut self, data: &mut [u8]);
}

/// Leaves packets untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl PacketCipher for Plaintext {
    fn decrypt(&mut self, _data: &mut [u8]) {}
    fn encrypt(&mut self, _data: &mut [u8]) {}
}

/// Read one packet from `stream`.
/// Returns the full buffer including the 8-byte header, already decrypted.
pub async fn read_packet<R, C>(stream: &mut R, cipher: &mut C) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    C: PacketCipher,
{
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await?;
    cipher.decrypt(&mut header);

    let total = PacketHeader::parse(&header).size as usize;
    if total < HEADER_SIZE {
        bail!("packet size {} shorter than its header", total);
    }
    let mut buf = vec![0u8; total];
    buf[..HEADER_SIZE].copy_from_slice(&header);
    stream.read_exact(&mut buf[HEADER_SIZE..]).await?;
    cipher.decrypt(&mut buf[HEADER_SIZE..]);
    Ok(buf)
}
