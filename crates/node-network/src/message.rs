//! Wire framing: a fixed header (magic, command, compression flag, payload
//! length, checksum) followed by the command's bincode-encoded payload.
//! Payloads above [`COMPRESSION_THRESHOLD`] bytes are deflated before
//! sending and inflated on receipt; the checksum always covers the
//! uncompressed bytes so a peer can tell the two apart without trusting
//! the compression flag.

use std::convert::TryFrom;
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::NetworkError;

/// Payloads at or above this size are compressed before framing.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Hard cap on a single frame's (post-decompression) payload, protecting
/// against a peer claiming an enormous length and exhausting memory before
/// the checksum can even be checked.
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Version = 0x00,
    Verack = 0x01,
    GetAddr = 0x10,
    Addr = 0x11,
    Ping = 0x18,
    Pong = 0x19,
    GetHeaders = 0x20,
    Headers = 0x21,
    GetBlocksByIndex = 0x22,
    Inv = 0x27,
    GetData = 0x28,
    NotFound = 0x2a,
    Tx = 0x2b,
    Block = 0x2c,
    Extensible = 0x2e,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::GetAddr => "getaddr",
            Command::Addr => "addr",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::GetBlocksByIndex => "getblocksbyindex",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::NotFound => "notfound",
            Command::Tx => "tx",
            Command::Block => "block",
            Command::Extensible => "extensible",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = NetworkError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x00 => Command::Version,
            0x01 => Command::Verack,
            0x10 => Command::GetAddr,
            0x11 => Command::Addr,
            0x18 => Command::Ping,
            0x19 => Command::Pong,
            0x20 => Command::GetHeaders,
            0x21 => Command::Headers,
            0x22 => Command::GetBlocksByIndex,
            0x27 => Command::Inv,
            0x28 => Command::GetData,
            0x2a => Command::NotFound,
            0x2b => Command::Tx,
            0x2c => Command::Block,
            0x2e => Command::Extensible,
            other => return Err(NetworkError::UnknownCommand(other)),
        })
    }
}

fn checksum(payload: &[u8]) -> u32 {
    let digest = node_crypto::hash256(payload);
    u32::from_le_bytes(digest.as_bytes()[0..4].try_into().unwrap())
}

fn deflate(payload: &[u8]) -> Result<Vec<u8>, NetworkError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).map_err(|e| NetworkError::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| NetworkError::Compression(e.to_string()))
}

fn inflate(payload: &[u8], expected_len: usize) -> Result<Vec<u8>, NetworkError> {
    let mut decoder = DeflateDecoder::new(payload);
    let mut out = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut out).map_err(|e| NetworkError::Compression(e.to_string()))?;
    Ok(out)
}

/// Encodes `payload` (already bincode-serialized by the caller) into a
/// complete frame ready to write to the wire.
pub fn encode_frame(magic: u32, command: Command, payload: &[u8]) -> Result<Vec<u8>, NetworkError> {
    let check = checksum(payload);
    let (compressed, wire_payload) = if payload.len() >= COMPRESSION_THRESHOLD {
        let deflated = deflate(payload)?;
        if deflated.len() < payload.len() {
            (true, deflated)
        } else {
            (false, payload.to_vec())
        }
    } else {
        (false, payload.to_vec())
    };

    let mut frame = Vec::with_capacity(14 + wire_payload.len());
    frame.extend_from_slice(&magic.to_le_bytes());
    frame.push(command as u8);
    frame.push(compressed as u8);
    frame.extend_from_slice(&(wire_payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&check.to_le_bytes());
    frame.extend_from_slice(&wire_payload);
    Ok(frame)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    magic: u32,
    command: Command,
    payload: &[u8],
) -> Result<(), NetworkError> {
    let frame = encode_frame(magic, command, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one complete frame, validating magic and checksum and enforcing
/// [`MAX_PAYLOAD_SIZE`] before any allocation for the payload itself.
/// Returns the command and its decompressed, checksum-verified payload.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, magic: u32) -> Result<(Command, Vec<u8>), NetworkError> {
    let mut header = [0u8; 14];
    reader.read_exact(&mut header).await?;

    let got_magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    if got_magic != magic {
        return Err(NetworkError::MagicMismatch { expected: magic, got: got_magic });
    }
    let command = Command::try_from(header[4])?;
    let compressed = header[5] != 0;
    let length = u32::from_le_bytes(header[6..10].try_into().unwrap()) as usize;
    let expected_checksum = u32::from_le_bytes(header[10..14].try_into().unwrap());

    if length > MAX_PAYLOAD_SIZE {
        return Err(NetworkError::FrameTooLarge(length));
    }

    let mut wire_payload = vec![0u8; length];
    reader.read_exact(&mut wire_payload).await?;

    let payload = if compressed {
        inflate(&wire_payload, length * 4)?
    } else {
        wire_payload
    };

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(NetworkError::FrameTooLarge(payload.len()));
    }
    if checksum(&payload) != expected_checksum {
        return Err(NetworkError::ChecksumMismatch { command: command.as_str().to_string() });
    }

    Ok((command, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_payload_round_trips_uncompressed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 0x334f454e, Command::Ping, b"abc").await.unwrap();
        let (command, payload) = read_frame(&mut &buf[..], 0x334f454e).await.unwrap();
        assert_eq!(command, Command::Ping);
        assert_eq!(payload, b"abc");
        assert_eq!(buf[5], 0); // not compressed
    }

    #[tokio::test]
    async fn large_payload_is_compressed_and_round_trips() {
        let payload: Vec<u8> = std::iter::repeat(0x42u8).take(8192).collect();
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, Command::Block, &payload).await.unwrap();
        assert_eq!(buf[5], 1); // compressed
        assert!(buf.len() < payload.len());
        let (command, decoded) = read_frame(&mut &buf[..], 1).await.unwrap();
        assert_eq!(command, Command::Block);
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn wrong_magic_is_rejected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, Command::Ping, b"x").await.unwrap();
        let err = read_frame(&mut &buf[..], 2).await.unwrap_err();
        assert!(matches!(err, NetworkError::MagicMismatch { expected: 2, got: 1 }));
    }

    #[tokio::test]
    async fn tampered_payload_fails_checksum() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, Command::Ping, b"hello").await.unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        let err = read_frame(&mut &buf[..], 1).await.unwrap_err();
        assert!(matches!(err, NetworkError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected_before_reading() {
        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.push(Command::Ping as u8);
        header.push(0);
        header.extend_from_slice(&((MAX_PAYLOAD_SIZE + 1) as u32).to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        let err = read_frame(&mut &header[..], 1).await.unwrap_err();
        assert!(matches!(err, NetworkError::FrameTooLarge(_)));
    }
}
