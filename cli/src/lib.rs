// SPDX-License-Identifier: CC0-1.0

//! Helpers for piping a byte stream through a ChaCha keystream.
//!
//! Parameters arrive as text (hex keys, round counts, offsets) and are turned
//! into a positioned [`CipherStream`] before any data flows.

use std::fmt;

use chacha_stream::futures::AsyncCipherReader;
use chacha_stream::{CipherStream, Key, Nonce, Rounds};
use hex::prelude::*;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// An error occured while setting up the cipher or moving data.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Cipher(chacha_stream::Error),
    Hex(hex::HexToBytesError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io {}", e),
            Error::Cipher(e) => write!(f, "cipher parameters {}", e),
            Error::Hex(e) => write!(f, "unable to decode hex {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Cipher(e) => Some(e),
            Error::Hex(e) => Some(e),
        }
    }
}

impl From<chacha_stream::Error> for Error {
    fn from(e: chacha_stream::Error) -> Self {
        Error::Cipher(e)
    }
}

// Convert IO errors.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<hex::HexToBytesError> for Error {
    fn from(e: hex::HexToBytesError) -> Self {
        Error::Hex(e)
    }
}

/// Parse a hex encoded 32 byte key.
pub fn parse_key(hex: &str) -> Result<Key, Error> {
    let bytes = Vec::from_hex(hex.trim())?;
    Ok(Key::try_from(&bytes[..])?)
}

/// Parse a hex encoded 8 byte nonce.
pub fn parse_nonce(hex: &str) -> Result<Nonce, Error> {
    let bytes = Vec::from_hex(hex.trim())?;
    Ok(Nonce::try_from(&bytes[..])?)
}

/// Build a cipher stream positioned at `seek` bytes into the keystream.
pub fn build_cipher(key: &str, nonce: &str, rounds: u8, seek: u64) -> Result<CipherStream, Error> {
    let rounds = Rounds::new(rounds)?;
    let mut cipher = CipherStream::with_rounds(parse_key(key)?, parse_nonce(nonce)?, rounds);
    cipher.seek(seek);
    debug!(
        "Cipher ready with {} rounds at position {}.",
        rounds.get(),
        cipher.position()
    );
    Ok(cipher)
}

/// Copy everything from `reader` to `writer`, applying the keystream on the way.
///
/// # Returns
///
/// The number of bytes transformed.
pub async fn xor_stream<R, W>(cipher: CipherStream, reader: R, writer: &mut W) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = AsyncCipherReader::new(cipher, reader);
    let copied = tokio::io::copy(&mut reader, writer).await?;
    writer.flush().await?;
    let (cipher, _) = reader.into_inner();
    debug!("Stream ended at keystream position {}.", cipher.position());
    Ok(copied)
}
