// SPDX-License-Identifier: CC0-1.0

//! Future-based asynchronous adapters which apply a keystream over
//! AsyncRead/AsyncWrite transports.
//! It is only available when the `tokio` feature is enabled.
//!
//! # Example
//!
//! ```
//! use chacha_stream::futures::{AsyncCipherReader, AsyncCipherWriter};
//! use chacha_stream::{CipherStream, Key, Nonce};
//! use tokio::io::AsyncReadExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = Key::new([1; 32]);
//! let nonce = Nonce::new([2; 8]);
//!
//! let mut writer = AsyncCipherWriter::new(CipherStream::new(key, nonce), Vec::new());
//! writer.write(b"over the wire").await?;
//! let (_, ciphertext) = writer.into_inner();
//!
//! let mut reader = AsyncCipherReader::new(CipherStream::new(key, nonce), &ciphertext[..]);
//! let mut plaintext = Vec::new();
//! reader.read_to_end(&mut plaintext).await?;
//! assert_eq!(plaintext, b"over the wire");
//! # Ok(())
//! # }
//! ```

use core::pin::Pin;
use core::task::{Context, Poll};
use std::io;
use std::vec::Vec;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::block::{Auto, Strategy};
use crate::CipherStream;

/// Applies the keystream to bytes as they are pulled from an async reader.
///
/// Only the bytes filled by the current read are transformed, so the reader
/// composes with [`tokio::io::AsyncReadExt`] helpers and [`tokio::io::copy`].
/// A read which returns pending consumes no keystream, making this
/// cancellation safe.
pub struct AsyncCipherReader<R, S: Strategy = Auto> {
    cipher: CipherStream<S>,
    reader: R,
}

impl<R, S> AsyncCipherReader<R, S>
where
    R: AsyncRead + Unpin,
    S: Strategy,
{
    pub fn new(cipher: CipherStream<S>, reader: R) -> Self {
        AsyncCipherReader { cipher, reader }
    }

    /// Consume the reader in exchange for the cipher stream and underlying reader.
    pub fn into_inner(self) -> (CipherStream<S>, R) {
        (self.cipher, self.reader)
    }
}

impl<R, S> AsyncRead for AsyncCipherReader<R, S>
where
    R: AsyncRead + Unpin,
    S: Strategy,
    CipherStream<S>: Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.reader).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.cipher.apply_keystream(&mut buf.filled_mut()[before..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Applies the keystream to plaintext before writing it to an async writer.
pub struct AsyncCipherWriter<W, S: Strategy = Auto> {
    cipher: CipherStream<S>,
    writer: W,
    scratch: Vec<u8>,
}

impl<W, S> AsyncCipherWriter<W, S>
where
    W: AsyncWrite + Unpin,
    S: Strategy,
{
    pub fn new(cipher: CipherStream<S>, writer: W) -> Self {
        AsyncCipherWriter {
            cipher,
            writer,
            scratch: Vec::new(),
        }
    }

    /// Encrypt plaintext and write it to the underlying writer.
    ///
    /// This function is *not* cancellation safe. Keystream is consumed before
    /// the write completes, so a cancelled writer should be dropped.
    ///
    /// # Errors
    ///
    /// * `Io` - Failure writing to or flushing the underlying writer.
    pub async fn write(&mut self, plaintext: &[u8]) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(plaintext);
        self.cipher.apply_keystream(&mut self.scratch);
        self.writer.write_all(&self.scratch).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Consume the writer in exchange for the cipher stream and underlying writer.
    pub fn into_inner(self) -> (CipherStream<S>, W) {
        (self.cipher, self.writer)
    }
}
