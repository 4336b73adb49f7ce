// SPDX-License-Identifier: CC0-1.0

//! Blocking adapters which apply a keystream to std Read/Write transports.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//!
//! use chacha_stream::io::{CipherReader, CipherWriter};
//! use chacha_stream::{CipherStream, Key, Nonce};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = Key::new([7; 32]);
//! let nonce = Nonce::new([9; 8]);
//!
//! let mut writer = CipherWriter::new(CipherStream::new(key, nonce), Vec::new());
//! writer.write_all(b"hello ")?;
//! writer.write_all(b"world")?;
//! let (_, ciphertext) = writer.into_inner();
//!
//! let mut reader = CipherReader::new(CipherStream::new(key, nonce), &ciphertext[..]);
//! let mut plaintext = String::new();
//! reader.read_to_string(&mut plaintext)?;
//! assert_eq!(plaintext, "hello world");
//! # Ok(())
//! # }
//! ```

use std::io::{self, Read, Write};
use std::vec::Vec;

use crate::block::{Auto, Strategy};
use crate::CipherStream;

/// Applies the keystream to every byte pulled from the wrapped reader.
pub struct CipherReader<R, S: Strategy = Auto> {
    cipher: CipherStream<S>,
    reader: R,
}

impl<R: Read, S: Strategy> CipherReader<R, S> {
    pub fn new(cipher: CipherStream<S>, reader: R) -> Self {
        CipherReader { cipher, reader }
    }

    /// Consume the reader in exchange for the cipher stream and underlying reader.
    pub fn into_inner(self) -> (CipherStream<S>, R) {
        (self.cipher, self.reader)
    }
}

impl<R: Read, S: Strategy> Read for CipherReader<R, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.reader.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..read]);
        Ok(read)
    }
}

/// Applies the keystream to every byte before handing it to the wrapped writer.
///
/// The keystream is consumed when bytes are accepted. If the underlying
/// writer fails the cipher stream is out of step with the transport and
/// should be dropped.
pub struct CipherWriter<W, S: Strategy = Auto> {
    cipher: CipherStream<S>,
    writer: W,
    scratch: Vec<u8>,
}

impl<W: Write, S: Strategy> CipherWriter<W, S> {
    pub fn new(cipher: CipherStream<S>, writer: W) -> Self {
        CipherWriter {
            cipher,
            writer,
            scratch: Vec::new(),
        }
    }

    /// Consume the writer in exchange for the cipher stream and underlying writer.
    pub fn into_inner(self) -> (CipherStream<S>, W) {
        (self.cipher, self.writer)
    }
}

impl<W: Write, S: Strategy> Write for CipherWriter<W, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.resize(buf.len(), 0);
        self.cipher
            .apply_keystream_b2b(buf, &mut self.scratch)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.writer.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
