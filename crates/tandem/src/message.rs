//! Message framing.
//!
//! # Plaintext frame (what the cipher sees)
//!
//! ```text
//! [4 bytes: message number, big-endian] [contents, at least 1 byte]
//! ```
//!
//! # Wire frame (what the channel sees)
//!
//! ```text
//! [4 bytes: ciphertext length, big-endian] [ciphertext]
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Width of the message number inside the plaintext frame.
pub const COUNTER_LEN: usize = 4;

/// Width of the ciphertext length prefix on the wire.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Build the plaintext frame for `contents` under message number `number`.
///
/// The frame holds a copy of application data and is wiped when dropped.
pub fn encode(number: u32, contents: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(COUNTER_LEN + contents.len()));
    out.put_u32(number);
    out.put_slice(contents);
    out
}

/// Split a plaintext frame into its message number and contents.
///
/// Returns `None` unless the frame carries a number and at least one byte of
/// contents.
pub fn decode(frame: &[u8]) -> Option<(u32, &[u8])> {
    if frame.len() <= COUNTER_LEN {
        return None;
    }
    let mut header = &frame[..COUNTER_LEN];
    let number = header.get_u32();
    Some((number, &frame[COUNTER_LEN..]))
}

/// Write a length-prefixed ciphertext and flush the channel.
///
/// Prefix and ciphertext go out in a single `write_all`.
pub fn write_frame<W: Write + ?Sized>(channel: &mut W, ciphertext: &[u8], max_len: u32) -> Result<()> {
    let len = checked_len(ciphertext.len(), max_len)?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + ciphertext.len());
    frame.put_u32(len);
    frame.put_slice(ciphertext);

    channel.write_all(&frame)?;
    channel.flush()?;
    Ok(())
}

/// Read one length-prefixed ciphertext.
///
/// The prefix is checked against `max_len` before any buffer is allocated.
/// A stream that ends early fails with the channel's `UnexpectedEof`.
pub fn read_frame<R: Read + ?Sized>(channel: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    channel.read_exact(&mut prefix)?;
    let len = (&prefix[..]).get_u32();

    if len > max_len {
        return Err(Error::MessageTooLarge {
            len: len as usize,
            max: max_len,
        });
    }

    let mut ciphertext = vec![0u8; len as usize];
    channel.read_exact(&mut ciphertext)?;
    Ok(ciphertext)
}

/// Validate a ciphertext length against the configured limit.
pub(crate) fn checked_len(len: usize, max_len: u32) -> Result<u32> {
    match u32::try_from(len) {
        Ok(n) if n <= max_len => Ok(n),
        _ => Err(Error::MessageTooLarge { len, max: max_len }),
    }
}
