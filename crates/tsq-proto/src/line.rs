//! Line-based codec for tokio.
//!
//! ServerQuery terminates server lines with `\n\r` and expects client lines
//! terminated by `\n`. The decoder splits on `\n` and strips stray `\r` on
//! either side, so both orders decode to the same text.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{QueryError, Result};

/// Default maximum line length.
///
/// `clientlist` and `channellist` replies arrive as a single line, so the
/// limit is far above a typical chat protocol's.
pub const DEFAULT_MAX_LINE_LEN: usize = 512 * 1024;

/// Newline-delimited codec for ServerQuery traffic.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the default length limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom length limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = QueryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(QueryError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let data = String::from_utf8(line.to_vec())?;
            Ok(Some(data.trim_matches(['\r', '\n']).to_string()))
        } else {
            self.next_index = src.len();

            if src.len() > self.max_len {
                return Err(QueryError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = QueryError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> Result<()> {
        // Truncate at first line ending so one call can never inject a second command.
        let line = msg.split(['\r', '\n']).next().unwrap_or_default();
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
