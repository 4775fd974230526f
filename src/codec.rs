//! A tokio codec implementation for the HL7 MLLP framing.
//!
//! On the wire every message is wrapped in a block: `<VT> data <FS><CR>`, ie `0x0B ... 0x1C 0x0D`.
//! Decoding is strict. A block must begin exactly at the start of the buffer, and the End Block
//! character must be followed by a carriage return, anything else is a [FramingError] and the
//! connection is expected to be dropped.

use std::ops::Deref;

use bytes::buf::{Buf, BufMut};
use bytes::{Bytes, BytesMut};
use log::{debug, trace};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FramingError;

/// Largest block payload accepted by default (1 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// How much of an offending payload ends up in logs and errors.
pub(crate) const PREVIEW_LENGTH: usize = 50;

/// One HL7 message as received, with the MLLP envelope stripped.
///
/// Only [MllpCodec] creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(Bytes);

impl RawFrame {
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for RawFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Lossy, length-bounded rendering of some bytes for log lines.
pub(crate) fn preview(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .take(PREVIEW_LENGTH)
        .collect()
}

/// Frames and unframes MLLP blocks, for use within a [Framed](tokio_util::codec::Framed).
#[derive(Debug, Clone)]
pub struct MllpCodec {
    max_frame_length: usize,
}

impl Default for MllpCodec {
    fn default() -> Self {
        MllpCodec::new()
    }
}

impl MllpCodec {
    const BLOCK_HEADER: u8 = 0x0B; //Vertical-Tab char, the marker for the start of a message
    const BLOCK_FOOTER: [u8; 2] = [0x1C, 0x0D]; //File-Separator char + CR, the marker for the end of a message

    /// Creates a new codec accepting blocks of up to [DEFAULT_MAX_FRAME_LENGTH] bytes.
    /// ```
    /// use hl7_mllp_gateway::MllpCodec;
    /// let mllp = MllpCodec::new();
    /// assert_eq!(mllp.max_frame_length(), hl7_mllp_gateway::codec::DEFAULT_MAX_FRAME_LENGTH);
    /// ```
    pub fn new() -> Self {
        MllpCodec {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        MllpCodec { max_frame_length }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// Index of the first End Block char, provided the byte after it has arrived too.
    fn get_footer_position(src: &BytesMut) -> Option<usize> {
        match src.iter().position(|b| *b == MllpCodec::BLOCK_FOOTER[0]) {
            Some(i) if i + 1 < src.len() => {
                trace!("MLLP: Found footer at index {}", i);
                Some(i)
            }
            Some(_) => {
                trace!("MLLP: Found End Block char, waiting on the next byte...");
                None
            }
            None => {
                trace!("MLLP: Unable to find footer...");
                None
            }
        }
    }
}

// Frames the ACKs we send back to the publisher.
impl Encoder<Bytes> for MllpCodec {
    type Error = std::io::Error;

    fn encode(&mut self, event: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(event.len() + 3); //we need an extra 3 bytes of space on top of the message proper
        dst.put_u8(MllpCodec::BLOCK_HEADER); //header

        dst.put_slice(&event); //data

        dst.put_slice(&MllpCodec::BLOCK_FOOTER); //footer

        debug!("MLLP: Encoded value for send: '{:?}'", dst);
        Ok(())
    }
}

impl Decoder for MllpCodec {
    type Item = RawFrame;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let end_offset = match MllpCodec::get_footer_position(src) {
            Some(end_offset) => end_offset,
            None => {
                // no complete block yet, but don't buffer without limit
                if src.len() > self.max_frame_length + 3 {
                    return Err(FramingError::FrameTooLarge {
                        size: src.len(),
                        max: self.max_frame_length,
                    });
                }
                return Ok(None);
            }
        };

        if src[0] != MllpCodec::BLOCK_HEADER {
            return Err(FramingError::MissingStartMarker {
                preview: preview(src),
            });
        }
        if src[end_offset + 1] != MllpCodec::BLOCK_FOOTER[1] {
            return Err(FramingError::MissingTrailingCr {
                preview: preview(&src[1..end_offset]),
            });
        }

        let size = end_offset - 1; // end_offset is at least 1, index 0 holds the header
        if size > self.max_frame_length {
            return Err(FramingError::FrameTooLarge {
                size,
                max: self.max_frame_length,
            });
        }

        let mut result = src
            .split_to(end_offset + 2) //get the footer bytes
            .split_to(end_offset); // grab our data from the buffer, consuming (and losing) the footer

        result.advance(1); //move past the header

        Ok(Some(RawFrame(result.freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => Err(FramingError::UnexpectedEof {
                buffered: src.len(),
                preview: preview(src),
            }),
        }
    }
}
