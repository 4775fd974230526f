//! Extracts the MSH (message header) segment from a received message.
//!
//! Only the handful of fields needed to address an ACK are kept, nothing else in the message is
//! validated.

use crate::error::ParseError;

/// An MSH segment needs at least this many pipe separated fields (counting `MSH` itself).
pub const MIN_HEADER_FIELDS: usize = 12;

/// The routing fields of an MSH segment.
///
/// Field numbers below are positions in the `|` split of the segment, so `MSH` is 0 and the
/// encoding characters are 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub encoding_characters: String,   // 1
    pub sending_application: String,   // 2
    pub sending_facility: String,      // 3
    pub receiving_application: String, // 4
    pub receiving_facility: String,    // 5
    pub timestamp: String,             // 6
    pub security: String,              // 7
    pub message_type: String,          // 8
    pub control_id: String,            // 9
    pub processing_id: String,         // 10
    pub version_id: String,            // 11
}

impl MessageHeader {
    /// Parses the MSH segment at the start of `message`.
    ///
    /// The segment runs up to the first `\r` or `\n`. Bytes that aren't valid UTF-8 are replaced
    /// rather than rejected.
    /// ```
    /// use hl7_mllp_gateway::MessageHeader;
    /// let header = MessageHeader::parse(b"MSH|^~\\&|A|B|C|D|20240101||ADT^A01|CTRL1|P|2.4\r").unwrap();
    /// assert_eq!(header.control_id, "CTRL1");
    /// ```
    pub fn parse(message: &[u8]) -> Result<Self, ParseError> {
        if !message.starts_with(b"MSH") {
            return Err(ParseError::MissingMshPrefix);
        }

        let segment_end = message
            .iter()
            .position(|b| *b == b'\r' || *b == b'\n')
            .ok_or(ParseError::NoSegmentTerminator)?;

        let segment = String::from_utf8_lossy(&message[..segment_end]);
        let fields: Vec<&str> = segment.split('|').collect();

        if fields.len() < MIN_HEADER_FIELDS {
            return Err(ParseError::InsufficientFields {
                found: fields.len(),
                required: MIN_HEADER_FIELDS,
            });
        }

        Ok(MessageHeader {
            encoding_characters: fields[1].to_owned(),
            sending_application: fields[2].to_owned(),
            sending_facility: fields[3].to_owned(),
            receiving_application: fields[4].to_owned(),
            receiving_facility: fields[5].to_owned(),
            timestamp: fields[6].to_owned(),
            security: fields[7].to_owned(),
            message_type: fields[8].to_owned(),
            control_id: fields[9].to_owned(),
            processing_id: fields[10].to_owned(),
            version_id: fields[11].to_owned(),
        })
    }
}
