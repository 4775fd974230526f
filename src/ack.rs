//! Builds the ACK returned to the publisher once a message has been delivered.

use std::fmt;

use bytes::Bytes;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::header::MessageHeader;

const ENCODING_CHARACTERS: &str = "^~\\&";
const SEGMENT_TERMINATOR: char = '\r';

/// Renders an HL7 style timestamp.
///
/// Components are concatenated without zero padding, so 2024-03-05 07:08:09 becomes
/// `202435789`. Existing publishers are known to accept this, don't "fix" it without checking
/// with them.
pub fn format_timestamp<T: Datelike + Timelike>(at: &T) -> String {
    format!(
        "{}{}{}{}{}{}",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// A short description of a message for log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryIdentity {
    pub message_type: String,
    pub control_id: String,
    pub from: String,
    pub to: String,
}

impl DeliveryIdentity {
    pub fn from_header(header: &MessageHeader) -> Self {
        DeliveryIdentity {
            message_type: header.message_type.clone(),
            control_id: header.control_id.clone(),
            from: header.sending_facility.clone(),
            to: header.receiving_facility.clone(),
        }
    }
}

impl fmt::Display for DeliveryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}, ctlid: {}, from: {}, to: {}",
            self.message_type, self.control_id, self.from, self.to
        )
    }
}

/// An application-accept (`AA`) acknowledgement for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    msh: Vec<String>,
    msa: Vec<String>,
}

impl Acknowledgement {
    /// Acknowledges `header`, stamped with the current local time.
    pub fn for_header(header: &MessageHeader) -> Self {
        Acknowledgement::at(header, &Local::now().naive_local())
    }

    /// Acknowledges `header` as if sent at `now`.
    ///
    /// The ACK comes from the original receiver, so sender and receiver are swapped. The source
    /// control ID is echoed in MSA-2, MSH-10 is left empty.
    pub fn at(header: &MessageHeader, now: &NaiveDateTime) -> Self {
        let msh = vec![
            "MSH".to_owned(),
            ENCODING_CHARACTERS.to_owned(),
            header.receiving_application.clone(),
            header.receiving_facility.clone(),
            header.sending_application.clone(),
            header.sending_facility.clone(),
            format_timestamp(now),
            String::new(),
            "ACK".to_owned(),
            String::new(),
            header.processing_id.clone(),
            header.version_id.clone(),
        ];

        let msa = vec![
            "MSA".to_owned(),
            "AA".to_owned(),
            header.control_id.clone(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ];

        Acknowledgement { msh, msa }
    }

    pub fn msh_fields(&self) -> &[String] {
        &self.msh
    }

    pub fn msa_fields(&self) -> &[String] {
        &self.msa
    }

    /// The control ID of the message being acknowledged.
    pub fn control_id(&self) -> &str {
        &self.msa[2]
    }

    /// Both segments, each terminated by a carriage return.
    pub fn encode(&self) -> String {
        let mut out = self.msh.join("|");
        out.push(SEGMENT_TERMINATOR);
        out.push_str(&self.msa.join("|"));
        out.push(SEGMENT_TERMINATOR);
        out
    }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Acknowledgement> for Bytes {
    fn from(ack: Acknowledgement) -> Bytes {
        Bytes::from(ack.encode())
    }
}
