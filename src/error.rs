//! Error types for every stage of a connection's life.
//!
//! All of the pipeline errors are connection-fatal: there is no retry and no NAK, the
//! connection is simply dropped once the error has been logged.

use reqwest::StatusCode;

/// The MLLP envelope on the wire was malformed or incomplete.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A complete block was found but the buffer didn't begin with `<VT>` (0x0B).
    #[error("missing start marker, HL7 content should be prefixed with a Start Block character <VT> (0x0B)")]
    MissingStartMarker { preview: String },

    /// The End Block character `<FS>` (0x1C) wasn't immediately followed by `<CR>` (0x0D).
    #[error("missing trailing CR, the End Block character <FS> (0x1C) must be followed by <CR> (0x0D)")]
    MissingTrailingCr { preview: String },

    /// The peer closed the stream part way through a block.
    #[error("unexpected end of stream mid-frame ({buffered} bytes buffered)")]
    UnexpectedEof { buffered: usize, preview: String },

    /// The block (or the unterminated data buffered so far) exceeds the configured limit.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("I/O error reading MLLP stream: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// The leading bytes of the offending data, if the error carries any.
    pub fn preview(&self) -> Option<&str> {
        match self {
            FramingError::MissingStartMarker { preview }
            | FramingError::MissingTrailingCr { preview }
            | FramingError::UnexpectedEof { preview, .. } => Some(preview.as_str()),
            FramingError::FrameTooLarge { .. } | FramingError::Io(_) => None,
        }
    }
}

/// The MSH segment was missing or didn't carry enough fields to build an ACK.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing MSH prefix, message should start with 'MSH'")]
    MissingMshPrefix,

    #[error("no segment terminator found, can't detect the end of the MSH segment")]
    NoSegmentTerminator,

    #[error("insufficient header fields, MSH has {found} fields but at least {required} are needed")]
    InsufficientFields { found: usize, required: usize },
}

/// The message couldn't be handed to the repository.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("unable to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("error during HTTP request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response code: {status}, repository response: \"{body}\"")]
    Status { status: StatusCode, body: String },

    #[error("response code: {status}, cannot read response body: {source}")]
    Body {
        status: StatusCode,
        source: reqwest::Error,
    },
}

/// Start-up configuration was invalid.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid header '{0}', expected format 'Name: value'")]
    InvalidHeader(String),

    #[error("invalid delivery URL '{0}'")]
    InvalidUrl(String),
}

/// Everything that can end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid data received: {0}")]
    Framing(#[from] FramingError),

    #[error("message processing failed: {source}")]
    Parse { source: ParseError, preview: String },

    #[error("unable to deliver message: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("unable to send ACK: {0}")]
    AckWrite(std::io::Error),
}

impl ConnectionError {
    /// Leading bytes of the message (or buffered data) that caused the error, when known.
    pub fn preview(&self) -> Option<&str> {
        match self {
            ConnectionError::Framing(err) => err.preview(),
            ConnectionError::Parse { preview, .. } => Some(preview.as_str()),
            ConnectionError::Delivery(_) | ConnectionError::AckWrite(_) => None,
        }
    }
}
