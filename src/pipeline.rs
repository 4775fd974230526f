//! The per-connection receive/deliver/acknowledge loop.
//!
//! A connection works through one message at a time: read a block, parse its header, deliver it,
//! write the ACK, and only then look at the next block. Any error ends the connection, and no ACK
//! is ever written for a message that wasn't delivered.

use std::borrow::Cow;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::ack::{Acknowledgement, DeliveryIdentity};
use crate::codec::{preview, MllpCodec, RawFrame};
use crate::delivery::Deliver;
use crate::error::ConnectionError;
use crate::header::MessageHeader;

/// Runs the pipeline until the peer disconnects cleanly (`Ok`) or something goes wrong.
///
/// The transport is dropped, and so closed, on every return path.
pub async fn handle_connection<T, D>(
    stream: T,
    codec: MllpCodec,
    delivery: &D,
) -> Result<(), ConnectionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: Deliver + ?Sized,
{
    let mut transport = Framed::new(stream, codec);

    while let Some(result) = transport.next().await {
        let frame = result?;
        info!("New message received. Length: {} bytes", frame.len());

        let ack = process_frame(&frame, delivery).await?;

        info!("Sending ACK");
        transport
            .send(Bytes::from(ack))
            .await
            .map_err(ConnectionError::AckWrite)?;
    }

    Ok(())
}

/// Parses and delivers one message, returning the ACK to send for it.
pub async fn process_frame<D>(
    frame: &RawFrame,
    delivery: &D,
) -> Result<Acknowledgement, ConnectionError>
where
    D: Deliver + ?Sized,
{
    let header = MessageHeader::parse(frame).map_err(|source| ConnectionError::Parse {
        source,
        preview: preview(frame),
    })?;
    let ack = Acknowledgement::for_header(&header);
    info!("Message identity: {}", DeliveryIdentity::from_header(&header));

    let message = sanitize(frame);
    delivery.deliver(&message).await?;

    Ok(ack)
}

/// The message text to forward: lossily decoded, with any NUL characters removed.
pub fn sanitize(frame: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(frame);
    if !text.contains('\0') {
        return text;
    }

    warn!("Null character detected and replaced in message");
    Cow::Owned(text.replace('\0', ""))
}
