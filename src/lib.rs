/*!
# An HL7v2 MLLP gateway.

 HL7's MLLP is a simple, single-byte-text based protocol for framing HL7 messages over a TCP (or similar) transport.
 Each message is sent as a block, `<VT>` (0x0B), the message text, then `<FS><CR>` (0x1C 0x0D), and the publisher waits
 for an acknowledgement before sending the next one.

 This crate listens for MLLP publishers, and for every message received:
 1. parses the MSH header segment (just enough to address a reply),
 2. posts the message to a clinical data repository as an `Hl7v2Message` resource,
 3. and only once the repository has accepted it, answers the publisher with an `AA` ACK.

 Anything unexpected (a malformed block, a header we can't read, a repository error, a failed write) closes the
 connection without an ACK, leaving the publisher to resend. Messages on one connection are handled strictly in order,
 connections are independent of each other.

 The building blocks are usable on their own: [MllpCodec] is a [Codec](https://docs.rs/tokio-util/latest/tokio_util/codec/index.html)
 for use within a Tokio `Framed`, [MessageHeader] and [Acknowledgement] handle the HL7 side, and [Deliver] is the seam
 between the pipeline and the repository.

 ## Example
 ```no_run
use std::sync::Arc;

use hl7_mllp_gateway::{DeliveryConfig, Gateway, GatewayConfig, HttpDelivery};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let delivery = DeliveryConfig::new("https://foo.example.app/", "my-hl7v2-config")?;
    let client = HttpDelivery::new(&delivery)?;

    let mut config = GatewayConfig::new(delivery);
    config.port = 2575;

    let gateway = Gateway::bind(config, Arc::new(client)).await?;
    gateway.run().await;

    Ok(())
}
```
 */

pub mod ack;
pub mod codec;
pub mod config;
pub mod delivery;
pub mod error;
pub mod header;
pub mod pipeline;
pub mod server;

pub use ack::{Acknowledgement, DeliveryIdentity};
pub use codec::{MllpCodec, RawFrame};
pub use config::GatewayConfig;
pub use delivery::{Deliver, DeliveryConfig, ExtraHeader, HttpDelivery};
pub use error::{ConfigError, ConnectionError, DeliveryError, FramingError, ParseError};
pub use header::MessageHeader;
pub use pipeline::handle_connection;
pub use server::Gateway;
