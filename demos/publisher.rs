//! Sends a single HL7 message to a running gateway and prints the ACK it gets back.
//!
//! ```text
//! cargo run --example publisher -- 127.0.0.1:5000
//! ```

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use hl7_mllp_gateway::MllpCodec;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5000".to_owned());

    // Note that this is the Tokio TcpStream, which is fully async.
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected to {}...", addr);

    let mut transport = Framed::new(stream, MllpCodec::new());

    let sample_hl7 =
"MSH|^~\\&|EPIC|EPICADT|SMS|SMSADT|199912271408|CHARRIS|ADT^A04|1817457|D|2.5|\rPID||0493575^^^2^ID 1|454721||DOE^JOHN^^^^|DOE^JOHN^^^^|19480203|M||B|254 MYSTREET AVE^^MYTOWN^OH^44123^USA||(216)123-4567|||M|NON|400003403~1129086|\rNK1||ROE^MARIE^^^^|SPO||(216)123-4567||EC|||||||||||||||||||||||||||\rPV1||O|168 ~219~C~PMA^^^^^^^^^||||277^ALLEN MYLASTNAME^BONNIE^^^^|||||||||| ||2688684|||||||||||||||||||||||||199912271408||||||002376853\r";

    transport.send(Bytes::from(sample_hl7)).await?; //because this is through the codec it gets wrapped in MLLP header/footer for us
    println!("  Msg sent, awaiting ack...");

    match transport.next().await {
        Some(Ok(ack)) => println!("  Received ACK: {:?}", String::from_utf8_lossy(&ack)),
        Some(Err(e)) => println!("  ERROR: {}", e),
        None => println!("  Connection closed without an ACK, the message was not accepted"),
    }

    Ok(())
}
