use bytes::BytesMut;
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio_util::codec::Decoder;

use hl7_mllp_gateway::pipeline::sanitize;
use hl7_mllp_gateway::{Acknowledgement, MessageHeader, MllpCodec};

const SAMPLE_HL7: &str = "MSH|^~\\&|EPIC|EPICADT|SMS|SMSADT|199912271408|CHARRIS|ADT^A04|1817457|D|2.5|\rPID||0493575^^^2^ID 1|454721||DOE^JOHN^^^^|DOE^JOHN^^^^|19480203|M||B|254 MYSTREET AVE^^MYTOWN^OH^44123^USA||(216)123-4567|||M|NON|400003403~1129086|\rNK1||ROE^MARIE^^^^|SPO||(216)123-4567||EC|||||||||||||||||||||||||||\rPV1||O|168 ~219~C~PMA^^^^^^^^^||||277^ALLEN MYLASTNAME^BONNIE^^^^|||||||||| ||2688684|||||||||||||||||||||||||199912271408||||||002376853\r";

fn bench_decode(c: &mut Criterion) {
    let framed = format!("\x0B{}\x1C\x0D", SAMPLE_HL7);

    c.bench_function("decode sample message", |b| {
        b.iter(|| {
            let mut codec = MllpCodec::new();
            let mut buf = BytesMut::from(framed.as_str());
            black_box(codec.decode(&mut buf).unwrap());
        })
    });
}

fn bench_ack(c: &mut Criterion) {
    let now = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap();

    c.bench_function("parse header and build ack", |b| {
        b.iter(|| {
            let header = MessageHeader::parse(black_box(SAMPLE_HL7.as_bytes())).unwrap();
            black_box(Acknowledgement::at(&header, &now).encode());
        })
    });
}

fn bench_sanitize(c: &mut Criterion) {
    c.bench_function("sanitize clean message", |b| {
        b.iter(|| black_box(sanitize(black_box(SAMPLE_HL7.as_bytes()))))
    });
}

criterion_group!(benches, bench_decode, bench_ack, bench_sanitize);
criterion_main!(benches);
