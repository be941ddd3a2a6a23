use bytes::{Bytes, BytesMut};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use futures::StreamExt;
use futures::executor::block_on;
use http::{Method, StatusCode};
use micro_http_codec::codec::{
    Aggregated, ByteToMessage, Cumulator, DecoderConfig, HttpDecoder, HttpEncoder, HttpObjectAggregator, HttpServerCodec,
};
use micro_http_codec::protocol::FullMessage;
use std::{
    hint::black_box,
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::codec::{Encoder, FramedRead};

const SIMPLE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

const CHUNKED_REQUEST: &[u8] =
    b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n10\r\n0123456789abcdef\r\n10\r\n0123456789abcdef\r\n0\r\n\r\n";

// Reader handing out the input in fixed size pieces
struct MockIO {
    read_data: Vec<u8>,
    read_pos: usize,
    piece_size: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>, piece_size: usize) -> Self {
        Self { read_data, read_pos: 0, piece_size }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = remaining.len().min(buf.remaining()).min(self.piece_size);
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

fn bench_request_decoder(c: &mut Criterion) {
    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = ByteToMessage::new(HttpDecoder::request(DecoderConfig::default()), Cumulator::Merge);
            let mut events = Vec::with_capacity(2);
            decoder.feed(Bytes::from_static(SIMPLE_REQUEST), &mut events).unwrap();
            black_box(events);
        });
    });
}

fn bench_fragmented_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_fragmented_chunked_request");
    for (name, cumulator) in [("merge", Cumulator::Merge), ("composite", Cumulator::Composite)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut decoder = ByteToMessage::new(HttpDecoder::request(DecoderConfig::default()), cumulator);
                let mut events = Vec::new();
                for fragment in CHUNKED_REQUEST.chunks(7) {
                    decoder.feed(Bytes::copy_from_slice(fragment), &mut events).unwrap();
                }
                black_box(events);
            });
        });
    }
    group.finish();
}

fn bench_response_encoder(c: &mut Criterion) {
    let response = FullMessage::response(StatusCode::OK, "Hello World!");

    c.bench_function("encode_simple_response", |b| {
        b.iter_batched(
            || response.clone(),
            |response| {
                let mut encoder = HttpEncoder::new();
                let mut bytes = BytesMut::new();
                encoder.encode(response, &mut bytes).unwrap();
                black_box(bytes);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_framed_aggregation(c: &mut Criterion) {
    c.bench_function("aggregate_framed_request", |b| {
        b.iter(|| {
            let mut framed = FramedRead::new(MockIO::new(CHUNKED_REQUEST.to_vec(), 16), HttpServerCodec::default());
            let mut aggregator = HttpObjectAggregator::default();
            let message = block_on(async {
                while let Some(event) = framed.next().await {
                    if let Some(Aggregated::Message(message)) = aggregator.aggregate(event.unwrap()).unwrap() {
                        return Some(message);
                    }
                }
                None
            });
            let message = message.unwrap();
            assert_eq!(message.head().method(), Some(&Method::POST));
            black_box(message);
        });
    });
}

fn bench_event_roundtrip(c: &mut Criterion) {
    c.bench_function("encode_decode_events", |b| {
        b.iter(|| {
            let mut decoder = ByteToMessage::new(HttpDecoder::request(DecoderConfig::default()), Cumulator::Merge);
            let mut events = Vec::new();
            decoder.feed(Bytes::from_static(CHUNKED_REQUEST), &mut events).unwrap();

            let mut encoder = HttpEncoder::new();
            let mut bytes = BytesMut::new();
            for event in events {
                encoder.encode(event, &mut bytes).unwrap();
            }
            black_box(bytes);
        });
    });
}

criterion_group!(
    benches,
    bench_request_decoder,
    bench_fragmented_decoder,
    bench_response_encoder,
    bench_framed_aggregation,
    bench_event_roundtrip
);
criterion_main!(benches);
