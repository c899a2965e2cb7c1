use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use postbridge::{
    protocol::codec, transport::memory, ChannelService, StackError, UpstreamMessage,
};
use serde_json::{json, Value};

fn add(body: Value) -> Result<Value, StackError> {
    let a = body["a"].as_i64().ok_or("missing a")?;
    let b = body["b"].as_i64().ok_or("missing b")?;
    Ok(json!(a + b))
}

fn bench_codec(c: &mut Criterion) {
    let msg = UpstreamMessage::request("r1", "add", json!({"a": 2, "b": 3}));
    let bytes = codec::encode(&msg).unwrap();

    c.bench_function("codec_encode_request", |b| {
        b.iter(|| codec::encode(black_box(&msg)).unwrap())
    });
    c.bench_function("codec_decode_request", |b| {
        b.iter(|| codec::decode::<UpstreamMessage>(black_box(&bytes)).unwrap())
    });
}

/// Полный путь запроса через транспорт в памяти: кодирование, разбор,
/// обработчик, ответ.
fn bench_request_roundtrip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let (endpoint, connector) = memory::channel();
    let service = std::sync::Arc::new(ChannelService::bind(endpoint));
    service.listen("add", add);
    rt.spawn({
        let service = service.clone();
        async move { service.run().await }
    });
    let mut peer = connector.connect();
    let msg = UpstreamMessage::request("r1", "add", json!({"a": 2, "b": 3}));

    c.bench_function("request_roundtrip_memory", |b| {
        b.iter(|| {
            rt.block_on(async {
                peer.send(black_box(&msg)).unwrap();
                black_box(peer.recv().await)
            })
        })
    });
}

criterion_group!(benches, bench_codec, bench_request_roundtrip);
criterion_main!(benches);
