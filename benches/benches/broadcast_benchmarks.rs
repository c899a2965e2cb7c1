use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use postbridge::{
    transport::memory::{self, MemoryPeer},
    ChannelService, Endpoint, Inbound, UpstreamMessage,
};
use serde_json::json;

/// Сервис с `n` подписчиками на `ticks`. Подписка проходит через
/// `dispatch`, без фонового цикла.
fn setup(
    rt: &tokio::runtime::Runtime,
    n: usize,
) -> (ChannelService, Vec<MemoryPeer>) {
    let (mut endpoint, connector) = memory::channel();
    // Сервис получает сообщения вручную, его собственный транспорт не нужен.
    let service = ChannelService::bind(memory::channel().0);
    service.observe("ticks");

    let mut peers: Vec<MemoryPeer> = (0..n).map(|_| connector.connect()).collect();
    rt.block_on(async {
        for (i, peer) in peers.iter_mut().enumerate() {
            peer.send(&UpstreamMessage::subscribe(format!("s{i}"), "ticks"))
                .unwrap();
            let inbound: Inbound = endpoint.recv().await.unwrap();
            service.dispatch(inbound).await;
            // ack
            peer.recv().await.unwrap();
        }
    });
    (service, peers)
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("broadcast");
    for n in [0usize, 1, 10, 100] {
        let (service, mut peers) = setup(&rt, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let delivered = service.broadcast("ticks", black_box(json!({"n": 1})));
                // Вычитываем события, чтобы очереди не росли.
                rt.block_on(async {
                    for peer in peers.iter_mut() {
                        black_box(peer.recv().await);
                    }
                });
                delivered
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_broadcast);
criterion_main!(benches);
