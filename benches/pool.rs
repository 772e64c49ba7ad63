use std::{convert::Infallible, fmt::Display};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const ITERATIONS: usize = 1 << 14;

struct Manager;

#[async_trait::async_trait]
impl respool::Manager for Manager {
    type Type = ();
    type Error = Infallible;
    async fn create(&self) -> Result<Self::Type, Self::Error> {
        Ok(())
    }
    async fn destroy(&self, _obj: Self::Type) -> Result<(), Self::Error> {
        Ok(())
    }
}

type Pool = respool::Pool<Manager>;

/// What a worker does with each resource it gets.
#[derive(Copy, Clone, Debug)]
enum Workload {
    /// Returns it right away. Workers never outnumber resources, so every
    /// `get` is served from the idle store.
    Reuse,
    /// Holds it across a yield so that the other workers park and are served
    /// by direct handoff on `put`.
    Handoff,
    /// Discards it, so parked workers are served by the background opener.
    Replenish,
}

#[derive(Copy, Clone, Debug)]
struct Config {
    workload: Workload,
    pool_size: usize,
    workers: usize,
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}s{}", self.workers, self.pool_size)
    }
}

impl Config {
    fn operations_per_worker(&self) -> usize {
        ITERATIONS / self.workers
    }

    async fn run(self, pool: Pool) {
        for _ in 0..self.operations_per_worker() {
            let obj = pool.get().await.unwrap();
            match self.workload {
                Workload::Reuse => pool.put(obj).await.unwrap(),
                Workload::Handoff => {
                    tokio::task::yield_now().await;
                    pool.put(obj).await.unwrap();
                }
                Workload::Replenish => pool.discard(obj).await.unwrap(),
            }
        }
    }
}

#[rustfmt::skip]
const CONFIGS: &[Config] = &[
    Config { workload: Workload::Reuse,     workers:  8, pool_size:  8 },
    Config { workload: Workload::Reuse,     workers: 32, pool_size: 32 },
    Config { workload: Workload::Handoff,   workers: 16, pool_size:  4 },
    Config { workload: Workload::Handoff,   workers: 32, pool_size:  8 },
    Config { workload: Workload::Handoff,   workers: 64, pool_size:  8 },
    Config { workload: Workload::Replenish, workers:  8, pool_size:  8 },
    Config { workload: Workload::Replenish, workers: 32, pool_size:  8 },
];

async fn bench_pool(cfg: Config) {
    let pool = Pool::builder(Manager)
        .max_size(cfg.pool_size)
        .initial_size(cfg.pool_size)
        .build()
        .await
        .unwrap();

    let workers: Vec<_> = (0..cfg.workers)
        .map(|_| tokio::spawn(cfg.run(pool.clone())))
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }
    pool.close().await;
}

fn criterion_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("pool");
    for &config in CONFIGS {
        let name = match config.workload {
            Workload::Reuse => "reuse",
            Workload::Handoff => "handoff",
            Workload::Replenish => "replenish",
        };
        group.bench_function(BenchmarkId::new(name, config), |b| {
            b.to_async(&runtime).iter(|| bench_pool(config))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
