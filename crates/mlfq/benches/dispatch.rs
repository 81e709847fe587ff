//! Benchmarks for the admission, dispatch and aging hot paths.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use mlfq::{Priority, Scheduler, Thread, ThreadConfig, ThreadId, ThreadRef, Tick};

fn population(count: u32) -> Vec<ThreadRef> {
    (1..=count)
        .map(|id| {
            let priority = Priority::new((id * 37 % 150) as u8).expect("in range");
            Thread::new(ThreadConfig::new(ThreadId(id), priority).with_burst_time(u64::from(id * 13 % 97)))
        })
        .collect()
}

fn admit_all(sched: &mut Scheduler, main: &Thread, threads: &[ThreadRef], now: Tick) {
    critical_section::with(|cs| {
        for t in threads {
            sched.ready_to_run(cs, now, main, Arc::clone(t));
        }
    });
}

pub fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let main = Thread::bootstrap();

    for count in [8u32, 64] {
        group.bench_function(format!("admit_then_drain_{count}"), |b| {
            b.iter_batched(
                || population(count),
                |threads| {
                    let mut sched = Scheduler::default();
                    admit_all(&mut sched, &main, &threads, Tick::ZERO);
                    critical_section::with(|cs| {
                        while let Some(next) = sched.find_next_to_run(cs, Tick::new(10)) {
                            black_box(next);
                        }
                    });
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

pub fn aging_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aging");
    let main = Thread::bootstrap();

    group.bench_function("sweep_64", |b| {
        b.iter_batched(
            || {
                let threads = population(64);
                let mut sched = Scheduler::default();
                admit_all(&mut sched, &main, &threads, Tick::ZERO);
                (sched, threads)
            },
            |(mut sched, threads)| {
                critical_section::with(|cs| sched.aging(cs, Tick::new(1500), &main));
                black_box(threads);
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark, aging_benchmark);
criterion_main!(benches);
