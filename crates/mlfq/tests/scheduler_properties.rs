//! Scheduling properties of the three-band scheduler, driven directly
//! through its entry points.

use std::sync::Arc;

use mlfq::{Band, Priority, Scheduler, Thread, ThreadConfig, ThreadId, ThreadRef, Tick};

fn thread(id: u32, priority: u8, burst: u64) -> ThreadRef {
    Thread::new(
        ThreadConfig::new(ThreadId(id), Priority::new(priority).expect("valid priority"))
            .with_name(format!("t{id}"))
            .with_burst_time(burst),
    )
}

fn admit(sched: &mut Scheduler, now: u64, running: &Thread, t: &ThreadRef) {
    critical_section::with(|cs| sched.ready_to_run(cs, Tick::new(now), running, Arc::clone(t)));
}

fn next_id(sched: &mut Scheduler, now: u64) -> Option<u32> {
    critical_section::with(|cs| sched.find_next_to_run(cs, Tick::new(now))).map(|t| t.id().0)
}

fn sweep(sched: &mut Scheduler, now: u64, running: &Thread) {
    critical_section::with(|cs| sched.aging(cs, Tick::new(now), running));
}

/// Every thread is in at most one queue, and its marker names that queue.
fn assert_single_membership(sched: &Scheduler, threads: &[ThreadRef]) {
    for t in threads {
        let holders: Vec<Band> = Band::ALL
            .into_iter()
            .filter(|band| sched.queues().queue(*band).iter().any(|q| Arc::ptr_eq(q, t)))
            .collect();
        assert!(holders.len() <= 1, "thread {} held by {holders:?}", t.id());
        assert_eq!(holders.first().copied(), t.queued_band());
    }
}

#[test]
fn end_to_end_dispatch_order() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let a = thread(1, 30, 0);
    let b = thread(2, 60, 0);
    let c = thread(3, 110, 5);

    for t in [&a, &b, &c] {
        admit(&mut sched, 0, &main, t);
    }

    assert_eq!(next_id(&mut sched, 0), Some(3));
    assert_eq!(next_id(&mut sched, 0), Some(2));
    assert_eq!(next_id(&mut sched, 0), Some(1));
    assert_eq!(next_id(&mut sched, 0), None);
}

#[test]
fn l1_never_yields_to_lower_bands() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    admit(&mut sched, 0, &main, &thread(1, 99, 1));
    admit(&mut sched, 0, &main, &thread(2, 49, 1));
    admit(&mut sched, 0, &main, &thread(3, 100, 900));
    admit(&mut sched, 0, &main, &thread(4, 149, 1000));

    assert_eq!(next_id(&mut sched, 1), Some(3));
    assert_eq!(next_id(&mut sched, 1), Some(4));
    assert_eq!(next_id(&mut sched, 1), Some(1));
    assert_eq!(next_id(&mut sched, 1), Some(2));
}

#[test]
fn l1_dispatches_shortest_burst_first() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    admit(&mut sched, 0, &main, &thread(1, 100, 30));
    admit(&mut sched, 0, &main, &thread(2, 149, 20));
    admit(&mut sched, 0, &main, &thread(3, 120, 20));
    admit(&mut sched, 0, &main, &thread(4, 101, 5));

    let order: Vec<_> = (0..4).filter_map(|_| next_id(&mut sched, 0)).collect();
    assert_eq!(order, vec![4, 2, 3, 1]);
}

#[test]
fn l2_dispatches_highest_priority_first() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    admit(&mut sched, 0, &main, &thread(1, 55, 0));
    admit(&mut sched, 0, &main, &thread(2, 80, 0));
    admit(&mut sched, 0, &main, &thread(3, 55, 0));
    admit(&mut sched, 0, &main, &thread(4, 99, 0));

    let order: Vec<_> = (0..4).filter_map(|_| next_id(&mut sched, 0)).collect();
    assert_eq!(order, vec![4, 2, 1, 3]);
}

#[test]
fn aging_promotes_l3_thread_once_per_threshold() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let t = thread(1, 45, 0);
    admit(&mut sched, 0, &main, &t);

    for now in [100, 500, 1000, 1499] {
        sweep(&mut sched, now, &main);
    }
    assert_eq!(t.priority().get(), 45);

    sweep(&mut sched, 1500, &main);
    assert_eq!(t.priority().get(), 55);

    // The L3 interval was folded in on the way to L2; nothing is left over.
    for now in [1600, 2000, 2999] {
        sweep(&mut sched, now, &main);
    }
    assert_eq!(t.priority().get(), 55);
    assert_eq!(t.queued_band(), Some(Band::L2));
}

#[test]
fn band_crossing_moves_thread_to_l1() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let t = thread(1, 95, 10);
    admit(&mut sched, 0, &main, &t);

    sweep(&mut sched, 1500, &main);

    assert_eq!(t.priority().get(), 105);
    assert_eq!(t.queued_band(), Some(Band::L1));
    assert!(sched.queues().queue(Band::L2).is_empty());
    assert_eq!(sched.queues().queue(Band::L1).len(), 1);
    assert_eq!(t.ready_at(), Tick::new(1500));
}

#[test]
fn priority_never_exceeds_cap() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let t = thread(1, 140, 1);
    admit(&mut sched, 0, &main, &t);

    for step in 1..=20u64 {
        sweep(&mut sched, step * 1500, &main);
        assert!(t.priority() <= Priority::MAX);
    }
    assert_eq!(t.priority(), Priority::MAX);
}

#[test]
fn preemption_requires_shorter_burst() {
    let mut sched = Scheduler::default();
    let running = thread(1, 120, 50);

    admit(&mut sched, 0, &running, &thread(2, 120, 80));
    assert!(!running.preempt_requested());

    admit(&mut sched, 0, &running, &thread(3, 120, 10));
    assert!(running.preempt_requested());
}

#[test]
fn membership_stays_single_under_mixed_operations() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let threads: Vec<_> = [(1, 10), (2, 45), (3, 55), (4, 95), (5, 99), (6, 120), (7, 0)]
        .into_iter()
        .map(|(id, prio)| thread(id, prio, u64::from(id) * 3))
        .collect();

    for (i, t) in threads.iter().enumerate() {
        admit(&mut sched, i as u64 * 200, &main, t);
    }
    assert_single_membership(&sched, &threads);

    let mut now = 0;
    for round in 0..12 {
        now += 700;
        sweep(&mut sched, now, &main);
        assert_single_membership(&sched, &threads);

        if round % 3 == 0 {
            if let Some(t) = critical_section::with(|cs| sched.find_next_to_run(cs, Tick::new(now))) {
                assert!(!t.is_queued());
                assert_single_membership(&sched, &threads);
                admit(&mut sched, now, &main, &t);
            }
        }
        assert_eq!(sched.ready_count(), threads.len());
    }
}

#[test]
#[should_panic(expected = "already queued")]
fn double_admission_is_fatal() {
    let mut sched = Scheduler::default();
    let main = Thread::bootstrap();
    let t = thread(1, 70, 0);
    admit(&mut sched, 0, &main, &t);
    admit(&mut sched, 5, &main, &t);
}
