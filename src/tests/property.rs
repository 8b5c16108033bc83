//! Property-based tests for scheduler, table and codec invariants.

use super::{SimpleRng, TestKernel};
use crate::config::{MAX_PACKET_LENGTH, MESSAGE_HEADER_LENGTH};
use crate::errors::MessageError;
use crate::message::{LoopbackTransport, MessageHeader, Messenger, PacketTransport};
use crate::sched::{schedule, ScheduleRequest};
use crate::syscall::numbers::*;
use crate::thread::ThreadState;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use zerocopy::FromBytes;

/// Payload bytes per fragment at the default MTU.
const D: usize = MAX_PACKET_LENGTH - MESSAGE_HEADER_LENGTH;

#[test]
fn property_live_ids_match_table() {
    let t = TestKernel::boot();
    let mut rng = SimpleRng::new(0x5EED_0001);
    let mut live: BTreeSet<u32> = BTreeSet::new();

    for _ in 0..300 {
        match rng.gen_range(0, 4) {
            0 => {
                if let Ok(id) = t
                    .kernel
                    .thread_create("churn", super::noop_entry, core::ptr::null_mut())
                {
                    live.insert(id);
                }
            }
            1 | 2 if !live.is_empty() => {
                let pick = *live
                    .iter()
                    .nth(rng.gen_range(0, live.len() as u64) as usize)
                    .unwrap();
                let which = if rng.gen_bool() {
                    SYS_THREAD_START
                } else {
                    SYS_THREAD_STOP
                };
                t.trap_as_main(which, pick, 0);
            }
            3 if !live.is_empty() => {
                let pick = *live
                    .iter()
                    .nth(rng.gen_range(0, live.len() as u64) as usize)
                    .unwrap();
                t.kernel.thread_destroy(pick);
                live.remove(&pick);
            }
            _ => {}
        }

        let table_ids: BTreeSet<u32> = t
            .kernel
            .with_state(|state| state.threads.occupied().map(|(_, th)| th.id()).collect());
        let mut expected = live.clone();
        expected.insert(1); // idle
        expected.insert(t.main_id);
        assert_eq!(table_ids, expected);
    }
}

#[test]
fn property_schedule_picks_running_max_priority() {
    let t = TestKernel::boot();
    let mut rng = SimpleRng::new(0x5EED_0002);

    let workers: Vec<u32> = (0..10).map(|_| t.spawn("w")).collect();
    let states = [
        ThreadState::Stopped,
        ThreadState::Running,
        ThreadState::Waiting,
    ];

    for _ in 0..200 {
        // Randomize the configuration.
        t.kernel.with_state(|state| {
            for &id in &workers {
                let thread = state.threads.find_by_id_mut(id).unwrap();
                thread.set_state(states[rng.gen_range(0, 3) as usize]);
                thread.set_priority(rng.gen_range(0, 10) as i32 - 5);
            }
        });

        // Any thread with a context may be the interrupted one.
        let mut candidates = workers.clone();
        candidates.push(1);
        candidates.push(t.main_id);
        let current_id = candidates[rng.gen_range(0, candidates.len() as u64) as usize];
        let current_frame = t.frame_of(current_id);

        for request in [
            ScheduleRequest::Current,
            ScheduleRequest::Other,
            ScheduleRequest::Any,
        ] {
            let (next, owner_state, owner_priority, band) = t.kernel.with_state(|state| {
                let next = schedule(&state.threads, current_frame, request);
                let owner = state.threads.find_by_context(next).unwrap();

                let (current_slot, _) =
                    state.threads.find_by_context_indexed(current_frame).unwrap();
                let mut band = i32::MIN;
                for (slot, thread) in state.threads.occupied() {
                    if request == ScheduleRequest::Other && slot == current_slot {
                        continue;
                    }
                    if thread.state() != ThreadState::Running {
                        continue;
                    }
                    band = band.max(thread.priority());
                }
                (next, owner.state(), owner.priority(), band)
            });

            // The scheduler never returns null and never returns a
            // non-Running thread.
            assert!(!next.is_null());
            assert_eq!(owner_state, ThreadState::Running);
            assert_eq!(owner_priority, band);

            if request == ScheduleRequest::Other {
                let another_in_band = t.kernel.with_state(|state| {
                    state.threads.occupied().any(|(_, th)| {
                        th.frame_ptr() != current_frame
                            && th.state() == ThreadState::Running
                            && th.priority() == band
                    })
                });
                if another_in_band {
                    assert_ne!(next, current_frame);
                }
            }
        }
    }
}

#[test]
fn property_round_robin_visits_everyone() {
    let t = TestKernel::boot();
    const K: usize = 4;

    let workers: Vec<u32> = (0..K).map(|_| t.spawn("rr")).collect();
    t.kernel.with_state(|state| {
        for &id in &workers {
            let thread = state.threads.find_by_id_mut(id).unwrap();
            thread.set_state(ThreadState::Running);
            thread.set_priority(5);
        }
    });

    let mut current = t.frame_of(workers[0]);
    let mut picks = Vec::new();
    for _ in 0..3 * K {
        current = t
            .kernel
            .with_state(|state| schedule(&state.threads, current, ScheduleRequest::Other));
        picks.push(t.owner_of(current));
    }

    // Every window of K consecutive OTHER decisions selects each band
    // member exactly once.
    for window in picks.windows(K) {
        let unique: BTreeSet<u32> = window.iter().copied().collect();
        assert_eq!(unique, workers.iter().copied().collect());
    }
}

#[test]
fn property_counter_never_escapes_bounds() {
    let t = TestKernel::boot();
    let mut rng = SimpleRng::new(0x5EED_0003);
    let handle = t.kernel.counter_init(0).unwrap();

    let mut model: u32 = 0;
    let mut increments: u32 = 0;
    for _ in 0..500 {
        if rng.gen_bool() {
            t.trap_as_main(SYS_GLOBAL_COUNTER_INCREMENT, handle.as_raw(), 0);
            model += 1;
            increments += 1;
        } else {
            t.trap_as_main(SYS_GLOBAL_COUNTER_DECREMENT, handle.as_raw(), 0);
            model = model.saturating_sub(1);
        }

        let value = t.trap_as_main(SYS_GLOBAL_COUNTER_VALUE, handle.as_raw(), 0);
        assert_eq!(value, model);
        assert!(value <= increments);
    }
}

#[test]
fn property_codec_round_trip() {
    let mut rng = SimpleRng::new(0x5EED_0004);
    let mut lengths = alloc::vec![0usize, 1, D, D + 1, 3 * D + 7, 65535];
    for _ in 0..8 {
        lengths.push(rng.gen_range(2, 4000) as usize);
    }

    for len in lengths {
        let payload: Vec<u8> = (0..len).map(|_| rng.next_u64() as u8).collect();
        let msg_type = rng.next_u64() as u16;

        let mut messenger: Messenger<_> = Messenger::new(LoopbackTransport::new());
        messenger.send(msg_type, &payload).unwrap();
        let message = messenger.recv().unwrap();

        assert_eq!(message.msg_type, msg_type);
        assert_eq!(message.data, payload);
        assert_eq!(message.data.len(), len);
        // Delivery consumed every fragment.
        assert_eq!(messenger.transport().pending(), 0);
    }
}

#[test]
fn property_reassembly_survives_reordering() {
    let mut rng = SimpleRng::new(0x5EED_0005);

    for _ in 0..50 {
        let len = rng.gen_range(4, 30) as usize;
        let payload: Vec<u8> = (0..len).map(|_| rng.next_u64() as u8).collect();

        // MTU 11 leaves 3 payload bytes per fragment.
        let mut messenger: Messenger<_, 11> = Messenger::new(LoopbackTransport::new());
        messenger.send(0x0BAD, &payload).unwrap();
        assert!(messenger.transport().pending() > 1);

        for _ in 0..64 {
            let a = rng.gen_range(0, 40) as usize;
            let b = rng.gen_range(0, 40) as usize;
            messenger.transport_mut().swap_slots(a, b);
        }

        let message = messenger.recv().unwrap();
        assert_eq!(message.data, payload);
    }
}

#[test]
fn property_interleaved_sequences_both_reassemble() {
    let mut rng = SimpleRng::new(0x5EED_0006);

    for _ in 0..50 {
        let first: Vec<u8> = (0..rng.gen_range(4, 20))
            .map(|_| rng.next_u64() as u8)
            .collect();
        let second: Vec<u8> = (0..rng.gen_range(4, 20))
            .map(|_| rng.next_u64() as u8)
            .collect();

        let mut messenger: Messenger<_, 11> = Messenger::new(LoopbackTransport::new());
        messenger.send(0x0001, &first).unwrap();
        messenger.send(0x0002, &second).unwrap();

        for _ in 0..64 {
            let a = rng.gen_range(0, 40) as usize;
            let b = rng.gen_range(0, 40) as usize;
            messenger.transport_mut().swap_slots(a, b);
        }

        let x = messenger.recv().unwrap();
        let y = messenger.recv().unwrap();
        assert_eq!(messenger.recv(), Err(MessageError::NotReady));

        let mut got = alloc::vec![(x.msg_type, x.data), (y.msg_type, y.data)];
        got.sort();
        assert_eq!(
            got,
            alloc::vec![(0x0001, first.clone()), (0x0002, second.clone())]
        );
    }
}

#[test]
fn property_sequence_wrap_skips_zero() {
    let mut messenger: Messenger<_> = Messenger::new(LoopbackTransport::new());
    messenger.set_sequence(u16::MAX);

    messenger.send(1, b"last").unwrap();
    let header = MessageHeader::read_from_prefix(messenger.transport().peek(0).unwrap()).unwrap();
    assert_eq!(header.sequence.get(), u16::MAX);
    messenger.recv().unwrap();

    assert_eq!(messenger.sequence(), 1);
    messenger.send(1, b"first again").unwrap();
    let header = MessageHeader::read_from_prefix(messenger.transport().peek(0).unwrap()).unwrap();
    assert_eq!(header.sequence.get(), 1);
}

#[test]
fn property_bogus_packets_do_not_disturb_valid_ones() {
    let mut rng = SimpleRng::new(0x5EED_0007);

    for _ in 0..20 {
        let payload: Vec<u8> = (0..rng.gen_range(4, 20))
            .map(|_| rng.next_u64() as u8)
            .collect();

        let mut messenger: Messenger<_, 11> = Messenger::new(LoopbackTransport::new());
        messenger.send(0x7777, &payload).unwrap();

        // Undersized frame and reserved-sequence frame land among the
        // valid fragments.
        messenger.transport_mut().send(&[0xAB; 5]).unwrap();
        let mut zero_seq = [0u8; 11];
        zero_seq[0] = 0x01; // type
        zero_seq[4] = 0x03; // total_length = 3
        zero_seq[8..].copy_from_slice(b"xyz");
        messenger.transport_mut().send(&zero_seq).unwrap();

        for _ in 0..32 {
            let a = rng.gen_range(0, 40) as usize;
            let b = rng.gen_range(0, 40) as usize;
            messenger.transport_mut().swap_slots(a, b);
        }

        let message = messenger.recv().unwrap();
        assert_eq!(message.msg_type, 0x7777);
        assert_eq!(message.data, payload);
        // The bogus frames were discarded along the way.
        assert_eq!(messenger.transport().pending(), 0);
    }
}
