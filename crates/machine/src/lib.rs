//! The per-machine simulation loop.
//!
//! A [`Machine`] owns one Lamport clock, one mailbox, its peer list, and a
//! handle to the shared fabric. Each tick it either drains one mailbox entry
//! (RECEIVE) or draws an [`Action`] from its configured weights (SEND or
//! INTERNAL), updates the clock by Lamport's rules, and emits one
//! [`EventRecord`].
//!
//! The decision logic lives in the synchronous [`Machine::step`]:
//!
//! - **Synchronous**: no blocking, no waiting on peers
//! - **Deterministic**: given the same RNG seed and inbound messages, the
//!   same sequence of events
//! - **No timing**: all scheduling lives in [`Machine::run`]
//!
//! so it can be unit tested without threads, while [`Machine::run`] wraps it
//! in a drift-free fixed-rate schedule on a dedicated thread.

mod action;

pub use action::{Action, ActionWeights};

use crossbeam::channel::Sender;
use driftlab_fabric::{DeliveryError, Fabric, Mailbox};
use driftlab_types::{
    EventKind, EventRecord, LamportClock, LamportTime, MachineId, Message, SendTarget, TickRate,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, trace};

/// Errors a tick loop can hit.
///
/// None of these occur in a validated, running simulation; they surface
/// wiring bugs (a dropped mailbox or event stream) instead of letting
/// messages or records vanish.
#[derive(Debug, Error)]
pub enum MachineError {
    /// A message could not be enqueued at its target.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// The event stream consumer went away before the run ended.
    #[error("event stream disconnected before the run ended")]
    EventSinkClosed,
}

/// End-of-run accounting for one machine.
#[derive(Debug, Clone, Serialize)]
pub struct MachineReport {
    /// The machine.
    pub id: MachineId,

    /// The tick rate the machine ran at.
    pub tick_rate: TickRate,

    /// Ticks executed before the stop signal was observed.
    pub ticks: u64,

    /// Logical clock value when the machine stopped.
    pub final_clock: LamportTime,

    /// Messages still queued in the mailbox at cutoff.
    ///
    /// The runner finalizes this after *all* machines have stopped, so that
    /// sends in flight at this machine's own cutoff are still counted.
    pub undrained: usize,
}

/// Construction-time parameters for one machine.
///
/// `peers` is the ordered list of all other machine ids; the action policy
/// addresses it by index. `seed` feeds this machine's private RNG, so a
/// fixed configuration seed reproduces the same action draws.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// This machine's id.
    pub id: MachineId,

    /// Ticks per second.
    pub tick_rate: TickRate,

    /// All other machine ids, in peer-list order.
    pub peers: Vec<MachineId>,

    /// The action distribution to draw from.
    pub weights: ActionWeights,

    /// Seed for this machine's private RNG.
    pub seed: u64,
}

/// One simulated machine.
pub struct Machine {
    id: MachineId,
    tick_rate: TickRate,
    clock: LamportClock,
    mailbox: Mailbox,
    peers: Vec<MachineId>,
    fabric: Arc<Fabric>,
    weights: ActionWeights,
    rng: ChaCha8Rng,
    events: Sender<EventRecord>,
    ticks: u64,
}

impl Machine {
    /// Create a machine from its parameters plus the wiring handles: its
    /// own mailbox, the shared fabric, and the record stream.
    pub fn new(
        config: MachineConfig,
        mailbox: Mailbox,
        fabric: Arc<Fabric>,
        events: Sender<EventRecord>,
    ) -> Self {
        Self {
            id: config.id,
            tick_rate: config.tick_rate,
            clock: LamportClock::new(),
            mailbox,
            peers: config.peers,
            fabric,
            weights: config.weights,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            events,
            ticks: 0,
        }
    }

    /// This machine's id.
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// This machine's tick rate.
    pub fn tick_rate(&self) -> TickRate {
        self.tick_rate
    }

    /// Current logical clock value.
    pub fn clock(&self) -> LamportTime {
        self.clock.now()
    }

    /// Execute one tick: receive-or-act, clock update, one emitted record.
    ///
    /// Exactly one of the three event kinds happens per call. No timing is
    /// involved; [`Machine::run`] provides the fixed-rate schedule.
    pub fn step(&mut self) -> Result<(), MachineError> {
        self.ticks += 1;
        if let Some(message) = self.mailbox.try_pop() {
            let clock = self.clock.observe(message.sent_at);
            let kind = EventKind::Receive {
                from: message.sender,
                queue_len: self.mailbox.len(),
            };
            return self.emit(kind, clock);
        }

        match self.weights.draw(&mut self.rng) {
            Action::SendFirst => self.send_to_peer(0),
            Action::SendSecond => self.send_to_peer(1),
            Action::Broadcast => self.broadcast(),
            Action::Internal => self.internal(),
        }
    }

    /// SEND to the peer at `index`, or fall back to INTERNAL if the peer
    /// list is too short (two-machine runs drawing `SendSecond`).
    fn send_to_peer(&mut self, index: usize) -> Result<(), MachineError> {
        let Some(&peer) = self.peers.get(index) else {
            return self.internal();
        };
        // Increment first: the message carries the post-increment value.
        let clock = self.clock.tick();
        self.fabric.send(peer, Message::new(self.id, clock))?;
        self.emit(
            EventKind::Send {
                target: SendTarget::Peer(peer),
            },
            clock,
        )
    }

    /// SEND to all peers: one clock increment, the same value on every copy,
    /// one emitted record.
    fn broadcast(&mut self) -> Result<(), MachineError> {
        if self.peers.is_empty() {
            return self.internal();
        }
        let clock = self.clock.tick();
        self.fabric.broadcast(self.id, Message::new(self.id, clock))?;
        self.emit(
            EventKind::Send {
                target: SendTarget::All,
            },
            clock,
        )
    }

    fn internal(&mut self) -> Result<(), MachineError> {
        let clock = self.clock.tick();
        self.emit(EventKind::Internal, clock)
    }

    fn emit(&mut self, kind: EventKind, clock: LamportTime) -> Result<(), MachineError> {
        trace!(machine = %self.id, event = kind.name(), %clock, "tick");
        self.events
            .send(EventRecord::now(self.id, kind, clock))
            .map_err(|_| MachineError::EventSinkClosed)
    }

    /// Run the tick loop until `stop` is raised.
    ///
    /// Scheduling is drift-free fixed-rate: each deadline is the previous
    /// deadline plus the tick period, not "now plus period", so sleep jitter
    /// does not accumulate. If a tick overruns its period the schedule is
    /// rebased rather than bursting to catch up. The stop flag is observed
    /// between ticks only; no event is emitted after it is seen.
    ///
    /// Returns the report and the mailbox so the caller can count messages
    /// that were still in flight at cutoff.
    pub fn run(mut self, stop: Arc<AtomicBool>) -> Result<(MachineReport, Mailbox), MachineError> {
        info!(machine = %self.id, rate = %self.tick_rate, "machine starting");
        let period = self.tick_rate.period();
        let mut next_tick = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            self.step()?;
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
        info!(
            machine = %self.id,
            ticks = self.ticks,
            clock = %self.clock.now(),
            queued = self.mailbox.len(),
            "machine stopped"
        );
        let report = MachineReport {
            id: self.id,
            tick_rate: self.tick_rate,
            ticks: self.ticks,
            final_clock: self.clock.now(),
            undrained: self.mailbox.len(),
        };
        Ok((report, self.mailbox))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{unbounded, Receiver};
    use driftlab_fabric::MailboxSender;

    /// A hand-wired machine plus the handles a test needs to poke at it:
    /// a sender into its own mailbox, the peers' mailboxes, and the record
    /// stream.
    struct Harness {
        machine: Machine,
        inbound: MailboxSender,
        peer_mailboxes: Vec<(MachineId, Mailbox)>,
        records: Receiver<EventRecord>,
    }

    fn harness(num_machines: u32, weights: ActionWeights, seed: u64) -> Harness {
        let mut links = Vec::new();
        let mut mailboxes = Vec::new();
        for i in 0..num_machines {
            let (tx, mailbox) = Mailbox::unbounded();
            links.push((MachineId(i), tx));
            mailboxes.push((MachineId(i), mailbox));
        }
        let inbound = links[0].1.clone();
        let fabric = Arc::new(Fabric::new(links));
        let (events, records) = unbounded();

        let (own_id, own_mailbox) = mailboxes.remove(0);
        let config = MachineConfig {
            id: own_id,
            tick_rate: TickRate::new(1),
            peers: (1..num_machines).map(MachineId).collect(),
            weights,
            seed,
        };
        let machine = Machine::new(config, own_mailbox, fabric, events);
        Harness {
            machine,
            inbound,
            peer_mailboxes: mailboxes,
            records,
        }
    }

    /// Weights that force a specific action on every empty-mailbox tick.
    fn only(action: Action) -> ActionWeights {
        let mut weights = ActionWeights {
            send_first: 0,
            send_second: 0,
            broadcast: 0,
            internal: 0,
        };
        match action {
            Action::SendFirst => weights.send_first = 1,
            Action::SendSecond => weights.send_second = 1,
            Action::Broadcast => weights.broadcast = 1,
            Action::Internal => weights.internal = 1,
        }
        weights
    }

    #[test]
    fn test_receive_applies_max_plus_one_and_records_queue_length() {
        let mut h = harness(3, only(Action::Internal), 0);

        // Advance the local clock to 2.
        h.machine.step().unwrap();
        h.machine.step().unwrap();

        h.inbound
            .push(Message::new(MachineId(1), LamportTime(10)))
            .unwrap();
        h.inbound
            .push(Message::new(MachineId(2), LamportTime(4)))
            .unwrap();

        // First receive: max(2, 10) + 1 = 11, one message still queued.
        h.machine.step().unwrap();
        // Second receive: max(11, 4) + 1 = 12, queue drained.
        h.machine.step().unwrap();

        let records: Vec<_> = h.records.try_iter().collect();
        assert_eq!(
            records[2].kind,
            EventKind::Receive {
                from: MachineId(1),
                queue_len: 1
            }
        );
        assert_eq!(records[2].clock, LamportTime(11));
        assert_eq!(
            records[3].kind,
            EventKind::Receive {
                from: MachineId(2),
                queue_len: 0
            }
        );
        assert_eq!(records[3].clock, LamportTime(12));
    }

    #[test]
    fn test_receive_takes_priority_over_actions() {
        // All-broadcast weights, but a queued message means no send happens.
        let mut h = harness(3, only(Action::Broadcast), 0);
        h.inbound
            .push(Message::new(MachineId(1), LamportTime(1)))
            .unwrap();
        h.machine.step().unwrap();

        let record = h.records.try_recv().unwrap();
        assert!(record.kind.is_receive());
        for (_, mailbox) in &h.peer_mailboxes {
            assert!(mailbox.is_empty());
        }
    }

    #[test]
    fn test_send_carries_the_post_increment_value() {
        let mut h = harness(3, only(Action::SendFirst), 0);
        h.machine.step().unwrap();

        let record = h.records.try_recv().unwrap();
        assert_eq!(
            record.kind,
            EventKind::Send {
                target: SendTarget::Peer(MachineId(1))
            }
        );
        assert_eq!(record.clock, LamportTime(1));

        // Peer 1 got the message stamped with the recorded (post-increment)
        // value; peer 2 got nothing.
        let delivered = h.peer_mailboxes[0].1.try_pop().unwrap();
        assert_eq!(delivered, Message::new(MachineId(0), LamportTime(1)));
        assert!(h.peer_mailboxes[1].1.is_empty());
    }

    #[test]
    fn test_broadcast_shares_one_increment_across_all_copies() {
        let mut h = harness(4, only(Action::Broadcast), 0);
        h.machine.step().unwrap();

        let record = h.records.try_recv().unwrap();
        assert_eq!(
            record.kind,
            EventKind::Send {
                target: SendTarget::All
            }
        );
        assert_eq!(record.clock, LamportTime(1));
        assert_eq!(h.machine.clock(), LamportTime(1), "exactly one increment");

        for (_, mailbox) in &h.peer_mailboxes {
            let delivered = mailbox.try_pop().unwrap();
            assert_eq!(delivered.sent_at, LamportTime(1));
            assert_eq!(delivered.sender, MachineId(0));
        }
    }

    #[test]
    fn test_send_second_degenerates_to_internal_with_one_peer() {
        // Two machines: the peer list has a single entry, so SendSecond has
        // no target and must become an internal event.
        let mut h = harness(2, only(Action::SendSecond), 0);
        h.machine.step().unwrap();

        let record = h.records.try_recv().unwrap();
        assert_eq!(record.kind, EventKind::Internal);
        assert_eq!(record.clock, LamportTime(1));
        assert!(h.peer_mailboxes[0].1.is_empty());
    }

    #[test]
    fn test_broadcast_with_two_machines_is_a_single_send() {
        let mut h = harness(2, only(Action::Broadcast), 0);
        h.machine.step().unwrap();

        let record = h.records.try_recv().unwrap();
        assert_eq!(
            record.kind,
            EventKind::Send {
                target: SendTarget::All
            }
        );
        assert_eq!(h.peer_mailboxes[0].1.len(), 1);
    }

    #[test]
    fn test_same_seed_same_event_sequence() {
        let mut a = harness(3, ActionWeights::default(), 99);
        let mut b = harness(3, ActionWeights::default(), 99);
        for _ in 0..300 {
            a.machine.step().unwrap();
            b.machine.step().unwrap();
        }
        let kinds_a: Vec<_> = a.records.try_iter().map(|r| (r.kind, r.clock)).collect();
        let kinds_b: Vec<_> = b.records.try_iter().map(|r| (r.kind, r.clock)).collect();
        assert_eq!(kinds_a.len(), 300);
        assert_eq!(kinds_a, kinds_b);
    }

    #[test]
    fn test_clock_sequence_is_strictly_increasing_under_mixed_events() {
        let mut h = harness(3, ActionWeights::default(), 5);
        let mut previous = LamportTime::ZERO;
        for i in 0..200u64 {
            if i % 7 == 0 {
                h.inbound
                    .push(Message::new(MachineId(1), LamportTime(i * 3)))
                    .unwrap();
            }
            h.machine.step().unwrap();
        }
        for record in h.records.try_iter() {
            assert!(record.clock > previous);
            previous = record.clock;
        }
    }

    #[test]
    fn test_run_stops_on_signal_and_reports() {
        let h = harness(2, ActionWeights::default(), 0);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::spawn(move || h.machine.run(stop));

        thread::sleep(std::time::Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
        let (report, mailbox) = handle.join().unwrap().unwrap();

        assert_eq!(report.id, MachineId(0));
        assert!(report.ticks >= 1);
        assert!(report.final_clock >= LamportTime(1));
        assert_eq!(report.undrained, mailbox.len());
    }
}
