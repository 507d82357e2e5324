use keyed_priority_queue::KeyedPriorityQueue;
use slotmap::{SlotMap, new_key_type};
use std::cmp::Ordering;

use super::state::{JobId, Ticks};

new_key_type! {
    /// Generational handle to a scheduled event. Once the event is cancelled or
    /// delivered the key goes stale and never resolves again.
    pub struct EventKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Arrival,
    CpuBurstComplete,
    IoBurstComplete,
    QuantumExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: Ticks,
    pub job: JobId,
    pub kind: EventKind,
}

// Dispatch order: earliest time first, then scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Due {
    time: Ticks,
    seq: u64,
}

// KeyedPriorityQueue is a max-heap, so we need to flip-flop Due's Ord
impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Due {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.time, other.seq).cmp(&(self.time, self.seq))
    }
}

#[derive(Debug)]
pub struct Timeline {
    events: SlotMap<EventKey, Event>,
    order: KeyedPriorityQueue<EventKey, Due>,
    next_seq: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            events: SlotMap::with_key(),
            order: KeyedPriorityQueue::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, time: Ticks, job: JobId, kind: EventKind) -> EventKey {
        let key = self.events.insert(Event { time, job, kind });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push(key, Due { time, seq });
        key
    }

    /// Invalidates a pending event. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, key: EventKey) -> bool {
        if self.events.remove(key).is_none() {
            return false;
        }
        let removed = self.order.remove(&key);
        debug_assert!(removed.is_some(), "Live event missing from dispatch order");
        true
    }

    pub fn is_pending(&self, key: EventKey) -> bool {
        self.events.contains_key(key)
    }

    /// Pops the next event due at or before `now`.
    pub fn pop_due(&mut self, now: Ticks) -> Option<(EventKey, Event)> {
        let (_, due) = self.order.peek()?;
        if due.time > now {
            return None;
        }

        let (key, _) = self.order.pop()?;
        let event = self.events.remove(key)?;
        debug_assert_eq!(event.time, now, "Event {event:?} dispatched late");
        Some((key, event))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
