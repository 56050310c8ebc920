//! Fixed-capacity ring buffer of message writes.

use crate::messaging::bus::MessageHeader;
use crate::types::SimTime;

/// One stored write.
#[derive(Clone, Debug)]
pub struct Entry {
    pub header: MessageHeader,
    pub data: Vec<f64>,
}

/// Ring buffer with preallocated slots.
///
/// Pushing is O(1) and overwrites the oldest slot once the buffer is full.
#[derive(Clone, Debug)]
pub struct RingBuffer {
    slots: Vec<Entry>,
    next: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates a ring of `capacity` slots holding `element_count` values each.
    pub fn new(capacity: usize, element_count: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| Entry {
                header: MessageHeader::default(),
                data: vec![0.0; element_count],
            })
            .collect();
        Self {
            slots,
            next: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a write, overwriting the oldest one when full.
    pub fn push(&mut self, header: MessageHeader, data: &[f64]) {
        let slot = &mut self.slots[self.next];
        slot.header = header;
        slot.data.copy_from_slice(data);
        self.next = (self.next + 1) % self.slots.len();
        self.len = (self.len + 1).min(self.slots.len());
    }

    /// Iterates stored writes from newest to oldest.
    pub fn iter_newest(&self) -> impl Iterator<Item = &Entry> {
        let cap = self.slots.len();
        (1..=self.len).map(move |back| &self.slots[(self.next + cap - back) % cap])
    }

    /// Iterates stored writes from oldest to newest.
    pub fn iter_oldest(&self) -> impl Iterator<Item = &Entry> {
        let cap = self.slots.len();
        let start = (self.next + cap - self.len) % cap;
        (0..self.len).map(move |i| &self.slots[(start + i) % cap])
    }

    /// Most recent write regardless of visibility.
    pub fn latest(&self) -> Option<&Entry> {
        self.iter_newest().next()
    }

    /// Most recent write visible at or before `time`.
    pub fn latest_at(&self, time: SimTime) -> Option<&Entry> {
        self.iter_newest().find(|e| e.header.visible_time <= time)
    }

    /// Drops every stored write.
    pub fn clear(&mut self) {
        self.next = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(time: SimTime, count: u64) -> MessageHeader {
        MessageHeader {
            write_time: time,
            visible_time: time,
            write_count: count,
        }
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut ring = RingBuffer::new(2, 1);
        ring.push(header(0, 1), &[1.0]);
        ring.push(header(10, 2), &[2.0]);
        ring.push(header(20, 3), &[3.0]);

        assert_eq!(ring.len(), 2);
        let newest: Vec<f64> = ring.iter_newest().map(|e| e.data[0]).collect();
        assert_eq!(newest, vec![3.0, 2.0]);
        let oldest: Vec<f64> = ring.iter_oldest().map(|e| e.data[0]).collect();
        assert_eq!(oldest, vec![2.0, 3.0]);
    }

    #[test]
    fn test_latest_at_respects_visibility() {
        let mut ring = RingBuffer::new(3, 1);
        ring.push(header(0, 1), &[1.0]);
        ring.push(header(10, 2), &[2.0]);

        assert_eq!(ring.latest_at(5).map(|e| e.data[0]), Some(1.0));
        assert_eq!(ring.latest_at(10).map(|e| e.data[0]), Some(2.0));

        ring.clear();
        assert!(ring.latest_at(100).is_none());
    }
}
