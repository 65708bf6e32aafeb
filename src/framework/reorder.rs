use std::collections::VecDeque;

/// Releases sequence-tagged items strictly in sequence order.
///
/// Workers finish chunks out of order; the emitting side inserts whatever
/// arrives and pops only once every earlier sequence number has been seen.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    /// Slot `i` holds the item tagged `base_seq + i`, if it has arrived.
    slots: VecDeque<Option<T>>,
    base_seq: u64,
    pending: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    /// Empty buffer expecting sequence number zero first.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Empty buffer whose first released item will be `first_seq`.
    pub fn starting_at(first_seq: u64) -> Self {
        Self {
            slots: VecDeque::new(),
            base_seq: first_seq,
            pending: 0,
        }
    }

    /// Store `item` under `seq`.
    ///
    /// # Panics
    ///
    /// In debug builds, if `seq` was already released or already buffered.
    pub fn insert(&mut self, seq: u64, item: T) {
        debug_assert!(seq >= self.base_seq, "sequence {seq} already released");
        let index = (seq - self.base_seq) as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        debug_assert!(self.slots[index].is_none(), "duplicate sequence {seq}");
        self.slots[index] = Some(item);
        self.pending += 1;
    }

    /// Pop the next item in sequence, if it has arrived.
    pub fn try_pop_next(&mut self) -> Option<T> {
        match self.slots.front() {
            Some(Some(_)) => {}
            _ => return None,
        }
        let item = self.slots.pop_front().flatten()?;
        self.base_seq += 1;
        self.pending -= 1;
        Some(item)
    }

    /// Sequence number the next pop will release.
    pub fn next_seq(&self) -> u64 {
        self.base_seq
    }

    /// Items buffered but not yet released.
    pub fn len(&self) -> usize {
        self.pending
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_sequence_order() {
        let mut buffer = ReorderBuffer::new();
        buffer.insert(2, "c");
        buffer.insert(0, "a");
        assert_eq!(buffer.try_pop_next(), Some("a"));
        assert_eq!(buffer.try_pop_next(), None);
        assert_eq!(buffer.len(), 1);

        buffer.insert(1, "b");
        assert_eq!(buffer.try_pop_next(), Some("b"));
        assert_eq!(buffer.try_pop_next(), Some("c"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.next_seq(), 3);
    }

    #[test]
    fn holds_everything_until_the_gap_fills() {
        let mut buffer = ReorderBuffer::starting_at(10);
        for seq in (11..20).rev() {
            buffer.insert(seq, seq);
        }
        assert_eq!(buffer.try_pop_next(), None);
        buffer.insert(10, 10);
        let drained: Vec<u64> = std::iter::from_fn(|| buffer.try_pop_next()).collect();
        assert_eq!(drained, (10..20).collect::<Vec<_>>());
    }
}
