use std::collections::BTreeSet;

/// Hands out dense slot indices, reusing released slots (lowest first).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocator {
    len: usize,
    free: BTreeSet<usize>,
}

impl Allocator {
    pub fn alloc(&mut self) -> usize {
        if let Some(slot) = self.free.pop_first() {
            return slot;
        }

        self.len += 1;
        self.len - 1
    }

    /// Gives slot back; releasing a slot twice is a no-op.
    pub fn release(&mut self, slot: usize) {
        if slot >= self.len {
            return;
        }

        self.free.insert(slot);

        // Trailing free slots shrink the table instead
        while self.len > 0 && self.free.remove(&(self.len - 1)) {
            self.len -= 1;
        }
    }

    /// Number of slots the table has to hold, free ones included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_allocated(&self, slot: usize) -> bool {
        slot < self.len && !self.free.contains(&slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        let mut target = Allocator::default();

        assert!(target.is_empty());
        assert_eq!(0, target.alloc());
        assert_eq!(1, target.alloc());
        assert_eq!(2, target.alloc());
        assert_eq!(3, target.alloc());
        assert_eq!(4, target.len());

        // ---
        // Case 1: Holes are filled lowest-first

        target.release(2);
        target.release(0);

        assert!(!target.is_allocated(0));
        assert!(target.is_allocated(1));
        assert_eq!(4, target.len());
        assert_eq!(0, target.alloc());
        assert_eq!(2, target.alloc());
        assert_eq!(4, target.alloc());

        // ---
        // Case 2: Trailing slots shrink the table

        target.release(3);
        target.release(4);

        assert_eq!(3, target.len());
        assert_eq!(3, target.alloc());

        // ---
        // Case 3: Double and out-of-range releases

        target.release(1);
        target.release(1);
        target.release(100);

        assert_eq!(1, target.alloc());
        assert_eq!(4, target.alloc());
    }
}
