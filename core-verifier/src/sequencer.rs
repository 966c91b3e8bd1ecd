use std::collections::HashMap;

use crate::Address;

/// Per-emitter sequence numbers for outgoing messages. Counters start at zero and only ever
/// move forward by one.
#[derive(Debug, Default, Clone)]
pub struct EmitterSequencer {
    sequences: HashMap<Address, u64>,
}

impl EmitterSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the emitter's current sequence and advances its counter.
    pub fn next(&mut self, emitter: &Address) -> u64 {
        let counter = self.sequences.entry(*emitter).or_insert(0);
        let sequence = *counter;
        *counter += 1;
        sequence
    }

    /// The sequence the emitter's next message will receive.
    pub fn peek(&self, emitter: &Address) -> u64 {
        self.sequences.get(emitter).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn first_sequence_is_zero() {
        let mut sequencer = EmitterSequencer::new();
        let emitter = Address([1; 32]);

        assert_eq!(0, sequencer.peek(&emitter));
        assert_eq!(0, sequencer.next(&emitter));
        assert_eq!(1, sequencer.peek(&emitter));
    }

    proptest! {
        #[test]
        fn counters_are_strict_and_independent(k in 1usize..64, other_calls in 0usize..8) {
            let mut sequencer = EmitterSequencer::new();
            let a = Address([0xaa; 32]);
            let b = Address([0xbb; 32]);

            for _ in 0..other_calls {
                sequencer.next(&b);
            }

            let seen: Vec<u64> = (0..k).map(|_| sequencer.next(&a)).collect();
            let expected: Vec<u64> = (0..k as u64).collect();
            prop_assert_eq!(expected, seen);
            prop_assert_eq!(other_calls as u64, sequencer.peek(&b));
        }
    }
}
