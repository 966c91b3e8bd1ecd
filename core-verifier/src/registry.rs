//! Append-only history of guardian sets.
//!
//! Sets are stored by index, starting from genesis at index 0. The last set is the current one
//! and is the only set with `expiration_time == 0`. Retired sets are kept forever and remain
//! usable until their expiration time passes.

use tracing::info;

use crate::{error::RegistryError, guardian_set::GuardianSet};

#[derive(Debug, Clone)]
pub struct GuardianSetRegistry {
    sets: Vec<GuardianSet>,
    /// Seconds a retired set stays usable after rotation.
    grace_period: u32,
}

impl GuardianSetRegistry {
    /// Starts the registry from the genesis set, which must have index 0.
    pub fn genesis(mut set: GuardianSet, grace_period: u32) -> Result<Self, RegistryError> {
        require!(
            set.index == 0,
            RegistryError::NonSequentialIndex {
                expected: 0,
                actual: set.index,
            }
        );
        set.validate()?;
        set.expiration_time = 0;

        Ok(Self {
            sets: vec![set],
            grace_period,
        })
    }

    pub fn get(&self, index: u32) -> Result<&GuardianSet, RegistryError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.sets.get(i))
            .ok_or(RegistryError::NotFound(index))
    }

    pub fn current(&self) -> &GuardianSet {
        // Non-empty from construction onwards.
        &self.sets[self.sets.len() - 1]
    }

    pub fn current_index(&self) -> u32 {
        self.current().index
    }

    pub fn grace_period(&self) -> u32 {
        self.grace_period
    }

    /// Whether VAAs signed by set `index` may be accepted at time `now`. The current set is
    /// always usable, a retired set only strictly before its expiration time.
    pub fn is_usable(&self, index: u32, now: u32) -> bool {
        if index == self.current_index() {
            return true;
        }

        match self.get(index) {
            Ok(set) => set.expiration_time != 0 && now < set.expiration_time,
            Err(_) => false,
        }
    }

    /// Checks that `new_set` is a valid successor of the current set without installing it.
    /// The index space does not wrap: no set follows `u32::MAX`.
    pub fn check_next(&self, new_set: &GuardianSet) -> Result<(), RegistryError> {
        let expected = self.current_index().wrapping_add(1);
        require!(
            new_set.index == expected && expected != 0,
            RegistryError::NonSequentialIndex {
                expected,
                actual: new_set.index,
            }
        );
        new_set.validate()
    }

    /// Retires the current set and installs `new_set` in its place. Only called once a
    /// guardian set upgrade has passed governance.
    pub fn rotate(&mut self, mut new_set: GuardianSet, now: u32) -> Result<(), RegistryError> {
        self.check_next(&new_set)?;
        let current_index = self.current_index();

        // Zero is reserved for the current set.
        let expiration_time = now.saturating_add(self.grace_period).max(1);
        let len = self.sets.len();
        self.sets[len - 1].expiration_time = expiration_time;

        new_set.creation_time = now;
        new_set.expiration_time = 0;

        info!(
            old_index = current_index,
            new_index = new_set.index,
            num_guardians = new_set.num_guardians(),
            expiration_time,
            "guardian set rotated"
        );
        self.sets.push(new_set);

        Ok(())
    }

    /// All sets ever installed, oldest first.
    pub fn history(&self) -> &[GuardianSet] {
        &self.sets
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::GuardianAddress;

    fn set(index: u32, n: u8) -> GuardianSet {
        GuardianSet::new(
            index,
            (1..=n).map(|i| GuardianAddress([i + index as u8; 20])).collect(),
        )
    }

    #[test]
    fn genesis_must_be_index_zero() {
        assert_eq!(
            Err(RegistryError::NonSequentialIndex {
                expected: 0,
                actual: 3
            }),
            GuardianSetRegistry::genesis(set(3, 1), 0).map(|_| ())
        );
        assert_eq!(
            Err(RegistryError::ZeroGuardians),
            GuardianSetRegistry::genesis(GuardianSet::new(0, vec![]), 0).map(|_| ())
        );

        let registry = GuardianSetRegistry::genesis(set(0, 1), 0).unwrap();
        assert_eq!(0, registry.current_index());
        assert_eq!(Err(RegistryError::NotFound(1)), registry.get(1).map(|_| ()));
    }

    #[test]
    fn rotation_requires_next_index() {
        let mut registry = GuardianSetRegistry::genesis(set(0, 1), 100).unwrap();

        for index in [0, 2, 7] {
            assert_eq!(
                Err(RegistryError::NonSequentialIndex {
                    expected: 1,
                    actual: index
                }),
                registry.rotate(set(index, 2), 1_000)
            );
        }

        let mut zero = set(1, 2);
        zero.keys[0] = GuardianAddress::default();
        assert_eq!(
            Err(RegistryError::GuardianZeroAddress(0)),
            registry.rotate(zero, 1_000)
        );

        // Rejected rotations leave the registry untouched.
        assert_eq!(1, registry.history().len());
        assert_eq!(0, registry.current().expiration_time);
    }

    #[test]
    fn index_space_does_not_wrap() {
        let last = GuardianSet::new(u32::MAX, vec![GuardianAddress([1; 20])]);
        let mut registry = GuardianSetRegistry {
            sets: vec![last],
            grace_period: 0,
        };
        let wrapped = GuardianSet::new(0, vec![GuardianAddress([2; 20])]);
        let err = RegistryError::NonSequentialIndex {
            expected: 0,
            actual: 0,
        };

        assert_eq!(Err(err.clone()), registry.check_next(&wrapped));
        assert_eq!(Err(err), registry.rotate(wrapped, 1_000));
        assert_eq!(u32::MAX, registry.current_index());
        assert_eq!(0, registry.current().expiration_time);
    }

    #[test]
    fn rotation_with_grace_period() {
        let mut registry = GuardianSetRegistry::genesis(set(0, 1), 100).unwrap();
        registry.rotate(set(1, 2), 1_000).unwrap();

        assert_eq!(1, registry.current_index());
        assert_eq!(1_100, registry.get(0).unwrap().expiration_time);
        assert_eq!(1_000, registry.get(1).unwrap().creation_time);
        assert_eq!(0, registry.get(1).unwrap().expiration_time);

        assert!(registry.is_usable(0, 1_000));
        assert!(registry.is_usable(0, 1_099));
        assert!(!registry.is_usable(0, 1_100));
        assert!(registry.is_usable(1, u32::MAX));
        assert!(!registry.is_usable(2, 0));

        registry.rotate(set(2, 3), 2_000).unwrap();
        assert_eq!(1_100, registry.get(0).unwrap().expiration_time);
        assert_eq!(2_100, registry.get(1).unwrap().expiration_time);
        assert_eq!(
            1,
            registry
                .history()
                .iter()
                .filter(|s| s.expiration_time == 0)
                .count()
        );
    }

    #[test]
    fn rotation_without_grace_period() {
        let mut registry = GuardianSetRegistry::genesis(set(0, 1), 0).unwrap();
        registry.rotate(set(1, 2), 1_000).unwrap();

        assert_eq!(1_000, registry.get(0).unwrap().expiration_time);
        assert!(registry.is_usable(0, 999));
        assert!(!registry.is_usable(0, 1_000));
    }
}
