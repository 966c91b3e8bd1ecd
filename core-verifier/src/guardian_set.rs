use std::{
    collections::HashSet,
    io::{self, Read, Write},
};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, WireDecode, WireEncode},
    error::{DecodeError, RegistryError},
    GuardianAddress,
};

/// Signatures reference guardians by a `u8` position.
pub const MAX_GUARDIANS: usize = 255;

/// Minimum number of signatures needed to accept a VAA signed by `num_guardians` guardians.
pub fn quorum(num_guardians: usize) -> usize {
    num_guardians * 2 / 3 + 1
}

/// A `GuardianSet` is a versioned set of keys that can sign Wormhole messages. The position of
/// each key is the index signatures use to reference it.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct GuardianSet {
    pub index: u32,
    pub keys: Vec<GuardianAddress>,
    pub creation_time: u32,
    /// Zero while this set is current; stamped when it is superseded.
    pub expiration_time: u32,
}

impl GuardianSet {
    pub fn new(index: u32, keys: Vec<GuardianAddress>) -> Self {
        Self {
            index,
            keys,
            creation_time: 0,
            expiration_time: 0,
        }
    }

    pub fn num_guardians(&self) -> usize {
        self.keys.len()
    }

    pub fn quorum(&self) -> usize {
        quorum(self.keys.len())
    }

    /// Checks every rule a set must satisfy before it is inserted into the registry.
    pub fn validate(&self) -> Result<(), RegistryError> {
        require!(!self.keys.is_empty(), RegistryError::ZeroGuardians);
        require!(
            self.keys.len() <= MAX_GUARDIANS,
            RegistryError::TooManyGuardians(self.keys.len())
        );

        let mut seen = HashSet::with_capacity(self.keys.len());
        for (position, key) in self.keys.iter().enumerate() {
            require!(!key.is_zero(), RegistryError::GuardianZeroAddress(position));
            require!(
                seen.insert(key),
                RegistryError::DuplicateGuardianAddress(position)
            );
        }

        Ok(())
    }
}

impl WireEncode for GuardianSet {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.index.encode(writer)?;
        codec::encode_list(&self.keys, writer)?;
        self.creation_time.encode(writer)?;
        self.expiration_time.encode(writer)
    }
}

impl WireDecode for GuardianSet {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            index: WireDecode::decode_reader(reader)?,
            keys: codec::decode_list(reader)?,
            creation_time: WireDecode::decode_reader(reader)?,
            expiration_time: WireDecode::decode_reader(reader)?,
        })
    }
}
