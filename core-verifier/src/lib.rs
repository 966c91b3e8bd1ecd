//! The verification and custody core of the Wormhole message bridge.
//!
//! Guardians attest to events on one chain by co-signing a VAA. This crate is the receiving
//! side of that flow, usable by any host ledger. It includes:
//!
//! - A wire codec for VAAs, guardian sets and governance payloads.
//! - A versioned guardian set registry with rotation and expiry.
//! - The quorum verifier every attestation passes through.
//! - Staged, single-writer assembly of VAAs too large for one step.
//! - Replay protection for posted VAAs and consumed source events.
//! - Governance dispatch for privileged actions, and the per-emitter sequencer used when
//!   publishing new messages.
//!
//! [`CoreBridge`] wires these together into the state machine a core bridge contract runs.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::Digest as Sha3Digest;

#[macro_use]
pub mod error;

pub mod assembly;
pub mod bridge;
pub mod clock;
pub mod codec;
pub mod config;
pub mod governance;
pub mod guardian_set;
pub mod ledger;
pub mod registry;
pub mod sequencer;
pub mod vaa;
pub mod verifier;

pub use wormhole_verifier_chains::{Chain, InvalidChainError};

pub use {
    bridge::CoreBridge,
    config::BridgeConfig,
    error::BridgeError,
    guardian_set::GuardianSet,
    vaa::{Body, Header, Signature, Vaa},
};

/// The address governance VAAs are emitted from on the governance chain. The value is
/// "0000000000000000000000000000000000000000000000000000000000000004".
pub const GOVERNANCE_EMITTER: Address = Address([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
]);

/// Module identifier for core bridge governance: "Core", left padded to 32 bytes.
pub const CORE_MODULE: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, b'C', b'o', b'r', b'e',
];

/// Only version 1 VAAs are accepted.
pub const VAA_VERSION: u8 = 1;

/// Default upper bound on message payloads, in both directions.
pub const MAX_MESSAGE_PAYLOAD_SIZE: usize = 30 * 1024;

/// Guardian public keys are identified by the Ethereum-style address derived from them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardianAddress(pub [u8; 20]);

impl GuardianAddress {
    /// Derives the address of an uncompressed secp256k1 public key, given without its `0x04`
    /// prefix: the last 20 bytes of its keccak256 hash.
    pub fn from_public_key(key: &[u8; 64]) -> Self {
        let hash: [u8; 32] = sha3::Keccak256::digest(key).into();
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Self(address)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl fmt::Display for GuardianAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for GuardianAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut address = [0u8; 20];
        hex::decode_to_slice(digits, &mut address)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(address))
    }
}

/// Wormhole specifies addresses as 32 bytes. Addresses that are shorter, for example 20 byte
/// Ethereum addresses, are left zero padded to 32.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 32]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("native address of {0} bytes does not fit in 32 bytes")]
    TooLong(usize),
    #[error("invalid hex address: {0}")]
    InvalidHex(String),
}

impl Address {
    /// Normalizes a chain-native address to the canonical 32 byte form.
    pub fn left_pad(native: &[u8]) -> Result<Self, AddressError> {
        require!(native.len() <= 32, AddressError::TooLong(native.len()));

        let mut address = [0u8; 32];
        address[32 - native.len()..].copy_from_slice(native);
        Ok(Self(address))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }

        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Accepts hex with or without a `0x` prefix. Short addresses are left padded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::left_pad(&bytes)
    }
}

/// Addresses are serialized as hex strings.
macro_rules! impl_hex_serde {
    ($type: ident) => {
        impl Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

impl_hex_serde!(Address);
impl_hex_serde!(GuardianAddress);
