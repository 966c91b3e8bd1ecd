//! Host supplied configuration for [`CoreBridge`](crate::CoreBridge).

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::BridgeError, governance::GovernanceEmitter, Address, Chain, GOVERNANCE_EMITTER,
    MAX_MESSAGE_PAYLOAD_SIZE,
};

/// One day.
pub const DEFAULT_GUARDIAN_SET_TTL_SECONDS: u32 = 86_400;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// This chain's own id. Governance targeting any other chain is skipped.
    #[cfg_attr(feature = "schemars", schemars(with = "u16"))]
    pub chain_id: Chain,
    #[cfg_attr(feature = "schemars", schemars(with = "u16"))]
    pub governance_chain: Chain,
    #[cfg_attr(feature = "schemars", schemars(with = "String"))]
    pub governance_emitter: Address,
    /// How long a retired guardian set keeps verifying VAAs. Zero retires it immediately.
    pub guardian_set_ttl_seconds: u32,
    pub message_fee: u64,
    pub max_payload_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chain_id: Chain::Any,
            governance_chain: Chain::Solana,
            governance_emitter: GOVERNANCE_EMITTER,
            guardian_set_ttl_seconds: DEFAULT_GUARDIAN_SET_TTL_SECONDS,
            message_fee: 0,
            max_payload_size: MAX_MESSAGE_PAYLOAD_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("failed to parse bridge configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        require!(
            self.chain_id != Chain::Any,
            BridgeError::InvalidConfig("chain_id must be set")
        );
        require!(
            self.max_payload_size > 0,
            BridgeError::InvalidConfig("max_payload_size must be positive")
        );
        require!(
            !self.governance_emitter.is_zero(),
            BridgeError::InvalidConfig("governance_emitter must not be the zero address")
        );
        Ok(())
    }

    pub fn governance_emitter(&self) -> GovernanceEmitter {
        GovernanceEmitter {
            chain: self.governance_chain,
            address: self.governance_emitter,
        }
    }
}
