//! Replay protection.
//!
//! Two independent append-only maps: posted VAAs keyed by body digest, which guard the message
//! itself, and claims keyed by emitter and sequence, which guard the handler that acts on it.
//! Neither map supports update or removal.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::LedgerError, vaa::Body, Address, Chain};

/// The canonical record of a verified VAA.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostedVaa {
    pub guardian_set_index: u32,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl PostedVaa {
    pub fn new(guardian_set_index: u32, body: Body) -> Self {
        Self {
            guardian_set_index,
            timestamp: body.timestamp,
            nonce: body.nonce,
            emitter_chain: body.emitter_chain,
            emitter_address: body.emitter_address,
            sequence: body.sequence,
            consistency_level: body.consistency_level,
            payload: body.payload,
        }
    }

    pub fn body(&self) -> Body {
        Body {
            timestamp: self.timestamp,
            nonce: self.nonce,
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
            consistency_level: self.consistency_level,
            payload: self.payload.clone(),
        }
    }

    pub fn claim_key(&self) -> ClaimKey {
        ClaimKey {
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
        }
    }
}

/// Identifies a source event: the emitter and its sequence number.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
}

#[derive(Debug, Default, Clone)]
pub struct ReplayLedger {
    posted: HashMap<[u8; 32], PostedVaa>,
    claims: HashSet<ClaimKey>,
}

impl ReplayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a verified body under its digest. Fails with `AlreadyPosted` if an identical body
    /// was posted before, leaving the existing record untouched.
    pub fn commit_posted(
        &mut self,
        guardian_set_index: u32,
        body: Body,
    ) -> Result<[u8; 32], LedgerError> {
        let hash = body.digest().secp256k_hash;
        require!(!self.is_posted(&hash), {
            debug!(hash = %hex::encode(hash), "VAA already posted");
            LedgerError::AlreadyPosted(hash)
        });

        debug!(
            hash = %hex::encode(hash),
            emitter_chain = %body.emitter_chain,
            sequence = body.sequence,
            "VAA posted"
        );
        let _ = self
            .posted
            .insert(hash, PostedVaa::new(guardian_set_index, body));

        Ok(hash)
    }

    /// Marks a source event as consumed. Fails with `AlreadyClaimed` on every later attempt.
    pub fn claim(
        &mut self,
        emitter_chain: Chain,
        emitter_address: Address,
        sequence: u64,
    ) -> Result<(), LedgerError> {
        let key = ClaimKey {
            emitter_chain,
            emitter_address,
            sequence,
        };
        require!(self.claims.insert(key), {
            debug!(%emitter_chain, %emitter_address, sequence, "message already claimed");
            LedgerError::AlreadyClaimed {
                chain: emitter_chain,
                address: emitter_address,
                sequence,
            }
        });

        debug!(%emitter_chain, %emitter_address, sequence, "message claimed");
        Ok(())
    }

    pub fn lookup_posted(&self, hash: &[u8; 32]) -> Result<&PostedVaa, LedgerError> {
        self.posted.get(hash).ok_or(LedgerError::NotFound(*hash))
    }

    pub fn is_posted(&self, hash: &[u8; 32]) -> bool {
        self.posted.contains_key(hash)
    }

    pub fn is_claimed(&self, key: &ClaimKey) -> bool {
        self.claims.contains(key)
    }
}
