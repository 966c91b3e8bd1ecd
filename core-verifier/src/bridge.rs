//! The core bridge state machine.
//!
//! [`CoreBridge`] owns every component and exposes the operations a core bridge contract
//! offers its host: staged and one-shot receipt of VAAs, execution of core governance, and
//! publication of outgoing messages.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    assembly::{AssemblyId, AttestationAssembly, EncodedVaa},
    clock::Clock,
    codec::{Digest, WireEncode},
    config::BridgeConfig,
    error::{AssemblyError, BridgeError, GovernanceError, VerifyError},
    governance::{CoreDecree, GovernanceDispatcher},
    guardian_set::GuardianSet,
    ledger::{ClaimKey, PostedVaa, ReplayLedger},
    registry::GuardianSetRegistry,
    sequencer::EmitterSequencer,
    vaa::{Body, Vaa},
    verifier::{QuorumVerifier, RecoverSigner, Secp256k1Recovery},
    Address, Chain, VAA_VERSION,
};

/// Collected fees released by governance, for the host to pay out.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTransfer {
    pub recipient: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceOutcome {
    Executed(CoreDecree),
    /// A `TransferFees` decree was executed and the fees debited.
    TransferFees(FeeTransfer),
    /// The VAA is not core governance for this chain. Nothing changed.
    Skipped(GovernanceError),
    AlreadyExecuted,
}

/// An outgoing message, as the guardians will observe and sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub body: Body,
    pub encoded: Vec<u8>,
}

#[derive(Debug)]
pub struct CoreBridge<C, R = Secp256k1Recovery> {
    config: BridgeConfig,
    clock: C,
    registry: GuardianSetRegistry,
    verifier: QuorumVerifier<R>,
    assembly: AttestationAssembly,
    ledger: ReplayLedger,
    dispatcher: GovernanceDispatcher,
    sequencer: EmitterSequencer,
    message_fee: u64,
    collected_fees: u64,
    pending_upgrade: Option<Address>,
}

impl<C: Clock> CoreBridge<C> {
    pub fn new(config: BridgeConfig, genesis: GuardianSet, clock: C) -> Result<Self, BridgeError> {
        Self::with_verifier(config, genesis, clock, QuorumVerifier::new())
    }
}

/// The genesis or a rotated set, as long as it still verifies at `now`.
fn usable_set(
    registry: &GuardianSetRegistry,
    index: u32,
    now: u32,
) -> Result<&GuardianSet, BridgeError> {
    let set = registry.get(index)?;
    require!(
        registry.is_usable(index, now),
        VerifyError::GuardianSetExpired(index)
    );
    Ok(set)
}

impl<C: Clock, R: RecoverSigner> CoreBridge<C, R> {
    pub fn with_verifier(
        config: BridgeConfig,
        genesis: GuardianSet,
        clock: C,
        verifier: QuorumVerifier<R>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let registry = GuardianSetRegistry::genesis(genesis, config.guardian_set_ttl_seconds)?;

        info!(
            chain_id = %config.chain_id,
            num_guardians = registry.current().num_guardians(),
            "core bridge initialized"
        );

        Ok(Self {
            registry,
            verifier,
            assembly: AttestationAssembly::new(config.max_payload_size),
            ledger: ReplayLedger::new(),
            dispatcher: GovernanceDispatcher::new(config.governance_emitter(), config.chain_id),
            sequencer: EmitterSequencer::new(),
            message_fee: config.message_fee,
            collected_fees: 0,
            pending_upgrade: None,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn init_encoded_vaa(
        &mut self,
        authority: Address,
        declared_size: usize,
    ) -> Result<AssemblyId, BridgeError> {
        Ok(self.assembly.create(authority, declared_size)?)
    }

    pub fn write_encoded_vaa(
        &mut self,
        id: AssemblyId,
        authority: &Address,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BridgeError> {
        Ok(self.assembly.write(id, authority, offset, data)?)
    }

    /// Verifies a staged VAA against the guardian set its header names, which must still be
    /// usable.
    pub fn verify_encoded_vaa(
        &mut self,
        id: AssemblyId,
        authority: &Address,
    ) -> Result<(), BridgeError> {
        require!(
            self.assembly.get(id)?.write_authority == *authority,
            AssemblyError::WriteAuthorityMismatch(id)
        );

        let index = self.assembly.guardian_set_index(id)?;
        let guardian_set = usable_set(&self.registry, index, self.clock.now())
            .map_err(|e| rejected(id, e))?;

        self.assembly
            .verify(id, authority, guardian_set, &self.verifier)
            .map_err(|e| rejected(id, e.into()))
    }

    pub fn close_encoded_vaa(
        &mut self,
        id: AssemblyId,
        authority: &Address,
    ) -> Result<(), BridgeError> {
        Ok(self.assembly.discard(id, authority)?)
    }

    /// Posts a verified staged VAA, consuming its handle.
    pub fn post_vaa(
        &mut self,
        id: AssemblyId,
        authority: &Address,
    ) -> Result<PostedVaa, BridgeError> {
        let (_, posted) = self
            .assembly
            .promote_to_posted(id, authority, &mut self.ledger)?;
        Ok(posted)
    }

    pub fn encoded_vaa(&self, id: AssemblyId) -> Result<&EncodedVaa, BridgeError> {
        Ok(self.assembly.get(id)?)
    }

    /// Verifies a complete signed VAA in one step.
    pub fn parse_and_verify_vaa(&self, bytes: &[u8]) -> Result<(Vaa, Digest), BridgeError> {
        let (vaa, digest) = Vaa::parse(bytes)?;

        require!(
            vaa.header.version == VAA_VERSION,
            VerifyError::InvalidVersion(vaa.header.version)
        );
        require!(
            vaa.body.payload.len() <= self.config.max_payload_size,
            BridgeError::PayloadTooLarge {
                len: vaa.body.payload.len(),
                max: self.config.max_payload_size,
            }
        );

        let index = vaa.header.guardian_set_index;
        let guardian_set = usable_set(&self.registry, index, self.clock.now())?;
        if let Err(e) =
            self.verifier
                .verify(&digest.secp256k_hash, &vaa.header.signatures, guardian_set)
        {
            warn!(guardian_set_index = index, error = %e, "VAA rejected");
            return Err(e.into());
        }

        Ok((vaa, digest))
    }

    /// Verifies and posts a complete signed VAA, returning its body hash.
    pub fn submit_vaa(&mut self, bytes: &[u8]) -> Result<[u8; 32], BridgeError> {
        let (vaa, _) = self.parse_and_verify_vaa(bytes)?;
        Ok(self
            .ledger
            .commit_posted(vaa.header.guardian_set_index, vaa.body)?)
    }

    /// Executes the core governance action posted under `body_hash`.
    ///
    /// Every check that can fail runs before the action is claimed, so a rejected action
    /// leaves no trace and can be retried.
    pub fn execute_governance(
        &mut self,
        body_hash: &[u8; 32],
    ) -> Result<GovernanceOutcome, BridgeError> {
        let posted = self.ledger.lookup_posted(body_hash)?;

        let (action, decree) = match self.dispatcher.parse_decree::<CoreDecree>(posted) {
            Ok(parsed) => parsed,
            Err(e) if e.is_routing() => {
                debug!(hash = %hex::encode(body_hash), reason = %e, "governance VAA skipped");
                return Ok(GovernanceOutcome::Skipped(e));
            }
            Err(e) => return Err(e.into()),
        };

        if self.ledger.is_claimed(&action.claim) {
            debug!(hash = %hex::encode(body_hash), "governance action already executed");
            return Ok(GovernanceOutcome::AlreadyExecuted);
        }

        let current = self.registry.current_index();
        require!(
            posted.guardian_set_index == current,
            BridgeError::LatestGuardianSetRequired {
                used: posted.guardian_set_index,
                current,
            }
        );

        match &decree {
            CoreDecree::GuardianSetUpgrade(upgrade) => {
                self.registry.check_next(&upgrade.clone().into_guardian_set())?;
            }
            CoreDecree::TransferFees { amount, .. } => require!(
                *amount <= self.collected_fees,
                BridgeError::InsufficientFees {
                    requested: *amount,
                    available: self.collected_fees,
                }
            ),
            CoreDecree::ContractUpgrade { .. } | CoreDecree::SetMessageFee { .. } => {}
        }

        let ClaimKey {
            emitter_chain,
            emitter_address,
            sequence,
        } = action.claim;
        self.ledger.claim(emitter_chain, emitter_address, sequence)?;

        info!(
            action = ?decree.action(),
            sequence,
            "executing core governance"
        );
        self.apply(decree)
    }

    fn apply(&mut self, decree: CoreDecree) -> Result<GovernanceOutcome, BridgeError> {
        match decree {
            CoreDecree::GuardianSetUpgrade(upgrade) => {
                let now = self.clock.now();
                self.registry
                    .rotate(upgrade.clone().into_guardian_set(), now)?;
                Ok(GovernanceOutcome::Executed(CoreDecree::GuardianSetUpgrade(
                    upgrade,
                )))
            }
            CoreDecree::SetMessageFee { fee } => {
                info!(old = self.message_fee, new = fee, "message fee updated");
                self.message_fee = fee;
                Ok(GovernanceOutcome::Executed(decree))
            }
            CoreDecree::TransferFees { amount, recipient } => {
                self.collected_fees -= amount;
                info!(amount, %recipient, remaining = self.collected_fees, "fees released");
                Ok(GovernanceOutcome::TransferFees(FeeTransfer { recipient, amount }))
            }
            CoreDecree::ContractUpgrade { new_contract } => {
                info!(%new_contract, "contract upgrade authorized");
                self.pending_upgrade = Some(new_contract);
                Ok(GovernanceOutcome::Executed(decree))
            }
        }
    }

    /// Publishes a message from `emitter`, assigning it the emitter's next sequence. Only the
    /// emitter itself may advance its sequence, so `caller` must be `emitter`.
    pub fn post_message(
        &mut self,
        caller: &Address,
        emitter: Address,
        nonce: u32,
        payload: Vec<u8>,
        consistency_level: u8,
        fee_paid: u64,
    ) -> Result<PublishedMessage, BridgeError> {
        if *caller != emitter {
            warn!(%caller, %emitter, "message rejected: caller is not the emitter");
            return Err(BridgeError::EmitterAuthorityMismatch {
                caller: *caller,
                emitter,
            });
        }
        require!(
            fee_paid >= self.message_fee,
            BridgeError::InsufficientMessageFee {
                paid: fee_paid,
                required: self.message_fee,
            }
        );
        require!(
            payload.len() <= self.config.max_payload_size,
            BridgeError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload_size,
            }
        );

        self.collected_fees = self.collected_fees.saturating_add(fee_paid);
        let sequence = self.sequencer.next(&emitter);

        let body = Body {
            timestamp: self.clock.now(),
            nonce,
            emitter_chain: self.config.chain_id,
            emitter_address: emitter,
            sequence,
            consistency_level,
            payload,
        };
        let encoded = body.to_vec();
        info!(%emitter, sequence, len = body.payload.len(), "message published");

        Ok(PublishedMessage { body, encoded })
    }

    pub fn next_sequence(&self, emitter: &Address) -> u64 {
        self.sequencer.peek(emitter)
    }

    pub fn guardian_set(&self, index: u32) -> Result<&GuardianSet, BridgeError> {
        Ok(self.registry.get(index)?)
    }

    pub fn current_guardian_set(&self) -> &GuardianSet {
        self.registry.current()
    }

    pub fn posted(&self, body_hash: &[u8; 32]) -> Result<&PostedVaa, BridgeError> {
        Ok(self.ledger.lookup_posted(body_hash)?)
    }

    pub fn is_claimed(
        &self,
        emitter_chain: Chain,
        emitter_address: Address,
        sequence: u64,
    ) -> bool {
        self.ledger.is_claimed(&ClaimKey {
            emitter_chain,
            emitter_address,
            sequence,
        })
    }

    pub fn message_fee(&self) -> u64 {
        self.message_fee
    }

    pub fn collected_fees(&self) -> u64 {
        self.collected_fees
    }

    pub fn pending_upgrade(&self) -> Option<Address> {
        self.pending_upgrade
    }
}

fn rejected(id: AssemblyId, e: BridgeError) -> BridgeError {
    if e.is_trust_failure() {
        warn!(%id, error = %e, "encoded VAA rejected");
    }
    e
}
