//! Governance dispatch.
//!
//! Governance VAAs are ordinary posted VAAs from one privileged emitter whose payload starts
//! with a fixed header:
//!
//! ```markdown
//! module:32B | action:u8 | target_chain:u16 | action_payload:rest
//! ```
//!
//! [`GovernanceDispatcher::parse`] decides whether a posted VAA is a governance action for a
//! given module on this chain. Handlers that then mutate state must claim the VAA's source event
//! in the replay ledger first, and treat an existing claim as an already executed action.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{WireDecode, WireEncode},
    error::{DecodeError, GovernanceError},
    ledger::{ClaimKey, PostedVaa},
    Address, Chain, GOVERNANCE_EMITTER,
};

pub mod core;

pub use self::core::{CoreAction, CoreDecree, GuardianSetUpgrade};

/// Module id, action and target chain: the bytes ahead of every action payload.
pub const GOVERNANCE_HEADER_LEN: usize = 35;

/// The emitter trusted to issue governance actions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GovernanceEmitter {
    pub chain: Chain,
    pub address: Address,
}

impl Default for GovernanceEmitter {
    fn default() -> Self {
        Self {
            chain: Chain::Solana,
            address: GOVERNANCE_EMITTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GovernanceHeader {
    pub module: [u8; 32],
    pub action: u8,
    pub target_chain: Chain,
}

impl WireEncode for GovernanceHeader {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.module.encode(writer)?;
        self.action.encode(writer)?;
        self.target_chain.encode(writer)
    }
}

impl WireDecode for GovernanceHeader {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            module: WireDecode::decode_reader(reader)?,
            action: WireDecode::decode_reader(reader)?,
            target_chain: WireDecode::decode_reader(reader)?,
        })
    }
}

/// A governance action addressed to this chain, ready for its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceAction {
    pub header: GovernanceHeader,
    pub payload: Vec<u8>,
    /// The source event a handler must claim before acting.
    pub claim: ClaimKey,
}

/// A family of governance actions sharing one module id.
pub trait GovernanceModule: Sized {
    const MODULE: [u8; 32];

    fn recognizes(action: u8) -> bool;

    /// Decodes the payload of a recognized action. The payload must be consumed exactly.
    fn decode(action: u8, payload: &[u8]) -> Result<Self, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernanceDispatcher {
    emitter: GovernanceEmitter,
    chain_id: Chain,
}

impl GovernanceDispatcher {
    pub fn new(emitter: GovernanceEmitter, chain_id: Chain) -> Self {
        Self { emitter, chain_id }
    }

    pub fn emitter(&self) -> &GovernanceEmitter {
        &self.emitter
    }

    pub fn chain_id(&self) -> Chain {
        self.chain_id
    }

    pub fn is_governance(&self, posted: &PostedVaa) -> bool {
        posted.emitter_chain == self.emitter.chain
            && posted.emitter_address == self.emitter.address
    }

    /// Validates, in order: the emitter, the header framing, the module, the target chain and
    /// finally the action code. Each failure is a distinct outcome.
    pub fn parse(
        &self,
        posted: &PostedVaa,
        module: &[u8; 32],
        recognizes: impl Fn(u8) -> bool,
    ) -> Result<GovernanceAction, GovernanceError> {
        require!(self.is_governance(posted), GovernanceError::NotGovernance);

        let mut buf = posted.payload.as_slice();
        let header = GovernanceHeader::decode(&mut buf)?;

        require!(header.module == *module, GovernanceError::WrongModule);
        require!(
            header.target_chain == Chain::Any || header.target_chain == self.chain_id,
            GovernanceError::WrongChain {
                target: header.target_chain,
                this: self.chain_id,
            }
        );
        require!(
            recognizes(header.action),
            GovernanceError::UnknownAction(header.action)
        );

        Ok(GovernanceAction {
            header,
            payload: buf.to_vec(),
            claim: posted.claim_key(),
        })
    }

    /// Parses a governance action for module `M` and decodes its payload.
    pub fn parse_decree<M: GovernanceModule>(
        &self,
        posted: &PostedVaa,
    ) -> Result<(GovernanceAction, M), GovernanceError> {
        let action = self.parse(posted, &M::MODULE, M::recognizes)?;
        let decree = M::decode(action.header.action, &action.payload)?;
        Ok((action, decree))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{vaa::Body, CORE_MODULE};

    fn posted(emitter_chain: Chain, emitter_address: Address, payload: Vec<u8>) -> PostedVaa {
        PostedVaa::new(
            0,
            Body {
                timestamp: 1,
                nonce: 0,
                emitter_chain,
                emitter_address,
                sequence: 12,
                consistency_level: 0,
                payload,
            },
        )
    }

    fn governance_payload(module: [u8; 32], action: u8, target: Chain, rest: &[u8]) -> Vec<u8> {
        let mut payload = GovernanceHeader {
            module,
            action,
            target_chain: target,
        }
        .to_vec();
        payload.extend_from_slice(rest);
        payload
    }

    fn dispatcher() -> GovernanceDispatcher {
        GovernanceDispatcher::new(GovernanceEmitter::default(), Chain::Solana)
    }

    fn known(action: u8) -> bool {
        (1..=4).contains(&action)
    }

    #[test]
    fn accepts_targeted_and_global_actions() {
        for target in [Chain::Solana, Chain::Any] {
            let payload = governance_payload(CORE_MODULE, 3, target, &[0xab; 32]);
            let vaa = posted(Chain::Solana, GOVERNANCE_EMITTER, payload);

            let action = dispatcher().parse(&vaa, &CORE_MODULE, known).unwrap();
            assert_eq!(3, action.header.action);
            assert_eq!(target, action.header.target_chain);
            assert_eq!(vec![0xab; 32], action.payload);
            assert_eq!(vaa.claim_key(), action.claim);
        }
    }

    #[test]
    fn rejection_order() {
        let d = dispatcher();
        let good = governance_payload(CORE_MODULE, 2, Chain::Solana, &[]);

        // Emitter is checked before anything in the payload.
        assert_eq!(
            Err(GovernanceError::NotGovernance),
            d.parse(&posted(Chain::Ethereum, GOVERNANCE_EMITTER, vec![]), &CORE_MODULE, known)
        );
        assert_eq!(
            Err(GovernanceError::NotGovernance),
            d.parse(&posted(Chain::Solana, Address([5; 32]), good.clone()), &CORE_MODULE, known)
        );

        assert_eq!(
            Err(GovernanceError::Decode(DecodeError::UnexpectedEnd)),
            d.parse(
                &posted(Chain::Solana, GOVERNANCE_EMITTER, good[..34].to_vec()),
                &CORE_MODULE,
                known
            )
        );

        // Wrong module wins over wrong chain and unknown action.
        let other_module = governance_payload([9; 32], 99, Chain::Unknown(69), &[]);
        assert_eq!(
            Err(GovernanceError::WrongModule),
            d.parse(&posted(Chain::Solana, GOVERNANCE_EMITTER, other_module), &CORE_MODULE, known)
        );

        let wrong_chain = governance_payload(CORE_MODULE, 99, Chain::Unknown(69), &[]);
        assert_eq!(
            Err(GovernanceError::WrongChain {
                target: Chain::Unknown(69),
                this: Chain::Solana
            }),
            d.parse(&posted(Chain::Solana, GOVERNANCE_EMITTER, wrong_chain), &CORE_MODULE, known)
        );

        let unknown = governance_payload(CORE_MODULE, 99, Chain::Any, &[]);
        assert_eq!(
            Err(GovernanceError::UnknownAction(99)),
            d.parse(&posted(Chain::Solana, GOVERNANCE_EMITTER, unknown), &CORE_MODULE, known)
        );
    }

    #[test]
    fn injected_emitter_identity() {
        let emitter = GovernanceEmitter {
            chain: Chain::Ethereum,
            address: Address([0x77; 32]),
        };
        let d = GovernanceDispatcher::new(emitter, Chain::Ethereum);
        let payload = governance_payload(CORE_MODULE, 1, Chain::Ethereum, &[]);

        assert!(d
            .parse(&posted(Chain::Ethereum, Address([0x77; 32]), payload.clone()), &CORE_MODULE, known)
            .is_ok());
        assert_eq!(
            Err(GovernanceError::NotGovernance),
            d.parse(&posted(Chain::Solana, GOVERNANCE_EMITTER, payload), &CORE_MODULE, known)
        );
    }
}
