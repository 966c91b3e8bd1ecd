//! Errors raised by each stage of the receive and send paths.
//!
//! The kinds fall into a few families. Malformed input is always fatal to the call. Trust
//! failures reject a verification attempt but leave an assembly writable. Replay conditions
//! are expected under resubmission and callers treat them as a no-op success. Authority
//! violations indicate a bug or a hijack attempt. Governance scoping outcomes are routing
//! decisions rather than failures.

use std::io;

use thiserror::Error;

use crate::{assembly::AssemblyId, Address, AddressError, Chain};

/// Ergonomic early return for use within the verifier.
#[macro_export]
macro_rules! require {
    ($expr:expr, $err:expr) => {
        if !$expr {
            return Err($err.into());
        }
    };
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("amount does not fit in 64 bits")]
    AmountOverflow,
    #[error("unknown action {0}")]
    UnknownAction(u8),
    #[error("i/o error while decoding: {0:?}")]
    Io(io::ErrorKind),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::UnexpectedEnd,
            kind => DecodeError::Io(kind),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("guardian set {0} not found")]
    NotFound(u32),
    #[error("guardian set has no guardians")]
    ZeroGuardians,
    #[error("guardian set has too many guardians: {0}")]
    TooManyGuardians(usize),
    #[error("guardian at position {0} has the zero address")]
    GuardianZeroAddress(usize),
    #[error("guardian at position {0} duplicates an earlier address")]
    DuplicateGuardianAddress(usize),
    #[error("expected guardian set index {expected}, got {actual}")]
    NonSequentialIndex { expected: u32, actual: u32 },
}

/// Rejections from the quorum verifier and the checks made around it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("no signatures")]
    NoSignatures,
    #[error("signature at position {position} is not in strictly increasing guardian order")]
    UnsortedSignatures { position: usize },
    #[error("guardian index {index} out of range for a set of {set_size}")]
    GuardianIndexOutOfRange { index: u8, set_size: usize },
    #[error("signature from guardian {index} is malformed")]
    MalformedSignature { index: u8 },
    #[error("signature from guardian {index} recovers to a different address")]
    WrongSigner { index: u8 },
    #[error("{signatures} signatures do not meet quorum of {quorum}")]
    NoQuorum { signatures: usize, quorum: usize },
    #[error("unsupported VAA version {0}")]
    InvalidVersion(u8),
    #[error("VAA names guardian set {actual} but was checked against set {expected}")]
    GuardianSetMismatch { expected: u32, actual: u32 },
    #[error("guardian set {0} has expired")]
    GuardianSetExpired(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("declared size {size} outside of [{min}, {max}]")]
    InvalidCreatedAccountSize { size: usize, min: usize, max: usize },
    #[error("unknown encoded VAA {0}")]
    UnknownHandle(AssemblyId),
    #[error("caller is not the write authority of encoded VAA {0}")]
    WriteAuthorityMismatch(AssemblyId),
    #[error("encoded VAA {0} is already verified")]
    VaaAlreadyVerified(AssemblyId),
    #[error("encoded VAA {0} is not verified")]
    UnverifiedVaa(AssemblyId),
    #[error("write of {len} bytes at offset {offset} exceeds declared size {size}")]
    DataOverflow { offset: usize, len: usize, size: usize },
    #[error("empty write")]
    EmptyWrite,
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("VAA {} already posted", hex::encode(.0))]
    AlreadyPosted([u8; 32]),
    #[error("message {chain}/{address}/{sequence} already claimed")]
    AlreadyClaimed {
        chain: Chain,
        address: Address,
        sequence: u64,
    },
    #[error("no posted VAA with hash {}", hex::encode(.0))]
    NotFound([u8; 32]),
}

/// Outcomes of governance parsing. All but `Decode` are routing decisions: the VAA is not
/// meant for this handler and must be skipped without side effects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("not a governance VAA")]
    NotGovernance,
    #[error("governance VAA is for another module")]
    WrongModule,
    #[error("governance VAA targets chain {target}, this is chain {this}")]
    WrongChain { target: Chain, this: Chain },
    #[error("unknown governance action {0}")]
    UnknownAction(u8),
    #[error("malformed governance payload: {0}")]
    Decode(#[from] DecodeError),
}

impl GovernanceError {
    pub fn is_routing(&self) -> bool {
        !matches!(self, GovernanceError::Decode(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    #[error("governance must be signed by the current guardian set {current}, got {used}")]
    LatestGuardianSetRequired { used: u32, current: u32 },
    #[error("message fee {required} not covered by {paid}")]
    InsufficientMessageFee { paid: u64, required: u64 },
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("cannot transfer {requested}, only {available} collected")]
    InsufficientFees { requested: u64, available: u64 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("caller {caller} cannot publish as emitter {emitter}")]
    EmitterAuthorityMismatch { caller: Address, emitter: Address },
}

impl BridgeError {
    /// `AlreadyPosted` or `AlreadyClaimed`, wherever they surface.
    pub fn is_replay(&self) -> bool {
        matches!(
            self,
            BridgeError::Ledger(LedgerError::AlreadyPosted(_) | LedgerError::AlreadyClaimed { .. })
                | BridgeError::Assembly(AssemblyError::Ledger(
                    LedgerError::AlreadyPosted(_) | LedgerError::AlreadyClaimed { .. }
                ))
        )
    }

    /// Rejections that a caller recovers from by collecting more or different signatures.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::Verify(_)
                | BridgeError::Assembly(AssemblyError::Verify(_))
                | BridgeError::LatestGuardianSetRequired { .. }
        )
    }

    pub fn is_authority_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::Assembly(AssemblyError::WriteAuthorityMismatch(_))
                | BridgeError::EmitterAuthorityMismatch { .. }
        )
    }
}
