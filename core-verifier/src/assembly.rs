//! Staged assembly of signed VAAs.
//!
//! A VAA with a full quorum of signatures can be too large to submit and verify in one step.
//! An encoded VAA buffer is created at a fixed size, written in chunks by its write authority,
//! verified once, then either promoted to a posted VAA or discarded. Every mutating call must
//! come from the authority that created the buffer.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    codec::WireDecode,
    error::{AssemblyError, VerifyError},
    guardian_set::{GuardianSet, MAX_GUARDIANS},
    ledger::{PostedVaa, ReplayLedger},
    vaa::{Body, Vaa, BODY_HEADER_LEN, HEADER_LEN, SIGNATURE_LEN},
    verifier::{QuorumVerifier, RecoverSigner},
    Address, VAA_VERSION,
};

/// Handle to an encoded VAA buffer. Handles are never reused.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblyId(pub(crate) u64);

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Writing,
    /// Quorum was met by the guardian set with this index.
    Verified { guardian_set_index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVaa {
    pub status: ProcessingStatus,
    pub write_authority: Address,
    pub buf: Vec<u8>,
}

impl EncodedVaa {
    fn require_authority(&self, id: AssemblyId, authority: &Address) -> Result<(), AssemblyError> {
        require!(
            self.write_authority == *authority,
            AssemblyError::WriteAuthorityMismatch(id)
        );
        Ok(())
    }
}

/// Smallest buffer that can hold a header, a body header and one payload byte.
pub const MIN_ENCODED_SIZE: usize = HEADER_LEN + BODY_HEADER_LEN + 1;

/// Largest buffer accepted for a given payload bound: a full signature list, a body header and
/// the largest payload.
pub fn max_encoded_size(max_payload_size: usize) -> usize {
    HEADER_LEN + MAX_GUARDIANS * SIGNATURE_LEN + BODY_HEADER_LEN + max_payload_size
}

#[derive(Debug, Clone)]
pub struct AttestationAssembly {
    next_id: u64,
    max_payload_size: usize,
    buffers: HashMap<AssemblyId, EncodedVaa>,
}

impl AttestationAssembly {
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            next_id: 0,
            max_payload_size,
            buffers: HashMap::new(),
        }
    }

    /// Allocates a zero filled buffer of `declared_size` bytes owned by `authority`.
    pub fn create(
        &mut self,
        authority: Address,
        declared_size: usize,
    ) -> Result<AssemblyId, AssemblyError> {
        let max = max_encoded_size(self.max_payload_size);
        require!(
            (MIN_ENCODED_SIZE..=max).contains(&declared_size),
            AssemblyError::InvalidCreatedAccountSize {
                size: declared_size,
                min: MIN_ENCODED_SIZE,
                max,
            }
        );

        let id = AssemblyId(self.next_id);
        self.next_id += 1;

        let _ = self.buffers.insert(
            id,
            EncodedVaa {
                status: ProcessingStatus::Writing,
                write_authority: authority,
                buf: vec![0; declared_size],
            },
        );
        debug!(%id, %authority, declared_size, "encoded VAA created");

        Ok(id)
    }

    pub fn get(&self, id: AssemblyId) -> Result<&EncodedVaa, AssemblyError> {
        self.buffers.get(&id).ok_or(AssemblyError::UnknownHandle(id))
    }

    fn writable(
        &mut self,
        id: AssemblyId,
        authority: &Address,
    ) -> Result<&mut EncodedVaa, AssemblyError> {
        let encoded = self
            .buffers
            .get_mut(&id)
            .ok_or(AssemblyError::UnknownHandle(id))?;
        encoded.require_authority(id, authority)?;
        require!(
            encoded.status == ProcessingStatus::Writing,
            AssemblyError::VaaAlreadyVerified(id)
        );
        Ok(encoded)
    }

    /// Copies `data` into the buffer at `offset`.
    pub fn write(
        &mut self,
        id: AssemblyId,
        authority: &Address,
        offset: usize,
        data: &[u8],
    ) -> Result<(), AssemblyError> {
        let encoded = self.writable(id, authority)?;
        require!(!data.is_empty(), AssemblyError::EmptyWrite);

        let size = encoded.buf.len();
        let end = offset.checked_add(data.len()).filter(|end| *end <= size);
        let end = end.ok_or(AssemblyError::DataOverflow {
            offset,
            len: data.len(),
            size,
        })?;

        encoded.buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// The guardian set index named by the buffer's header, as written so far.
    pub fn guardian_set_index(&self, id: AssemblyId) -> Result<u32, AssemblyError> {
        let encoded = self.get(id)?;
        let (header, _) = Vaa::split(&encoded.buf)?;
        Ok(header.guardian_set_index)
    }

    /// Verifies the buffer against `guardian_set`. On success the buffer becomes `Verified`;
    /// on any failure it stays `Writing` and can be rewritten and verified again.
    pub fn verify<R: RecoverSigner>(
        &mut self,
        id: AssemblyId,
        authority: &Address,
        guardian_set: &GuardianSet,
        verifier: &QuorumVerifier<R>,
    ) -> Result<(), AssemblyError> {
        let max_payload_size = self.max_payload_size;
        let encoded = self.writable(id, authority)?;

        let (header, body) = Vaa::split(&encoded.buf)?;
        let payload_len = body.len() - BODY_HEADER_LEN;
        require!(
            payload_len <= max_payload_size,
            AssemblyError::PayloadTooLarge {
                len: payload_len,
                max: max_payload_size,
            }
        );
        require!(
            header.version == VAA_VERSION,
            VerifyError::InvalidVersion(header.version)
        );
        require!(
            header.guardian_set_index == guardian_set.index,
            VerifyError::GuardianSetMismatch {
                expected: guardian_set.index,
                actual: header.guardian_set_index,
            }
        );

        let digest = crate::codec::digest(body);
        let signatures =
            verifier.verify(&digest.secp256k_hash, &header.signatures, guardian_set)?;

        encoded.status = ProcessingStatus::Verified {
            guardian_set_index: guardian_set.index,
        };
        info!(
            %id,
            guardian_set_index = guardian_set.index,
            signatures,
            hash = %hex::encode(digest.secp256k_hash),
            "encoded VAA verified"
        );

        Ok(())
    }

    /// Releases the buffer in either state.
    pub fn discard(&mut self, id: AssemblyId, authority: &Address) -> Result<(), AssemblyError> {
        self.get(id)?.require_authority(id, authority)?;
        let _ = self.buffers.remove(&id);
        debug!(%id, "encoded VAA discarded");
        Ok(())
    }

    /// Consumes a verified buffer and posts its body to `ledger`.
    ///
    /// An already posted body fails with `AlreadyPosted` and leaves the buffer in place, so a
    /// rejected promotion changes nothing.
    pub fn promote_to_posted(
        &mut self,
        id: AssemblyId,
        authority: &Address,
        ledger: &mut ReplayLedger,
    ) -> Result<([u8; 32], PostedVaa), AssemblyError> {
        let encoded = self.get(id)?;
        encoded.require_authority(id, authority)?;
        let guardian_set_index = match encoded.status {
            ProcessingStatus::Verified { guardian_set_index } => guardian_set_index,
            ProcessingStatus::Writing => return Err(AssemblyError::UnverifiedVaa(id)),
        };

        let (_, body_bytes) = Vaa::split(&encoded.buf)?;
        let body = Body::decode_exact(body_bytes)?;
        let hash = body.digest().secp256k_hash;
        require!(
            !ledger.is_posted(&hash),
            crate::error::LedgerError::AlreadyPosted(hash)
        );

        let _ = self.buffers.remove(&id);
        let _ = ledger.commit_posted(guardian_set_index, body)?;
        info!(%id, hash = %hex::encode(hash), "encoded VAA promoted");

        let posted = ledger.lookup_posted(&hash)?.clone();
        Ok((hash, posted))
    }
}
