//! Quorum verification. Every VAA accepted by the bridge passes through
//! [`QuorumVerifier::verify`], which is also the only caller of signature recovery.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use thiserror::Error;

use crate::{error::VerifyError, guardian_set::GuardianSet, vaa::Signature, GuardianAddress};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("public key recovery failed")]
    InvalidGuardianKeyRecovery,
}

/// Recovers the address that produced `signature` (r || s || v) over a 32 byte digest.
pub trait RecoverSigner {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &[u8; 65],
    ) -> Result<GuardianAddress, RecoveryError>;
}

/// secp256k1 public key recovery backed by `k256`. Recovery ids are accepted as 0/1 or in the
/// legacy 27/28 encoding. High-S signatures are accepted and recover the same signer as their
/// low-S form.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Recovery;

impl RecoverSigner for Secp256k1Recovery {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &[u8; 65],
    ) -> Result<GuardianAddress, RecoveryError> {
        let v = match signature[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => return Err(RecoveryError::InvalidRecoveryId(v)),
        };
        let sig = EcdsaSignature::from_slice(&signature[..64])
            .map_err(|_| RecoveryError::InvalidSignature)?;
        // Negating s negates the nonce point's parity.
        let (sig, v) = match sig.normalize_s() {
            Some(low) => (low, v ^ 1),
            None => (sig, v),
        };
        let recovery_id = RecoveryId::from_byte(v).ok_or(RecoveryError::InvalidRecoveryId(v))?;

        let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
            .map_err(|_| RecoveryError::InvalidGuardianKeyRecovery)?;

        let point = key.to_encoded_point(false);
        let mut uncompressed = [0u8; 64];
        uncompressed.copy_from_slice(&point.as_bytes()[1..]);

        Ok(GuardianAddress::from_public_key(&uncompressed))
    }
}

/// Decides whether a list of guardian signatures over a digest meets quorum for a guardian
/// set. Pure: the caller checks that the set is still usable before calling.
#[derive(Debug, Default, Clone)]
pub struct QuorumVerifier<R = Secp256k1Recovery> {
    recovery: R,
}

impl QuorumVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: RecoverSigner> QuorumVerifier<R> {
    pub fn with_recovery(recovery: R) -> Self {
        Self { recovery }
    }

    /// Verifies `signatures` over `digest` against `guardian_set`, returning the number of
    /// valid signatures.
    ///
    /// Checks run in order: signature ordering, guardian index range, key recovery, signer
    /// match, then quorum. The first failure rejects the whole list.
    pub fn verify(
        &self,
        digest: &[u8; 32],
        signatures: &[Signature],
        guardian_set: &GuardianSet,
    ) -> Result<usize, VerifyError> {
        require!(!signatures.is_empty(), VerifyError::NoSignatures);

        // Strictly increasing indices also rule out duplicates.
        for (position, pair) in signatures.windows(2).enumerate() {
            require!(
                pair[0].index < pair[1].index,
                VerifyError::UnsortedSignatures {
                    position: position + 1
                }
            );
        }

        let set_size = guardian_set.num_guardians();
        for sig in signatures {
            require!(
                usize::from(sig.index) < set_size,
                VerifyError::GuardianIndexOutOfRange {
                    index: sig.index,
                    set_size,
                }
            );
        }

        for sig in signatures {
            let signer = self
                .recovery
                .recover(digest, &sig.signature)
                .map_err(|_| VerifyError::MalformedSignature { index: sig.index })?;
            require!(
                signer == guardian_set.keys[usize::from(sig.index)],
                VerifyError::WrongSigner { index: sig.index }
            );
        }

        let quorum = guardian_set.quorum();
        require!(
            signatures.len() >= quorum,
            VerifyError::NoQuorum {
                signatures: signatures.len(),
                quorum,
            }
        );

        Ok(signatures.len())
    }
}
