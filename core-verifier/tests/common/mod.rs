#![allow(dead_code)]

use k256::ecdsa::SigningKey;
use wormhole_core_verifier::{
    assembly::AssemblyId,
    clock::{Clock, ManualClock},
    codec::WireEncode,
    governance::CoreDecree,
    verifier::RecoverSigner,
    Address, Body, BridgeConfig, Chain, CoreBridge, GuardianAddress, GuardianSet, Header,
    Signature, Vaa, GOVERNANCE_EMITTER,
};

pub const WRITER: Address = Address([0x11; 32]);
pub const GENESIS_TIME: u32 = 1_700_000_000;

/// A guardian set with its private keys, so tests can produce real signatures.
pub struct Guardians {
    pub index: u32,
    pub keys: Vec<SigningKey>,
}

impl Guardians {
    /// `n` guardians with deterministic keys derived from `seed`.
    pub fn new(index: u32, seed: u8, n: u8) -> Self {
        let keys = (0..n)
            .map(|i| {
                let mut secret = [seed; 32];
                secret[31] = i.wrapping_add(1);
                SigningKey::from_slice(&secret).unwrap()
            })
            .collect();
        Self { index, keys }
    }

    pub fn addresses(&self) -> Vec<GuardianAddress> {
        self.keys
            .iter()
            .map(|k| {
                let point = k.verifying_key().to_encoded_point(false);
                let mut uncompressed = [0u8; 64];
                uncompressed.copy_from_slice(&point.as_bytes()[1..]);
                GuardianAddress::from_public_key(&uncompressed)
            })
            .collect()
    }

    pub fn guardian_set(&self) -> GuardianSet {
        GuardianSet::new(self.index, self.addresses())
    }

    pub fn signatures(&self, body: &Body, signers: &[usize]) -> Vec<Signature> {
        let digest = body.digest().secp256k_hash;
        signers
            .iter()
            .map(|&i| {
                let (sig, recid) = self.keys[i].sign_prehash_recoverable(&digest).unwrap();
                let mut signature = [0u8; 65];
                signature[..64].copy_from_slice(&sig.to_bytes());
                signature[64] = recid.to_byte();
                Signature {
                    index: i as u8,
                    signature,
                }
            })
            .collect()
    }

    /// Encodes `body` signed by the guardians at `signers`.
    pub fn sign(&self, body: &Body, signers: &[usize]) -> Vec<u8> {
        Vaa {
            header: Header {
                version: 1,
                guardian_set_index: self.index,
                signatures: self.signatures(body, signers),
            },
            body: body.clone(),
        }
        .to_vec()
    }

    /// Signed by the first `count` guardians.
    pub fn sign_by(&self, body: &Body, count: usize) -> Vec<u8> {
        let signers: Vec<usize> = (0..count).collect();
        self.sign(body, &signers)
    }
}

pub fn message(sequence: u64, payload: &[u8]) -> Body {
    Body {
        timestamp: GENESIS_TIME,
        nonce: 7,
        emitter_chain: Chain::Ethereum,
        emitter_address: Address([0xe1; 32]),
        sequence,
        consistency_level: 15,
        payload: payload.to_vec(),
    }
}

pub fn governance(sequence: u64, decree: &CoreDecree, target: Chain) -> Body {
    Body {
        timestamp: GENESIS_TIME,
        nonce: 0,
        emitter_chain: Chain::Solana,
        emitter_address: GOVERNANCE_EMITTER,
        sequence,
        consistency_level: 0,
        payload: decree.to_payload(target),
    }
}

pub fn config() -> BridgeConfig {
    BridgeConfig {
        chain_id: Chain::Ethereum,
        guardian_set_ttl_seconds: 3_600,
        ..Default::default()
    }
}

pub fn bridge(
    genesis: &Guardians,
    config: BridgeConfig,
) -> (CoreBridge<ManualClock>, ManualClock) {
    let clock = ManualClock::new(GENESIS_TIME);
    let bridge = CoreBridge::new(config, genesis.guardian_set(), clock.clone()).unwrap();
    (bridge, clock)
}

/// Stages `bytes` through an encoded VAA buffer in chunks, as a client working under a
/// transaction size limit would.
pub fn stage<C: Clock, R: RecoverSigner>(
    bridge: &mut CoreBridge<C, R>,
    bytes: &[u8],
) -> AssemblyId {
    let id = bridge.init_encoded_vaa(WRITER, bytes.len()).unwrap();
    for (i, chunk) in bytes.chunks(512).enumerate() {
        bridge.write_encoded_vaa(id, &WRITER, i * 512, chunk).unwrap();
    }
    id
}
