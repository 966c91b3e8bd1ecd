//! Governance actions addressed to the core bridge itself (module "Core").

use std::io::{self, Read, Write};

use crate::{
    codec::{self, WireDecode, WireEncode},
    error::DecodeError,
    governance::{GovernanceHeader, GovernanceModule},
    guardian_set::GuardianSet,
    Address, Chain, GuardianAddress, CORE_MODULE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoreAction {
    ContractUpgrade = 1,
    GuardianSetUpgrade = 2,
    SetMessageFee = 3,
    TransferFees = 4,
}

impl TryFrom<u8> for CoreAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CoreAction::ContractUpgrade),
            2 => Ok(CoreAction::GuardianSetUpgrade),
            3 => Ok(CoreAction::SetMessageFee),
            4 => Ok(CoreAction::TransferFees),
            other => Err(other),
        }
    }
}

/// Replaces the current guardian set.
///
/// ```markdown
/// new_index:u32 | key_count:u8 | keys:20B * key_count
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardianSetUpgrade {
    pub new_index: u32,
    pub keys: Vec<GuardianAddress>,
}

impl GuardianSetUpgrade {
    pub fn into_guardian_set(self) -> GuardianSet {
        GuardianSet::new(self.new_index, self.keys)
    }
}

impl WireEncode for GuardianSetUpgrade {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.new_index.encode(writer)?;
        codec::encode_list(&self.keys, writer)
    }
}

impl WireDecode for GuardianSetUpgrade {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            new_index: WireDecode::decode_reader(reader)?,
            keys: codec::decode_list(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoreDecree {
    /// Points the host at a new implementation of the bridge.
    ContractUpgrade { new_contract: Address },
    GuardianSetUpgrade(GuardianSetUpgrade),
    /// Fee charged per published message, as a 32 byte uint256.
    SetMessageFee { fee: u64 },
    /// Pays collected fees out: amount uint256, then recipient.
    TransferFees { amount: u64, recipient: Address },
}

impl CoreDecree {
    pub fn action(&self) -> CoreAction {
        match self {
            CoreDecree::ContractUpgrade { .. } => CoreAction::ContractUpgrade,
            CoreDecree::GuardianSetUpgrade(_) => CoreAction::GuardianSetUpgrade,
            CoreDecree::SetMessageFee { .. } => CoreAction::SetMessageFee,
            CoreDecree::TransferFees { .. } => CoreAction::TransferFees,
        }
    }

    /// The full governance payload carrying this decree to `target_chain`.
    pub fn to_payload(&self, target_chain: Chain) -> Vec<u8> {
        let mut payload = GovernanceHeader {
            module: CORE_MODULE,
            action: self.action() as u8,
            target_chain,
        }
        .to_vec();
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut payload);
        payload
    }
}

impl WireEncode for CoreDecree {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            CoreDecree::ContractUpgrade { new_contract } => new_contract.encode(writer),
            CoreDecree::GuardianSetUpgrade(upgrade) => upgrade.encode(writer),
            CoreDecree::SetMessageFee { fee } => codec::encode_u256(*fee, writer),
            CoreDecree::TransferFees { amount, recipient } => {
                codec::encode_u256(*amount, writer)?;
                recipient.encode(writer)
            }
        }
    }
}

impl GovernanceModule for CoreDecree {
    const MODULE: [u8; 32] = CORE_MODULE;

    fn recognizes(action: u8) -> bool {
        CoreAction::try_from(action).is_ok()
    }

    fn decode(action: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        struct SetMessageFee(u64);
        struct TransferFees(u64, Address);

        impl WireDecode for SetMessageFee {
            fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
                codec::decode_u256(reader).map(SetMessageFee)
            }
        }

        impl WireDecode for TransferFees {
            fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
                let amount = codec::decode_u256(reader)?;
                let recipient = WireDecode::decode_reader(reader)?;
                Ok(TransferFees(amount, recipient))
            }
        }

        let action = CoreAction::try_from(action).map_err(DecodeError::UnknownAction)?;

        Ok(match action {
            CoreAction::ContractUpgrade => CoreDecree::ContractUpgrade {
                new_contract: Address::decode_exact(payload)?,
            },
            CoreAction::GuardianSetUpgrade => {
                CoreDecree::GuardianSetUpgrade(GuardianSetUpgrade::decode_exact(payload)?)
            }
            CoreAction::SetMessageFee => {
                let SetMessageFee(fee) = SetMessageFee::decode_exact(payload)?;
                CoreDecree::SetMessageFee { fee }
            }
            CoreAction::TransferFees => {
                let TransferFees(amount, recipient) = TransferFees::decode_exact(payload)?;
                CoreDecree::TransferFees { amount, recipient }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use hex_literal::hex;

    use super::*;
    use crate::{
        governance::{GovernanceDispatcher, GovernanceEmitter, GOVERNANCE_HEADER_LEN},
        ledger::PostedVaa,
        vaa::Vaa,
    };

    // The first mainnet guardian set upgrade, from set 0 to set 1.
    const GUARDIAN_SET_UPGRADE: [u8; 543] = hex!(
        "010000000001007ac31b282c2aeeeb37f3385ee0de5f8e421d30b9e5ae8ba3d4375c1c77a86e77159bb697d9c456d6f8c02d22a94b1279b65b0d6a9957e7d3857423845ac758e300610ac1d2000000030001000000000000000000000000000000000000000000000000000000000000000400000000000005390000000000000000000000000000000000000000000000000000000000436f7265020000000000011358cc3ae5c097b213ce3c81979e1b9f9570746aa5ff6cb952589bde862c25ef4392132fb9d4a42157114de8460193bdf3a2fcf81f86a09765f4762fd1107a0086b32d7a0977926a205131d8731d39cbeb8c82b2fd82faed2711d59af0f2499d16e726f6b211b39756c042441be6d8650b69b54ebe715e234354ce5b4d348fb74b958e8966e2ec3dbd4958a7cdeb5f7389fa26941519f0863349c223b73a6ddee774a3bf913953d695260d88bc1aa25a4eee363ef0000ac0076727b35fbea2dac28fee5ccb0fea768eaf45ced136b9d9e24903464ae889f5c8a723fc14f93124b7c738843cbb89e864c862c38cddcccf95d2cc37a4dc036a8d232b48f62cdd4731412f4890da798f6896a3331f64b48c12d1d57fd9cbe7081171aa1be1d36cafe3867910f99c09e347899c19c38192b6e7387ccd768277c17dab1b7a5027c0b3cf178e21ad2e77ae06711549cfbb1f9c7a9d8096e85e1487f35515d02a92753504a8d75471b9f49edb6fbebc898f403e4773e95feb15e80c9a99c8348d"
    );

    #[test]
    fn mainnet_guardian_set_upgrade() {
        let (vaa, digest) = Vaa::parse(&GUARDIAN_SET_UPGRADE).unwrap();
        assert_eq!(
            hex!("ed3a5600d44b9dcc889daf0178dd69ab1e9356308194ba3628a7b720ae48a8d5"),
            digest.secp256k_hash
        );
        assert_eq!(1, vaa.header.version);
        assert_eq!(0, vaa.header.guardian_set_index);
        assert_eq!(1, vaa.header.signatures.len());
        assert_eq!(1337, vaa.body.sequence);

        let posted = PostedVaa::new(0, vaa.body);
        let dispatcher = GovernanceDispatcher::new(GovernanceEmitter::default(), Chain::Solana);
        let (action, decree) = dispatcher.parse_decree::<CoreDecree>(&posted).unwrap();
        assert_eq!(Chain::Any, action.header.target_chain);

        let upgrade = match decree {
            CoreDecree::GuardianSetUpgrade(upgrade) => upgrade,
            other => panic!("unexpected decree {other:?}"),
        };
        assert_eq!(1, upgrade.new_index);
        assert_eq!(19, upgrade.keys.len());
        assert_eq!(
            [
                GuardianAddress(hex!("58cc3ae5c097b213ce3c81979e1b9f9570746aa5")),
                GuardianAddress(hex!("ff6cb952589bde862c25ef4392132fb9d4a42157")),
                GuardianAddress(hex!("114de8460193bdf3a2fcf81f86a09765f4762fd1")),
            ],
            upgrade.keys[..3]
        );
        assert_eq!(Ok(()), upgrade.into_guardian_set().validate());
    }

    #[test]
    fn decree_payloads() {
        let recipient = Address([0x42; 32]);
        let decrees = [
            CoreDecree::ContractUpgrade {
                new_contract: Address([0x01; 32]),
            },
            CoreDecree::GuardianSetUpgrade(GuardianSetUpgrade {
                new_index: 4,
                keys: vec![GuardianAddress([0x0a; 20]), GuardianAddress([0x0b; 20])],
            }),
            CoreDecree::SetMessageFee { fee: 1_000 },
            CoreDecree::TransferFees {
                amount: 5,
                recipient,
            },
        ];
        let lengths = [32, 45, 32, 64];

        for (decree, len) in decrees.into_iter().zip(lengths) {
            let payload = decree.to_payload(Chain::Solana);
            assert_eq!(GOVERNANCE_HEADER_LEN + len, payload.len());
            assert_eq!(decree.action() as u8, payload[32]);

            let body = &payload[GOVERNANCE_HEADER_LEN..];
            assert_eq!(Ok(decree.clone()), CoreDecree::decode(payload[32], body));

            // Exact framing on every action.
            let padded = [body, &[0u8][..]].concat();
            assert_eq!(
                Err(DecodeError::TrailingBytes(1)),
                CoreDecree::decode(payload[32], &padded)
            );
        }
    }

    #[test]
    fn transfer_fees_layout() {
        let mut payload = [0u8; 64];
        payload[31] = 9;
        payload[32..].copy_from_slice(&[0x42; 32]);
        assert_eq!(
            Ok(CoreDecree::TransferFees {
                amount: 9,
                recipient: Address([0x42; 32])
            }),
            CoreDecree::decode(CoreAction::TransferFees as u8, &payload)
        );

        payload[0] = 1;
        assert_eq!(
            Err(DecodeError::AmountOverflow),
            CoreDecree::decode(CoreAction::TransferFees as u8, &payload)
        );
    }

    #[test]
    fn action_codes() {
        for code in 1..=4 {
            assert!(CoreDecree::recognizes(code));
            assert_eq!(Ok(code), CoreAction::try_from(code).map(|a| a as u8));
        }
        assert!(!CoreDecree::recognizes(0));
        assert!(!CoreDecree::recognizes(5));
    }
}
