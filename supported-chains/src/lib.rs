//! Chain identifiers as they appear in emitter and governance fields.
//!
//! Every message names its source chain with a `u16`. Known ids map onto named variants; any
//! other value survives as `Chain::Unknown` so newly added chains still round-trip.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid chain: {0}")]
pub struct InvalidChainError(String);

macro_rules! chains {
    ($($(#[$meta:meta])* $name:ident = $id:literal),+ $(,)?) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Chain {
            /// On the wire, 0 indicates that a message is for any destination chain.
            #[default]
            Any,
            $($(#[$meta])* $name,)+
            /// Ids without a named variant.
            Unknown(u16),
        }

        impl From<u16> for Chain {
            fn from(other: u16) -> Chain {
                match other {
                    0 => Chain::Any,
                    $($id => Chain::$name,)+
                    c => Chain::Unknown(c),
                }
            }
        }

        impl From<Chain> for u16 {
            fn from(other: Chain) -> u16 {
                match other {
                    Chain::Any => 0,
                    $(Chain::$name => $id,)+
                    Chain::Unknown(c) => c,
                }
            }
        }

        impl Chain {
            fn name(&self) -> Option<&'static str> {
                match self {
                    Chain::Any => Some("Any"),
                    $(Chain::$name => Some(stringify!($name)),)+
                    Chain::Unknown(_) => None,
                }
            }

            fn from_name(s: &str) -> Option<Chain> {
                if s.eq_ignore_ascii_case("any") {
                    return Some(Chain::Any);
                }
                $(
                    if s.eq_ignore_ascii_case(stringify!($name)) {
                        return Some(Chain::$name);
                    }
                )+
                None
            }
        }
    };
}

chains! {
    Solana = 1,
    Ethereum = 2,
    Terra = 3,
    Bsc = 4,
    Polygon = 5,
    Avalanche = 6,
    Oasis = 7,
    Algorand = 8,
    Aurora = 9,
    Fantom = 10,
    Karura = 11,
    Acala = 12,
    Klaytn = 13,
    Celo = 14,
    Near = 15,
    Moonbeam = 16,
    Terra2 = 18,
    Injective = 19,
    Osmosis = 20,
    Sui = 21,
    Aptos = 22,
    Arbitrum = 23,
    Optimism = 24,
    Gnosis = 25,
    PythNet = 26,
    Xpla = 28,
    Btc = 29,
    Base = 30,
    FileCoin = 31,
    Sei = 32,
    Rootstock = 33,
    Scroll = 34,
    Mantle = 35,
    Blast = 36,
    XLayer = 37,
    Linea = 38,
    Berachain = 39,
    SeiEvm = 40,
    Eclipse = 41,
    Bob = 42,
    Snaxchain = 43,
    Unichain = 44,
    Worldchain = 45,
    Ink = 46,
    HyperEvm = 47,
    Monad = 48,
    Movement = 49,
    Mezo = 50,
    Fogo = 51,
    Aztec = 52,
    Wormchain = 3104,
    Cosmoshub = 4000,
    Evmos = 4001,
    Kujira = 4002,
    Neutron = 4003,
    Celestia = 4004,
    Stargaze = 4005,
    Seda = 4006,
    Dymension = 4007,
    Provenance = 4008,
    Noble = 4009,
    Sepolia = 10002,
    ArbitrumSepolia = 10003,
    BaseSepolia = 10004,
    OptimismSepolia = 10005,
    Holesky = 10006,
    PolygonSepolia = 10007,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, Chain::Unknown(v)) => write!(f, "Unknown({v})"),
            (None, _) => write!(f, "{}", u16::from(*self)),
        }
    }
}

impl FromStr for Chain {
    type Err = InvalidChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(chain) = Chain::from_name(s) {
            return Ok(chain);
        }

        // Handle Unknown(n) format
        let mut parts = s.split(&['(', ')']);
        let _ = parts
            .next()
            .filter(|name| name.eq_ignore_ascii_case("unknown"))
            .ok_or_else(|| InvalidChainError(s.into()))?;

        parts
            .next()
            .and_then(|v| v.parse::<u16>().ok())
            .map(Chain::from)
            .ok_or_else(|| InvalidChainError(s.into()))
    }
}

impl Serialize for Chain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16((*self).into())
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        <u16 as Deserialize>::deserialize(deserializer).map(Self::from)
    }
}
