//! Wire encoding shared by every structure in the crate.
//!
//! Integers are big-endian and fixed width, byte arrays are written as-is, and variable length
//! lists carry a one byte count prefix. Decoding is exact: [`WireDecode::decode_exact`] rejects
//! both short and overlong input.

use std::io::{self, Read, Write};

use sha3::Digest as Sha3Digest;

use crate::{error::DecodeError, Address, Chain, GuardianAddress};

pub trait WireEncode {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut buf);
        buf
    }
}

pub trait WireDecode: Sized {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError>;

    /// Decodes from the front of `buf`, advancing it past the consumed bytes.
    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        Self::decode_reader(buf)
    }

    /// Decodes `bytes` in full. Anything left over is an error.
    fn decode_exact(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = bytes;
        let value = Self::decode(&mut buf)?;
        require!(buf.is_empty(), DecodeError::TrailingBytes(buf.len()));
        Ok(value)
    }
}

macro_rules! impl_for_integer {
    ($type: ident) => {
        impl WireEncode for $type {
            #[inline]
            fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
                writer.write_all(&self.to_be_bytes())
            }
        }

        impl WireDecode for $type {
            #[inline]
            fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
                let mut buf = [0u8; std::mem::size_of::<$type>()];
                reader.read_exact(&mut buf)?;
                Ok($type::from_be_bytes(buf))
            }
        }
    };
}

impl_for_integer!(u8);
impl_for_integer!(u16);
impl_for_integer!(u32);
impl_for_integer!(u64);

impl<const N: usize> WireEncode for [u8; N] {
    #[inline]
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self)
    }
}

impl<const N: usize> WireDecode for [u8; N] {
    #[inline]
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl WireEncode for Chain {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        u16::from(*self).encode(writer)
    }
}

impl WireDecode for Chain {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        u16::decode_reader(reader).map(Chain::from)
    }
}

impl WireEncode for Address {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.encode(writer)
    }
}

impl WireDecode for Address {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        WireDecode::decode_reader(reader).map(Address)
    }
}

impl WireEncode for GuardianAddress {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.encode(writer)
    }
}

impl WireDecode for GuardianAddress {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        WireDecode::decode_reader(reader).map(GuardianAddress)
    }
}

/// Writes a list with its one byte length prefix. Lists longer than 255 cannot be framed.
pub fn encode_list<T: WireEncode, W: Write>(items: &[T], writer: &mut W) -> io::Result<()> {
    let count = u8::try_from(items.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "list longer than 255 entries")
    })?;
    count.encode(writer)?;
    items.iter().try_for_each(|item| item.encode(writer))
}

pub fn decode_list<T: WireDecode, R: Read>(reader: &mut R) -> Result<Vec<T>, DecodeError> {
    let count = u8::decode_reader(reader)?;
    (0..count).map(|_| T::decode_reader(reader)).collect()
}

/// Reads a 32 byte big-endian uint256 that must fit in a `u64`.
pub fn decode_u256<R: Read>(reader: &mut R) -> Result<u64, DecodeError> {
    let buf: [u8; 32] = WireDecode::decode_reader(reader)?;
    require!(buf[..24] == [0; 24], DecodeError::AmountOverflow);

    let mut low = [0u8; 8];
    low.copy_from_slice(&buf[24..]);
    Ok(u64::from_be_bytes(low))
}

pub fn encode_u256<W: Write>(value: u64, writer: &mut W) -> io::Result<()> {
    [0u8; 24].encode(writer)?;
    value.encode(writer)
}

/// Digest data for a VAA body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    /// keccak256 of the serialized body.
    pub hash: [u8; 32],

    /// keccak256 of `hash`. Guardians sign this value with secp256k1, and it is the key
    /// under which a verified VAA is posted.
    pub secp256k_hash: [u8; 32],
}

/// Calculates the digest of a serialized VAA body.
pub fn digest(body: &[u8]) -> Digest {
    let hash: [u8; 32] = sha3::Keccak256::digest(body).into();
    let secp256k_hash: [u8; 32] = sha3::Keccak256::digest(hash).into();

    Digest {
        hash,
        secp256k_hash,
    }
}
