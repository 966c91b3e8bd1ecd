//! VAAs are a body and the guardian signatures over its digest. By submitting a VAA, a
//! receiving chain can trust that the body describes an event observed on the emitter chain.
//!
//! On the wire a signed VAA is a header followed by the body:
//!
//! ```markdown
//! version:u8 | guardian_set_index:u32 | signature_count:u8 | signatures:66B * n
//! timestamp:u32 | nonce:u32 | emitter_chain:u16 | emitter_address:32B | sequence:u64
//! consistency_level:u8 | payload:rest
//! ```

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, Digest, WireDecode, WireEncode},
    error::DecodeError,
    Address, Chain,
};

/// Version, guardian set index and signature count.
pub const HEADER_LEN: usize = 6;

pub const SIGNATURE_LEN: usize = 66;

/// Every body field ahead of the payload.
pub const BODY_HEADER_LEN: usize = 51;

/// Signatures are typical ECDSA signatures prefixed with a Guardian position. These have the
/// following byte layout:
/// ```markdown
/// 0  .. 64: Signature   (ECDSA)
/// 64 .. 65: Recovery ID (ECDSA)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub index: u8,
    pub signature: [u8; 65],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            index: 0,
            signature: [0; 65],
        }
    }
}

impl WireEncode for Signature {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.index.encode(writer)?;
        self.signature.encode(writer)
    }
}

impl WireDecode for Signature {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            index: WireDecode::decode_reader(reader)?,
            signature: WireDecode::decode_reader(reader)?,
        })
    }
}

/// The header for a VAA.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
}

impl WireEncode for Header {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.version.encode(writer)?;
        self.guardian_set_index.encode(writer)?;
        codec::encode_list(&self.signatures, writer)
    }
}

impl WireDecode for Header {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            version: WireDecode::decode_reader(reader)?,
            guardian_set_index: WireDecode::decode_reader(reader)?,
            signatures: codec::decode_list(reader)?,
        })
    }
}

/// The body for a VAA. The payload runs to the end of the encoding, so a body always consumes
/// all remaining input.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Body {
    /// Seconds since UNIX epoch.
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl Body {
    pub fn digest(&self) -> Digest {
        codec::digest(&self.to_vec())
    }
}

impl WireEncode for Body {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.timestamp.encode(writer)?;
        self.nonce.encode(writer)?;
        self.emitter_chain.encode(writer)?;
        self.emitter_address.encode(writer)?;
        self.sequence.encode(writer)?;
        self.consistency_level.encode(writer)?;
        writer.write_all(&self.payload)
    }
}

impl WireDecode for Body {
    fn decode_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let timestamp = WireDecode::decode_reader(reader)?;
        let nonce = WireDecode::decode_reader(reader)?;
        let emitter_chain = WireDecode::decode_reader(reader)?;
        let emitter_address = WireDecode::decode_reader(reader)?;
        let sequence = WireDecode::decode_reader(reader)?;
        let consistency_level = WireDecode::decode_reader(reader)?;

        let mut payload = Vec::new();
        let _ = reader.read_to_end(&mut payload)?;

        Ok(Self {
            timestamp,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level,
            payload,
        })
    }
}

/// A signed VAA, split into its header and body.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Vaa {
    pub header: Header,
    pub body: Body,
}

impl Vaa {
    /// Splits a signed VAA into its decoded header and the raw body bytes the guardians signed.
    /// The body is not decoded, so its digest is computed over exactly what was signed.
    pub fn split(bytes: &[u8]) -> Result<(Header, &[u8]), DecodeError> {
        let mut buf = bytes;
        let header = Header::decode(&mut buf)?;
        require!(buf.len() >= BODY_HEADER_LEN, DecodeError::UnexpectedEnd);
        Ok((header, buf))
    }

    /// Parses a signed VAA, returning it along with the digest of its body.
    pub fn parse(bytes: &[u8]) -> Result<(Self, Digest), DecodeError> {
        let (header, body_bytes) = Self::split(bytes)?;
        let body = Body::decode_exact(body_bytes)?;
        Ok((Self { header, body }, codec::digest(body_bytes)))
    }

    pub fn digest(&self) -> Digest {
        self.body.digest()
    }
}

impl WireEncode for Vaa {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.header.encode(writer)?;
        self.body.encode(writer)
    }
}

impl From<Vaa> for (Header, Body) {
    fn from(v: Vaa) -> Self {
        (v.header, v.body)
    }
}

impl From<(Header, Body)> for Vaa {
    fn from((header, body): (Header, Body)) -> Self {
        Vaa { header, body }
    }
}

#[cfg(test)]
mod test {
    use hex_literal::hex;

    use super::*;
    use crate::GOVERNANCE_EMITTER;

    // A body registering an Ethereum token bridge, with a known digest.
    fn registration_body() -> Body {
        let mut payload = vec![0u8; 21];
        payload.extend_from_slice(b"TokenBridge");
        payload.extend_from_slice(&[1, 0, 0, 0, 2]);
        payload.extend_from_slice(&[0; 12]);
        payload.extend_from_slice(&hex!("0290fb167208af455bb137780163b7b7a9a10c16"));

        Body {
            timestamp: 1,
            nonce: 1,
            emitter_chain: Chain::Solana,
            emitter_address: GOVERNANCE_EMITTER,
            sequence: 62_150_328,
            consistency_level: 0,
            payload,
        }
    }

    #[test]
    fn stable_digest() {
        let body = registration_body();
        let encoded = body.to_vec();
        assert_eq!(120, encoded.len());
        assert_eq!(
            hex!("05d1fcc531746c7efd7feea20a81d2799f777f302b8a6a6424b81209dc3f511f"),
            body.digest().secp256k_hash
        );

        let decoded = Body::decode_exact(&encoded).unwrap();
        assert_eq!(body, decoded);
        assert_eq!(body.digest(), decoded.digest());
    }

    #[test]
    fn parse_signed_vaa() {
        let vaa = Vaa {
            header: Header {
                version: 1,
                guardian_set_index: 3,
                signatures: vec![
                    Signature {
                        index: 0,
                        signature: [7; 65],
                    },
                    Signature {
                        index: 2,
                        signature: [9; 65],
                    },
                ],
            },
            body: registration_body(),
        };

        let bytes = vaa.to_vec();
        assert_eq!(HEADER_LEN + 2 * SIGNATURE_LEN + 120, bytes.len());

        let (parsed, digest) = Vaa::parse(&bytes).unwrap();
        assert_eq!(vaa, parsed);
        assert_eq!(vaa.digest(), digest);

        let (header, body) = Vaa::split(&bytes).unwrap();
        assert_eq!(vaa.header, header);
        assert_eq!(&bytes[HEADER_LEN + 2 * SIGNATURE_LEN..], body);
    }

    #[test]
    fn truncated_vaa() {
        let bytes = Vaa {
            header: Header {
                version: 1,
                guardian_set_index: 0,
                signatures: vec![Signature::default()],
            },
            body: Body::default(),
        }
        .to_vec();
        assert_eq!(HEADER_LEN + SIGNATURE_LEN + BODY_HEADER_LEN, bytes.len());

        // Cut into the signature list.
        assert_eq!(Err(DecodeError::UnexpectedEnd), Vaa::split(&bytes[..40]));
        // Cut into the body header.
        assert_eq!(
            Err(DecodeError::UnexpectedEnd),
            Vaa::split(&bytes[..bytes.len() - 1])
        );
        assert!(Vaa::parse(&bytes).unwrap().0.body.payload.is_empty());
    }
}
