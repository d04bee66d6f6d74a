//! OpenPGP signature checks for RPM packages
//!
//! Trusted keys come from ASCII-armored key blocks, the same files
//! distributions ship as `RPM-GPG-KEY-*`. Only RSA keys and RSA signatures
//! with SHA-2 digests are accepted. A package is checked against its
//! `RSAHEADER` signature when present, falling back to the legacy `PGP`
//! signature over header and payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use srcport_core::ServiceError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::header::{RpmHeaderError, Sections, SIGTAG_PGP, SIGTAG_RSAHEADER};

const ARMOR_BEGIN: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const ARMOR_END: &str = "-----END PGP PUBLIC KEY BLOCK-----";

pub(crate) const PACKET_SIGNATURE: u8 = 2;
pub(crate) const PACKET_PUBLIC_KEY: u8 = 6;
pub(crate) const PACKET_PUBLIC_SUBKEY: u8 = 14;

pub(crate) const ALGO_RSA: u8 = 1;
const ALGO_RSA_SIGN_ONLY: u8 = 3;

pub(crate) const HASH_SHA256: u8 = 8;

const SUBPACKET_ISSUER: u8 = 16;
const SUBPACKET_ISSUER_FINGERPRINT: u8 = 33;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed public key block: {0}")]
    MalformedKeyBlock(&'static str),

    #[error("key block contains no usable RSA public key")]
    NoUsableKeys,

    #[error("package is not signed")]
    Unsigned,

    #[error("malformed package signature: {0}")]
    MalformedSignature(&'static str),

    #[error("unsupported package signature: {0}")]
    Unsupported(String),

    #[error("package digest does not match its signature")]
    DigestMismatch,

    #[error("package signature by key {key_id} is not from a trusted key")]
    Untrusted { key_id: String },

    #[error(transparent)]
    Header(#[from] RpmHeaderError),
}

impl From<SignatureError> for ServiceError {
    fn from(error: SignatureError) -> Self {
        match error {
            SignatureError::Header(header) => header.into(),
            other => ServiceError::SignatureVerification(other.to_string()),
        }
    }
}

/// CRC-24 as used by ASCII armor checksums
pub(crate) fn crc24(data: &[u8]) -> u32 {
    let mut crc: u32 = 0x00B7_04CE;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= 0x0186_4CFB;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Public keys packages must be signed with
#[derive(Clone)]
pub struct TrustedKeys {
    keys: Vec<RsaPublicKey>,
}

impl std::fmt::Debug for TrustedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedKeys")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl TrustedKeys {
    /// Load every RSA primary key and subkey from one or more armored
    /// public key blocks. Keys of other algorithms are skipped; a set with
    /// no usable key is an error.
    pub fn from_armored(text: &str) -> Result<Self, SignatureError> {
        let mut keys = Vec::new();
        for block in dearmor(text)? {
            for packet in read_packets(&block).map_err(SignatureError::MalformedKeyBlock)? {
                if packet.tag != PACKET_PUBLIC_KEY && packet.tag != PACKET_PUBLIC_SUBKEY {
                    continue;
                }
                match parse_public_key(packet.body).map_err(SignatureError::MalformedKeyBlock)? {
                    Some(key) => keys.push(key),
                    None => debug!("skipping non-RSA key packet"),
                }
            }
        }

        if keys.is_empty() {
            return Err(SignatureError::NoUsableKeys);
        }
        Ok(Self { keys })
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Check the package signature against the trusted keys.
    pub fn verify_package(&self, content: &[u8]) -> Result<(), SignatureError> {
        let sections = Sections::read(content)?;
        let (blob, signed) = match sections.signature.binary(SIGTAG_RSAHEADER)? {
            Some(blob) => (blob, sections.main_bytes),
            None => match sections.signature.binary(SIGTAG_PGP)? {
                Some(blob) => (blob, sections.main_and_payload),
                None => return Err(SignatureError::Unsigned),
            },
        };

        let signature = PackageSignature::parse(blob)?;
        let digest = signature.hash.digest(&[signed, &signature.trailer]);
        if digest[..2] != signature.left16 {
            return Err(SignatureError::DigestMismatch);
        }

        let trusted = self.keys.iter().any(|key| {
            left_pad(&signature.value, key.size())
                .map(|value| key.verify(signature.hash.scheme(), &digest, &value).is_ok())
                .unwrap_or(false)
        });
        if trusted {
            return Ok(());
        }

        let key_id = signature
            .issuer
            .map(hex::encode_upper)
            .unwrap_or_else(|| "<unknown>".to_string());
        warn!("rejecting package signed by untrusted key {}", key_id);
        Err(SignatureError::Untrusted { key_id })
    }
}

fn dearmor(text: &str) -> Result<Vec<Vec<u8>>, SignatureError> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().map(str::trim);

    while let Some(line) = lines.next() {
        if line != ARMOR_BEGIN {
            continue;
        }

        let mut body = String::new();
        let mut checksum = None;
        let mut in_headers = true;
        let mut closed = false;
        for line in lines.by_ref() {
            if line == ARMOR_END {
                closed = true;
                break;
            }
            // Armor headers ("Version: ...") end at the first blank line.
            if in_headers {
                if line.contains(": ") {
                    continue;
                }
                in_headers = false;
                if line.is_empty() {
                    continue;
                }
            }
            match line.strip_prefix('=') {
                Some(crc) => checksum = Some(crc.to_string()),
                None => body.push_str(line),
            }
        }
        if !closed {
            return Err(SignatureError::MalformedKeyBlock("unterminated armor"));
        }

        let data = STANDARD
            .decode(body.as_bytes())
            .map_err(|_| SignatureError::MalformedKeyBlock("invalid base64"))?;
        if let Some(checksum) = checksum {
            let expected = STANDARD
                .decode(checksum.as_bytes())
                .map_err(|_| SignatureError::MalformedKeyBlock("invalid armor checksum"))?;
            let actual = crc24(&data).to_be_bytes();
            if expected[..] != actual[1..] {
                return Err(SignatureError::MalformedKeyBlock("armor checksum mismatch"));
            }
        }
        blocks.push(data);
    }

    if blocks.is_empty() {
        return Err(SignatureError::MalformedKeyBlock("no public key block found"));
    }
    Ok(blocks)
}

struct Packet<'a> {
    tag: u8,
    body: &'a [u8],
}

fn read_packets(data: &[u8]) -> Result<Vec<Packet<'_>>, &'static str> {
    let mut packets = Vec::new();
    let mut rest = Reader::new(data);

    while !rest.is_empty() {
        let first = rest.u8()?;
        if first & 0x80 == 0 {
            return Err("invalid packet header");
        }

        let (tag, len) = if first & 0x40 != 0 {
            let tag = first & 0x3f;
            let len = match rest.u8()? {
                len @ 0..=191 => usize::from(len),
                octet @ 192..=223 => {
                    ((usize::from(octet) - 192) << 8) + usize::from(rest.u8()?) + 192
                }
                255 => rest.u32()? as usize,
                _ => return Err("partial body lengths are not supported"),
            };
            (tag, len)
        } else {
            let tag = (first >> 2) & 0x0f;
            let len = match first & 0x03 {
                0 => usize::from(rest.u8()?),
                1 => usize::from(rest.u16()?),
                2 => rest.u32()? as usize,
                _ => rest.remaining(),
            };
            (tag, len)
        };

        packets.push(Packet {
            tag,
            body: rest.take(len)?,
        });
    }
    Ok(packets)
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], &'static str> {
        if self.bytes.len() < n {
            return Err("truncated packet");
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, &'static str> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, &'static str> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, &'static str> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Multiprecision integer: a bit count, then the big-endian value
    fn mpi(&mut self) -> Result<&'a [u8], &'static str> {
        let bits = usize::from(self.u16()?);
        self.take(bits.div_ceil(8))
    }
}

fn parse_public_key(body: &[u8]) -> Result<Option<RsaPublicKey>, &'static str> {
    let mut reader = Reader::new(body);
    match reader.u8()? {
        // creation time
        4 => reader.take(4)?,
        // creation time and validity period
        2 | 3 => reader.take(6)?,
        _ => return Ok(None),
    };

    let algorithm = reader.u8()?;
    if algorithm != ALGO_RSA && algorithm != ALGO_RSA_SIGN_ONLY {
        return Ok(None);
    }
    let n = BigUint::from_bytes_be(reader.mpi()?);
    let e = BigUint::from_bytes_be(reader.mpi()?);
    match RsaPublicKey::new(n, e) {
        Ok(key) => Ok(Some(key)),
        Err(e) => {
            debug!("skipping RSA key: {}", e);
            Ok(None)
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn from_id(id: u8) -> Result<Self, SignatureError> {
        match id {
            HASH_SHA256 => Ok(HashAlgorithm::Sha256),
            9 => Ok(HashAlgorithm::Sha384),
            10 => Ok(HashAlgorithm::Sha512),
            11 => Ok(HashAlgorithm::Sha224),
            2 => Err(SignatureError::Unsupported("SHA-1 digests".to_string())),
            other => Err(SignatureError::Unsupported(format!(
                "hash algorithm {}",
                other
            ))),
        }
    }

    fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }

        match self {
            HashAlgorithm::Sha224 => run::<Sha224>(parts),
            HashAlgorithm::Sha256 => run::<Sha256>(parts),
            HashAlgorithm::Sha384 => run::<Sha384>(parts),
            HashAlgorithm::Sha512 => run::<Sha512>(parts),
        }
    }

    fn scheme(self) -> Pkcs1v15Sign {
        match self {
            HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
            HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }
}

/// A v3 or v4 RSA signature packet
struct PackageSignature {
    hash: HashAlgorithm,
    /// Bytes hashed after the signed data
    trailer: Vec<u8>,
    left16: [u8; 2],
    value: Vec<u8>,
    issuer: Option<[u8; 8]>,
}

impl PackageSignature {
    fn parse(blob: &[u8]) -> Result<Self, SignatureError> {
        let malformed = SignatureError::MalformedSignature;
        let packet = read_packets(blob)
            .map_err(malformed)?
            .into_iter()
            .find(|p| p.tag == PACKET_SIGNATURE)
            .ok_or(SignatureError::MalformedSignature("no signature packet"))?;

        let body = packet.body;
        let mut reader = Reader::new(body);
        let version = reader.u8().map_err(malformed)?;
        let (algorithm, hash, trailer, issuer) = match version {
            3 => {
                if reader.u8().map_err(malformed)? != 5 {
                    return Err(malformed("bad v3 hashed length"));
                }
                let hashed = reader.take(5).map_err(malformed)?;
                let issuer = to_key_id(reader.take(8).map_err(malformed)?);
                let algorithm = reader.u8().map_err(malformed)?;
                let hash = reader.u8().map_err(malformed)?;
                (algorithm, hash, hashed.to_vec(), issuer)
            }
            4 => {
                reader.u8().map_err(malformed)?; // signature type
                let algorithm = reader.u8().map_err(malformed)?;
                let hash = reader.u8().map_err(malformed)?;
                let hashed_len = usize::from(reader.u16().map_err(malformed)?);
                let hashed = reader.take(hashed_len).map_err(malformed)?;
                let unhashed_len = usize::from(reader.u16().map_err(malformed)?);
                let unhashed = reader.take(unhashed_len).map_err(malformed)?;

                let region = &body[..6 + hashed_len];
                let mut trailer = region.to_vec();
                trailer.extend_from_slice(&[4, 0xff]);
                trailer.extend_from_slice(&(region.len() as u32).to_be_bytes());

                let issuer = find_issuer(hashed).or_else(|| find_issuer(unhashed));
                (algorithm, hash, trailer, issuer)
            }
            other => {
                return Err(SignatureError::Unsupported(format!(
                    "signature version {}",
                    other
                )))
            }
        };

        if algorithm != ALGO_RSA && algorithm != ALGO_RSA_SIGN_ONLY {
            return Err(SignatureError::Unsupported(format!(
                "public-key algorithm {}",
                algorithm
            )));
        }
        let hash = HashAlgorithm::from_id(hash)?;
        let left = reader.take(2).map_err(malformed)?;
        let value = reader.mpi().map_err(malformed)?.to_vec();

        Ok(Self {
            hash,
            trailer,
            left16: [left[0], left[1]],
            value,
            issuer,
        })
    }
}

fn to_key_id(bytes: &[u8]) -> Option<[u8; 8]> {
    bytes.try_into().ok()
}

fn find_issuer(mut subpackets: &[u8]) -> Option<[u8; 8]> {
    while let Some((&first, rest)) = subpackets.split_first() {
        let (len, rest) = match first {
            0..=191 => (usize::from(first), rest),
            192..=254 => {
                let (&second, rest) = rest.split_first()?;
                (((usize::from(first) - 192) << 8) + usize::from(second) + 192, rest)
            }
            255 => {
                let b = rest.get(..4)?;
                (
                    u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize,
                    &rest[4..],
                )
            }
        };
        let packet = rest.get(..len)?;
        subpackets = &rest[len..];

        let Some((&kind, data)) = packet.split_first() else {
            continue;
        };
        match kind & 0x7f {
            SUBPACKET_ISSUER => return to_key_id(data),
            // version byte, then the fingerprint; the key id is its tail
            SUBPACKET_ISSUER_FINGERPRINT if data.len() >= 9 => {
                return to_key_id(&data[data.len() - 8..])
            }
            _ => {}
        }
    }
    None
}

/// Signature values may be shorter than the modulus.
fn left_pad(value: &[u8], size: usize) -> Option<Vec<u8>> {
    if value.len() > size {
        return None;
    }
    let mut padded = vec![0u8; size - value.len()];
    padded.extend_from_slice(value);
    Some(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{PackageSigner, SourceRpmBuilder};

    #[test]
    fn test_crc24_known_value() {
        // Check value of the OpenPGP CRC-24 for "123456789"
        assert_eq!(crc24(b"123456789"), 0x21CF02);
    }

    #[test]
    fn test_verify_signed_package() {
        let signer = PackageSigner::test_key();
        let keys = signer.trusted_keys();
        assert_eq!(keys.key_count(), 1);

        let bytes = SourceRpmBuilder::new("efi-rpm-macros", "3", "3.el8")
            .signed_by(&signer)
            .build();
        keys.verify_package(&bytes).unwrap();
    }

    #[test]
    fn test_unsigned_package_rejected() {
        let keys = PackageSigner::test_key().trusted_keys();
        let bytes = SourceRpmBuilder::new("evil", "1", "1").build();
        assert_eq!(keys.verify_package(&bytes), Err(SignatureError::Unsigned));

        let padded = SourceRpmBuilder::new("evil", "1", "1")
            .signature_padding(true)
            .build();
        assert_eq!(keys.verify_package(&padded), Err(SignatureError::Unsigned));
    }

    #[test]
    fn test_tampered_header_rejected() {
        let signer = PackageSigner::test_key();
        let mut bytes = SourceRpmBuilder::new("bash", "4.4.20", "4.el8")
            .signed_by(&signer)
            .build();
        // The release string is the last thing in the main header store.
        let at = bytes.len() - 2;
        bytes[at] = b'9';

        let err = signer.trusted_keys().verify_package(&bytes).unwrap_err();
        assert_eq!(err, SignatureError::DigestMismatch);
        let service: ServiceError = err.into();
        assert!(matches!(service, ServiceError::SignatureVerification(_)));
        assert!(!service.is_retryable());
    }

    #[test]
    fn test_armor_checksum_checked() {
        let armored = PackageSigner::test_key().armored_public_key();
        let broken: String = armored
            .lines()
            .map(|line| match line.strip_prefix('=') {
                Some(_) => "=AAAA".to_string(),
                None => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(
            TrustedKeys::from_armored(&broken).unwrap_err(),
            SignatureError::MalformedKeyBlock("armor checksum mismatch")
        );
        assert_eq!(
            TrustedKeys::from_armored("not a key").unwrap_err(),
            SignatureError::MalformedKeyBlock("no public key block found")
        );
    }

    #[test]
    fn test_find_issuer_in_subpackets() {
        let mut subpackets = vec![5, 2, 0, 0, 0, 1];
        subpackets.extend_from_slice(&[9, SUBPACKET_ISSUER, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(find_issuer(&subpackets), Some([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(find_issuer(&[5, 2, 0, 0, 0, 1]), None);
    }

    #[test]
    fn test_left_pad() {
        assert_eq!(left_pad(&[1, 2], 4), Some(vec![0, 0, 1, 2]));
        assert_eq!(left_pad(&[1, 2, 3], 2), None);
    }
}
