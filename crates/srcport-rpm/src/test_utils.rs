//! Builders for synthetic RPM packages used in tests across the workspace
//!
//! The output is only as complete as [`crate::PackageHeader::parse`] and
//! [`crate::TrustedKeys::verify_package`] need: a lead, a signature header
//! and a main header with identity tags. There is no payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::header::{
    HEADER_MAGIC, LEAD_MAGIC, LEAD_SIZE, SIGTAG_RSAHEADER, SIGTAG_SHA256, TAG_ARCH, TAG_EPOCH,
    TAG_NAME, TAG_RELEASE, TAG_SOURCERPM, TAG_VERSION, TYPE_BIN, TYPE_INT32, TYPE_STRING,
};
use crate::signature::{crc24, ALGO_RSA, HASH_SHA256, PACKET_PUBLIC_KEY, PACKET_SIGNATURE};
use crate::TrustedKeys;

const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/package_signing_key.pem");

// Fixed so that signed builds are byte-for-byte reproducible
const KEY_CREATED: u32 = 1_700_000_000;
const SIGNATURE_CREATED: u32 = 1_700_000_000;

enum Value {
    Str(String),
    Int32(u32),
    Bin(Vec<u8>),
}

#[derive(Default)]
struct HeaderWriter {
    index: Vec<u8>,
    store: Vec<u8>,
    count: u32,
}

impl HeaderWriter {
    fn push(&mut self, tag: u32, value: Value) {
        let (kind, offset, count) = match value {
            Value::Str(s) => {
                let offset = self.store.len();
                self.store.extend_from_slice(s.as_bytes());
                self.store.push(0);
                (TYPE_STRING, offset, 1)
            }
            Value::Int32(n) => {
                while self.store.len() % 4 != 0 {
                    self.store.push(0);
                }
                let offset = self.store.len();
                self.store.extend_from_slice(&n.to_be_bytes());
                (TYPE_INT32, offset, 1)
            }
            Value::Bin(bytes) => {
                let offset = self.store.len();
                self.store.extend_from_slice(&bytes);
                (TYPE_BIN, offset, bytes.len())
            }
        };
        self.index.extend_from_slice(&tag.to_be_bytes());
        self.index.extend_from_slice(&kind.to_be_bytes());
        self.index.extend_from_slice(&(offset as u32).to_be_bytes());
        self.index.extend_from_slice(&(count as u32).to_be_bytes());
        self.count += 1;
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.index.len() + self.store.len());
        out.extend_from_slice(&HEADER_MAGIC);
        out.push(1);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(&(self.store.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.index);
        out.extend_from_slice(&self.store);
        out
    }
}

/// Assembles the bytes of a minimal RPM package.
///
/// ```
/// use srcport_rpm::{test_utils::SourceRpmBuilder, PackageHeader};
///
/// let bytes = SourceRpmBuilder::new("efi-rpm-macros", "3", "3.el8").build();
/// let header = PackageHeader::parse(&bytes).unwrap();
/// assert_eq!(header.source_entry_id(), "efi-rpm-macros-3-3.el8.src");
/// ```
pub struct SourceRpmBuilder {
    name: String,
    version: String,
    release: String,
    epoch: Option<u32>,
    arch: Option<String>,
    source_rpm: Option<String>,
    signature_padding: bool,
    omit_name: bool,
    signer: Option<PackageSigner>,
}

impl SourceRpmBuilder {
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            epoch: None,
            arch: None,
            source_rpm: None,
            signature_padding: false,
            omit_name: false,
            signer: None,
        }
    }

    pub fn epoch(mut self, epoch: u32) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn arch(mut self, arch: &str) -> Self {
        self.arch = Some(arch.to_string());
        self
    }

    /// Marks the package as a binary built from `source_rpm`
    pub fn source_rpm(mut self, source_rpm: &str) -> Self {
        self.source_rpm = Some(source_rpm.to_string());
        self
    }

    /// Give the signature header an odd-sized store so the main header
    /// only starts after alignment padding
    pub fn signature_padding(mut self, enabled: bool) -> Self {
        self.signature_padding = enabled;
        self
    }

    pub fn omit_name(mut self) -> Self {
        self.omit_name = true;
        self
    }

    /// Sign the main header, as `rpmsign` does with `RSAHEADER`
    pub fn signed_by(mut self, signer: &PackageSigner) -> Self {
        self.signer = Some(signer.clone());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut lead = vec![0u8; LEAD_SIZE];
        lead[..4].copy_from_slice(&LEAD_MAGIC);
        lead[4] = 3;
        // type: 1 for source packages, 0 for binaries
        lead[7] = u8::from(self.source_rpm.is_none());
        let lead_name = format!("{}-{}-{}", self.name, self.version, self.release);
        let copy = lead_name.len().min(65);
        lead[10..10 + copy].copy_from_slice(&lead_name.as_bytes()[..copy]);

        let mut main = HeaderWriter::default();
        if !self.omit_name {
            main.push(TAG_NAME, Value::Str(self.name));
        }
        main.push(TAG_VERSION, Value::Str(self.version));
        main.push(TAG_RELEASE, Value::Str(self.release));
        if let Some(epoch) = self.epoch {
            main.push(TAG_EPOCH, Value::Int32(epoch));
        }
        if let Some(arch) = self.arch {
            main.push(TAG_ARCH, Value::Str(arch));
        }
        if let Some(source_rpm) = self.source_rpm {
            main.push(TAG_SOURCERPM, Value::Str(source_rpm));
        }

        let main = main.finish();

        let mut signature = HeaderWriter::default();
        if let Some(signer) = &self.signer {
            signature.push(SIGTAG_RSAHEADER, Value::Bin(signer.sign(&main)));
            signature.push(SIGTAG_SHA256, Value::Str(hex::encode(Sha256::digest(&main))));
        } else if self.signature_padding {
            signature.push(SIGTAG_SHA256, Value::Str("abc".to_string()));
        }
        let mut signature = signature.finish();
        while signature.len() % 8 != 0 {
            signature.push(0);
        }

        let mut out = lead;
        out.extend_from_slice(&signature);
        out.extend_from_slice(&main);
        out
    }
}

/// Shorthand for a source package with the given identity, signed by
/// [`PackageSigner::test_key`].
pub fn build_source_rpm(name: &str, version: &str, release: &str) -> Vec<u8> {
    SourceRpmBuilder::new(name, version, release)
        .signed_by(&PackageSigner::test_key())
        .build()
}

/// Signs synthetic packages with the RSA key under `tests/fixtures`
#[derive(Clone)]
pub struct PackageSigner {
    key: RsaPrivateKey,
}

impl PackageSigner {
    pub fn test_key() -> Self {
        let key = RsaPrivateKey::from_pkcs1_pem(SIGNING_KEY_PEM)
            .expect("fixture signing key is valid PKCS#1");
        Self { key }
    }

    /// The signer's public key as an armored OpenPGP key block
    pub fn armored_public_key(&self) -> String {
        let mut body = vec![4];
        body.extend_from_slice(&KEY_CREATED.to_be_bytes());
        body.push(ALGO_RSA);
        write_mpi(&mut body, &self.key.n().to_bytes_be());
        write_mpi(&mut body, &self.key.e().to_bytes_be());
        let data = packet(PACKET_PUBLIC_KEY, &body);

        let encoded = STANDARD.encode(&data);
        let mut out = String::from("-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n");
        for start in (0..encoded.len()).step_by(64) {
            out.push_str(&encoded[start..(start + 64).min(encoded.len())]);
            out.push('\n');
        }
        out.push('=');
        out.push_str(&STANDARD.encode(&crc24(&data).to_be_bytes()[1..]));
        out.push_str("\n-----END PGP PUBLIC KEY BLOCK-----\n");
        out
    }

    /// A trusted key set holding only this signer
    pub fn trusted_keys(&self) -> TrustedKeys {
        TrustedKeys::from_armored(&self.armored_public_key()).expect("signer key loads")
    }

    /// v4 binary-document signature packet over `data`
    fn sign(&self, data: &[u8]) -> Vec<u8> {
        // creation time subpacket
        let mut hashed = vec![5, 2];
        hashed.extend_from_slice(&SIGNATURE_CREATED.to_be_bytes());

        let mut body = vec![4, 0x00, ALGO_RSA, HASH_SHA256];
        body.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
        body.extend_from_slice(&hashed);

        let digest = Sha256::new()
            .chain_update(data)
            .chain_update(&body)
            .chain_update([4u8, 0xff])
            .chain_update((body.len() as u32).to_be_bytes())
            .finalize();
        let value = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .expect("fixture key signs");

        // no unhashed subpackets
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&digest[..2]);
        write_mpi(&mut body, &value);
        packet(PACKET_SIGNATURE, &body)
    }
}

fn write_mpi(out: &mut Vec<u8>, value: &[u8]) {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let value = &value[start..];
    let bits = value
        .first()
        .map_or(0, |b| value.len() * 8 - b.leading_zeros() as usize);
    out.extend_from_slice(&(bits as u16).to_be_bytes());
    out.extend_from_slice(value);
}

/// Old-format packet with a two-octet length
fn packet(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | (tag << 2) | 1];
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}
