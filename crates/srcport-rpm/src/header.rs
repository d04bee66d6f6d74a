//! Minimal reader for the RPM v3 lead and header sections
//!
//! Only the identity tags are decoded. Layout: a 96-byte lead, then the
//! signature header padded to an 8-byte boundary, then the main header.
//! Each header is `magic(3) version(1) reserved(4) nindex(4) hsize(4)`
//! followed by `nindex` 16-byte index entries and `hsize` bytes of data.

use srcport_core::ServiceError;
use thiserror::Error;

pub(crate) const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
pub(crate) const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];
pub(crate) const LEAD_SIZE: usize = 96;
pub(crate) const HEADER_INTRO_SIZE: usize = 16;
pub(crate) const INDEX_ENTRY_SIZE: usize = 16;

pub(crate) const TAG_NAME: u32 = 1000;
pub(crate) const TAG_VERSION: u32 = 1001;
pub(crate) const TAG_RELEASE: u32 = 1002;
pub(crate) const TAG_EPOCH: u32 = 1003;
pub(crate) const TAG_ARCH: u32 = 1022;
pub(crate) const TAG_SOURCERPM: u32 = 1044;

pub(crate) const TYPE_INT32: u32 = 4;
pub(crate) const TYPE_STRING: u32 = 6;
pub(crate) const TYPE_BIN: u32 = 7;
pub(crate) const TYPE_I18NSTRING: u32 = 9;

// Signature header tags. RSAHEADER covers the main header only, PGP covers
// the main header and the payload.
pub(crate) const SIGTAG_RSAHEADER: u32 = 268;
pub(crate) const SIGTAG_SHA256: u32 = 273;
pub(crate) const SIGTAG_PGP: u32 = 1002;

// Sanity bounds; real headers are far below these.
const MAX_INDEX_ENTRIES: usize = 1 << 16;
const MAX_DATA_SIZE: usize = 256 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RpmHeaderError {
    #[error("not an RPM package (bad lead magic)")]
    BadLeadMagic,

    #[error("corrupt {section} header (bad magic)")]
    BadHeaderMagic { section: &'static str },

    #[error("package truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{section} header is implausibly large")]
    Oversized { section: &'static str },

    #[error("required tag {0} missing from header")]
    MissingTag(&'static str),

    #[error("tag {tag} has unexpected type {kind}")]
    UnexpectedType { tag: u32, kind: u32 },
}

impl From<RpmHeaderError> for ServiceError {
    fn from(error: RpmHeaderError) -> Self {
        ServiceError::InvalidPackage(error.to_string())
    }
}

/// Identity of a package as recorded in its header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
    pub arch: Option<String>,
    /// Source RPMs carry no SOURCERPM tag; binary packages name their source
    pub source_rpm: Option<String>,
}

impl PackageHeader {
    pub fn parse(content: &[u8]) -> Result<Self, RpmHeaderError> {
        let main = Sections::read(content)?.main;

        Ok(PackageHeader {
            name: main.required_string(TAG_NAME, "NAME")?,
            version: main.required_string(TAG_VERSION, "VERSION")?,
            release: main.required_string(TAG_RELEASE, "RELEASE")?,
            epoch: main.int32(TAG_EPOCH)?,
            arch: main.string(TAG_ARCH)?,
            source_rpm: main.string(TAG_SOURCERPM)?,
        })
    }

    pub fn is_source(&self) -> bool {
        self.source_rpm.is_none()
    }

    /// `<name>-<version>-<release>.src`, the identifier entries are keyed by.
    /// The arch component is always replaced by `src`.
    pub fn source_entry_id(&self) -> String {
        format!("{}-{}-{}.src", self.name, self.version, self.release)
    }

    /// Full `name-epoch:version-release.arch` form
    pub fn nevra(&self) -> String {
        let arch = if self.is_source() {
            "src"
        } else {
            self.arch.as_deref().unwrap_or("noarch")
        };
        format!(
            "{}-{}:{}-{}.{}",
            self.name,
            self.epoch.unwrap_or(0),
            self.version,
            self.release,
            arch
        )
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// The two headers of a package, plus the byte ranges signatures cover
pub(crate) struct Sections<'a> {
    pub(crate) signature: RawHeader<'a>,
    pub(crate) main: RawHeader<'a>,
    /// The main header exactly as stored
    pub(crate) main_bytes: &'a [u8],
    /// The main header followed by the payload
    pub(crate) main_and_payload: &'a [u8],
}

impl<'a> Sections<'a> {
    pub(crate) fn read(content: &'a [u8]) -> Result<Self, RpmHeaderError> {
        if content.len() < LEAD_SIZE {
            return Err(RpmHeaderError::Truncated("lead"));
        }
        if content[..4] != LEAD_MAGIC {
            return Err(RpmHeaderError::BadLeadMagic);
        }

        let signature = RawHeader::read(&content[LEAD_SIZE..], "signature")?;
        let main_offset = LEAD_SIZE + align8(signature.total_len);
        if content.len() < main_offset {
            return Err(RpmHeaderError::Truncated("signature padding"));
        }
        let main_and_payload = &content[main_offset..];
        let main = RawHeader::read(main_and_payload, "main")?;

        Ok(Sections {
            main_bytes: &main_and_payload[..main.total_len],
            main_and_payload,
            signature,
            main,
        })
    }
}

struct IndexEntry {
    tag: u32,
    kind: u32,
    offset: usize,
    count: usize,
}

pub(crate) struct RawHeader<'a> {
    entries: Vec<IndexEntry>,
    store: &'a [u8],
    total_len: usize,
}

impl<'a> RawHeader<'a> {
    fn read(bytes: &'a [u8], section: &'static str) -> Result<Self, RpmHeaderError> {
        if bytes.len() < HEADER_INTRO_SIZE {
            return Err(RpmHeaderError::Truncated(section));
        }
        if bytes[..3] != HEADER_MAGIC {
            return Err(RpmHeaderError::BadHeaderMagic { section });
        }

        let nindex = be_u32(bytes, 8) as usize;
        let hsize = be_u32(bytes, 12) as usize;
        if nindex > MAX_INDEX_ENTRIES || hsize > MAX_DATA_SIZE {
            return Err(RpmHeaderError::Oversized { section });
        }

        let store_start = HEADER_INTRO_SIZE + nindex * INDEX_ENTRY_SIZE;
        let total_len = store_start + hsize;
        if bytes.len() < total_len {
            return Err(RpmHeaderError::Truncated(section));
        }

        let entries = (0..nindex)
            .map(|i| {
                let at = HEADER_INTRO_SIZE + i * INDEX_ENTRY_SIZE;
                IndexEntry {
                    tag: be_u32(bytes, at),
                    kind: be_u32(bytes, at + 4),
                    offset: be_u32(bytes, at + 8) as usize,
                    count: be_u32(bytes, at + 12) as usize,
                }
            })
            .collect();

        Ok(RawHeader {
            entries,
            store: &bytes[store_start..total_len],
            total_len,
        })
    }

    fn find(&self, tag: u32) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    fn string(&self, tag: u32) -> Result<Option<String>, RpmHeaderError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.kind != TYPE_STRING && entry.kind != TYPE_I18NSTRING {
            return Err(RpmHeaderError::UnexpectedType {
                tag,
                kind: entry.kind,
            });
        }

        let tail = self
            .store
            .get(entry.offset..)
            .ok_or(RpmHeaderError::Truncated("string tag"))?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(RpmHeaderError::Truncated("string tag"))?;
        Ok(Some(String::from_utf8_lossy(&tail[..end]).into_owned()))
    }

    /// Raw bytes of a BIN tag
    pub(crate) fn binary(&self, tag: u32) -> Result<Option<&'a [u8]>, RpmHeaderError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.kind != TYPE_BIN {
            return Err(RpmHeaderError::UnexpectedType {
                tag,
                kind: entry.kind,
            });
        }
        let store: &'a [u8] = self.store;
        entry
            .offset
            .checked_add(entry.count)
            .and_then(|end| store.get(entry.offset..end))
            .map(Some)
            .ok_or(RpmHeaderError::Truncated("binary tag"))
    }

    fn required_string(&self, tag: u32, label: &'static str) -> Result<String, RpmHeaderError> {
        self.string(tag)?.ok_or(RpmHeaderError::MissingTag(label))
    }

    fn int32(&self, tag: u32) -> Result<Option<u32>, RpmHeaderError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.kind != TYPE_INT32 {
            return Err(RpmHeaderError::UnexpectedType {
                tag,
                kind: entry.kind,
            });
        }
        if entry.offset + 4 > self.store.len() {
            return Err(RpmHeaderError::Truncated("int32 tag"));
        }
        Ok(Some(be_u32(self.store, entry.offset)))
    }
}
