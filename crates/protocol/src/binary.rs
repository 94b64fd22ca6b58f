//! Length-prefixed binary frames.
//!
//! Two layouts share the wire. The preferred one carries a version header:
//!
//! ```text
//! [u32 BE version_len][version][u32 BE type_len][type][payload...]
//! ```
//!
//! The legacy one starts straight at the type:
//!
//! ```text
//! [u32 BE type_len][type][payload...]
//! ```
//!
//! A short leading length whose bytes parse as semver selects the versioned
//! layout. Very old producers sent a bare ZIP with no header at all; those
//! frames begin with the ZIP magic, which reads as an absurd length, and are
//! taken as a flags archive.

use crate::error::{ProtocolError, Result};
use crate::version;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// A length field above this cannot be a real header.
const MAX_HEADER_FIELD: usize = 10 * 1024 * 1024;

/// Longest version string worth attempting to parse as semver.
const MAX_VERSION_LEN: usize = 20;

/// Payload kind of a binary frame, decoded from its type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryKind {
    DatabaseZip,
    FlagsZip,
    LogosZip,
    PicturesZip,
    TranslationsZip,
    /// Unrecognized type name; the hub logs and drops these.
    Unknown(String),
}

impl BinaryKind {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "database_zip" | "database" => Self::DatabaseZip,
            "flags_zip" | "flags" => Self::FlagsZip,
            "logos_zip" => Self::LogosZip,
            "pictures_zip" | "pictures" => Self::PicturesZip,
            "translations_zip" => Self::TranslationsZip,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::DatabaseZip => "database_zip",
            Self::FlagsZip => "flags_zip",
            Self::LogosZip => "logos_zip",
            Self::PicturesZip => "pictures_zip",
            Self::TranslationsZip => "translations_zip",
            Self::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinaryFrame {
    /// Announced protocol version; `None` on the legacy layouts.
    pub version: Option<String>,
    pub kind: BinaryKind,
    pub payload: Vec<u8>,
}

impl BinaryFrame {
    pub fn decode(buf: &[u8]) -> Result<BinaryFrame> {
        let first_len = read_len(buf, 0)?;

        if first_len > MAX_HEADER_FIELD {
            // No sane header. A bare ZIP's magic bytes read as a huge
            // length; accept those as a headerless flags archive.
            if buf[..4] == ZIP_MAGIC {
                return Ok(BinaryFrame {
                    version: None,
                    kind: BinaryKind::FlagsZip,
                    payload: buf.to_vec(),
                });
            }
            return Err(ProtocolError::Truncated("header length exceeds frame"));
        }

        if first_len <= MAX_VERSION_LEN {
            if let Ok(candidate) = read_str(buf, 4, first_len) {
                if version::parse(candidate).is_some() {
                    return Self::decode_versioned(buf, candidate, 4 + first_len);
                }
            }
        }

        // Legacy layout: the first field is the type name.
        let kind = read_str(buf, 4, first_len)?;
        Ok(BinaryFrame {
            version: None,
            kind: BinaryKind::from_wire(kind),
            payload: buf[4 + first_len..].to_vec(),
        })
    }

    fn decode_versioned(buf: &[u8], ver: &str, offset: usize) -> Result<BinaryFrame> {
        let type_len = read_len(buf, offset)?;
        let kind = read_str(buf, offset + 4, type_len)?;
        let payload_start = offset + 4 + type_len;
        Ok(BinaryFrame {
            version: Some(ver.to_string()),
            kind: BinaryKind::from_wire(kind),
            payload: buf[payload_start..].to_vec(),
        })
    }

    /// Encodes the versioned layout. Used by the feed tool and by tests.
    pub fn encode(version: &str, kind: &BinaryKind, payload: &[u8]) -> Vec<u8> {
        let kind = kind.as_wire().as_bytes();
        let mut out = Vec::with_capacity(8 + version.len() + kind.len() + payload.len());
        out.extend_from_slice(&(version.len() as u32).to_be_bytes());
        out.extend_from_slice(version.as_bytes());
        out.extend_from_slice(&(kind.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }
}

fn read_len(buf: &[u8], offset: usize) -> Result<usize> {
    let bytes = buf
        .get(offset..offset + 4)
        .ok_or(ProtocolError::Truncated("length field past end of frame"))?;
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if len == 0 {
        return Err(ProtocolError::ZeroLength);
    }
    Ok(len)
}

fn read_str(buf: &[u8], offset: usize, len: usize) -> Result<&str> {
    let bytes = buf
        .get(offset..offset + len)
        .ok_or(ProtocolError::Truncated("string field past end of frame"))?;
    std::str::from_utf8(bytes).map_err(|_| ProtocolError::TypeNotUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_frame(kind: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(kind.len() as u32).to_be_bytes());
        out.extend_from_slice(kind.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_versioned_layout() {
        let buf = BinaryFrame::encode("64.1.0", &BinaryKind::LogosZip, b"zipbytes");
        let frame = BinaryFrame::decode(&buf).unwrap();
        assert_eq!(frame.version.as_deref(), Some("64.1.0"));
        assert_eq!(frame.kind, BinaryKind::LogosZip);
        assert_eq!(frame.payload, b"zipbytes");
    }

    #[test]
    fn test_legacy_layout() {
        let buf = legacy_frame("flags_zip", b"payload");
        let frame = BinaryFrame::decode(&buf).unwrap();
        assert_eq!(frame.version, None);
        assert_eq!(frame.kind, BinaryKind::FlagsZip);
        assert_eq!(frame.payload, b"payload");
    }

    #[test]
    fn test_legacy_short_type_is_not_mistaken_for_version() {
        // "flags" is 5 bytes, under the version-length cutoff, but does not
        // parse as semver, so the legacy layout must win.
        let buf = legacy_frame("flags", b"x");
        let frame = BinaryFrame::decode(&buf).unwrap();
        assert_eq!(frame.kind, BinaryKind::FlagsZip);
        assert_eq!(frame.version, None);
    }

    #[test]
    fn test_bare_zip_fallback() {
        let mut buf = vec![0x50, 0x4B, 0x03, 0x04];
        buf.extend_from_slice(b"rest of archive");
        let frame = BinaryFrame::decode(&buf).unwrap();
        assert_eq!(frame.kind, BinaryKind::FlagsZip);
        assert_eq!(frame.payload, buf);
    }

    #[test]
    fn test_zero_length_is_protocol_error() {
        let buf = [0u8, 0, 0, 0, b'x'];
        assert!(matches!(
            BinaryFrame::decode(&buf),
            Err(ProtocolError::ZeroLength)
        ));
    }

    #[test]
    fn test_truncated_frame() {
        let buf = [0u8, 0, 0, 9, b'f', b'l'];
        assert!(matches!(
            BinaryFrame::decode(&buf),
            Err(ProtocolError::Truncated(_))
        ));
    }

    #[test]
    fn test_huge_length_without_magic() {
        let mut buf = (200_000_000u32).to_be_bytes().to_vec();
        buf.extend_from_slice(b"junk");
        assert!(matches!(
            BinaryFrame::decode(&buf),
            Err(ProtocolError::Truncated(_))
        ));
    }

    #[test]
    fn test_non_utf8_type_name() {
        let mut buf = (2u32).to_be_bytes().to_vec();
        buf.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(
            BinaryFrame::decode(&buf),
            Err(ProtocolError::TypeNotUtf8)
        ));
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let buf = legacy_frame("surprise_zip", b"");
        let frame = BinaryFrame::decode(&buf).unwrap();
        assert_eq!(frame.kind, BinaryKind::Unknown("surprise_zip".into()));
    }
}
