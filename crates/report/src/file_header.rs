// ---------------------------------------------------------------------------
// file_header – Binary report header with magic bytes, version, and checksum
// ---------------------------------------------------------------------------
//
// Header format (28 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "SGRP" (0x53475250)
//   [4..8]   Format version (u32)
//   [8..12]  Flags (u32: bit 0 = LZ4 compressed)
//   [12..20] Timestamp (Unix epoch, u64)
//   [20..24] Uncompressed payload size (u32)
//   [24..28] xxHash32 checksum of the payload as stored (everything after the header)
//
// On export: encode -> compress -> prepend header (checksum of stored bytes)
// On load: check magic -> check version -> validate checksum -> decompress -> decode

use xxhash_rust::xxh32::xxh32;

use crate::report_error::ReportError;

/// Magic bytes identifying a binary crisis report.
pub const MAGIC: [u8; 4] = *b"SGRP";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 28;

/// Layout version of the header itself, independent of the payload schema.
pub const HEADER_FORMAT_VERSION: u32 = 1;

/// Payload is LZ4 block-compressed with a prepended size.
pub const FLAG_COMPRESSED: u32 = 1;

const XXHASH_SEED: u32 = 0;

/// Parsed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub timestamp: u64,
    pub uncompressed_size: u32,
    pub checksum: u32,
}

impl FileHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.format_version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.checksum.to_le_bytes());
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Wrap a stored payload with a header.
///
/// `uncompressed_size` is the size of the payload before compression; equal
/// to `payload.len()` when `flags` has no compression bit.
pub fn wrap_with_header(payload: &[u8], flags: u32, uncompressed_size: usize) -> Vec<u8> {
    let header = FileHeader {
        format_version: HEADER_FORMAT_VERSION,
        flags,
        timestamp: unix_now(),
        uncompressed_size: uncompressed_size as u32,
        checksum: xxh32(payload, XXHASH_SEED),
    };
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    header.write_to(&mut out);
    out.extend_from_slice(payload);
    out
}

/// True if `bytes` start with the report magic.
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parse and validate the header, returning it with the stored payload.
///
/// # Errors
///
/// - `Corrupt` if the magic is missing, the buffer is shorter than the
///   header, or the checksum does not match
/// - `VersionMismatch` if the header was written by a newer build
pub fn unwrap_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), ReportError> {
    if !has_magic(bytes) {
        return Err(ReportError::Corrupt("missing SGRP magic bytes".into()));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(ReportError::Corrupt(format!(
            "file is too short ({} bytes, need at least {HEADER_SIZE} for header)",
            bytes.len()
        )));
    }

    let format_version = le_u32(bytes, 4);
    if format_version > HEADER_FORMAT_VERSION {
        return Err(ReportError::VersionMismatch {
            expected_max: HEADER_FORMAT_VERSION,
            found: format_version,
        });
    }
    let header = FileHeader {
        format_version,
        flags: le_u32(bytes, 8),
        timestamp: u64::from_le_bytes([
            bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
        ]),
        uncompressed_size: le_u32(bytes, 20),
        checksum: le_u32(bytes, 24),
    };

    let payload = &bytes[HEADER_SIZE..];
    let computed = xxh32(payload, XXHASH_SEED);
    if computed != header.checksum {
        return Err(ReportError::Corrupt(format!(
            "checksum mismatch (expected {:#010X}, got {computed:#010X})",
            header.checksum
        )));
    }
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_and_unwrap() {
        let data = b"crisis report payload";
        let wrapped = wrap_with_header(data, 0, data.len());

        assert_eq!(&wrapped[..4], b"SGRP");
        assert_eq!(wrapped.len(), HEADER_SIZE + data.len());

        let (header, payload) = unwrap_header(&wrapped).expect("unwrap should succeed");
        assert_eq!(header.format_version, HEADER_FORMAT_VERSION);
        assert!(!header.is_compressed());
        assert_eq!(header.uncompressed_size, data.len() as u32);
        assert_eq!(payload, data);
    }

    #[test]
    fn test_compressed_flag_and_size_survive() {
        let wrapped = wrap_with_header(b"xyz", FLAG_COMPRESSED, 4096);
        let (header, _) = unwrap_header(&wrapped).expect("unwrap should succeed");
        assert!(header.is_compressed());
        assert_eq!(header.uncompressed_size, 4096);
        assert!(header.timestamp > 0);
    }

    #[test]
    fn test_missing_magic_rejected() {
        let err = unwrap_header(b"{\"run_id\": 1}").unwrap_err();
        assert!(matches!(err, ReportError::Corrupt(_)), "got {err}");
        assert!(!has_magic(b"SG"));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut wrapped = wrap_with_header(b"test payload", 0, 12);
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;

        let err = unwrap_header(&wrapped).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"), "got {err}");
    }

    #[test]
    fn test_future_header_version_rejected() {
        let mut wrapped = wrap_with_header(b"test payload", 0, 12);
        wrapped[4..8].copy_from_slice(&999u32.to_le_bytes());

        match unwrap_header(&wrapped) {
            Err(ReportError::VersionMismatch { expected_max, found }) => {
                assert_eq!(expected_max, HEADER_FORMAT_VERSION);
                assert_eq!(found, 999);
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_header_detected() {
        let err = unwrap_header(b"SGRP\x01\x00").unwrap_err();
        assert!(err.to_string().contains("too short"), "got {err}");
    }

    #[test]
    fn test_empty_payload() {
        let wrapped = wrap_with_header(b"", 0, 0);
        assert_eq!(wrapped.len(), HEADER_SIZE);
        let (header, payload) = unwrap_header(&wrapped).expect("unwrap should succeed");
        assert_eq!(header.uncompressed_size, 0);
        assert!(payload.is_empty());
    }
}
