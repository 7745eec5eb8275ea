//! # Persistence Format
//!
//! Binary serialization for link snapshots.
//!
//! File I/O operations are in the app layer.
//!
//! Format: Header (5 bytes) + postcard-serialized snapshot data.
//! - 4 bytes: Magic ("LNKS")
//! - 1 byte: Version
//!
//! The payload size and the header are validated before any decoding, and
//! the decoded links are re-checked against the store invariants.

use crate::store::Links;
use crate::{Address, Link, LinkError, primitives};
use serde::{Deserialize, Serialize};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum allowed size of snapshot data.
///
/// Validated before deserialization so corrupted data cannot force a huge
/// allocation.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Minimum valid file size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all snapshot data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), LinkError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LinkError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LinkError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LinkError> {
        if bytes.len() < MIN_FILE_SIZE {
            return Err(LinkError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// The serialized payload: allocation mark plus every stored link.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    allocated: Address,
    links: Vec<Link>,
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize links to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn links_to_bytes(links: &Links) -> Result<Vec<u8>, LinkError> {
    let header = PersistenceHeader::new();
    let snapshot = Snapshot {
        allocated: links.allocated(),
        links: links.iter().copied().collect(),
    };

    let payload = postcard::to_stdvec(&snapshot)
        .map_err(|e| LinkError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_FILE_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize links from bytes.
///
/// This is a pure transformation - no file I/O.
pub fn links_from_bytes(bytes: &[u8]) -> Result<Links, LinkError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(LinkError::SerializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(LinkError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_FILE_SIZE..];
    let snapshot: Snapshot = postcard::from_bytes(payload).map_err(|e| {
        LinkError::SerializationError(format!("Failed to deserialize link data: {}", e))
    })?;

    Links::from_parts(snapshot.links, snapshot.allocated)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Flow, LinkStore};

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let bytes = header.to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let mut links = Links::new();
        let mut silent = |_: Link, _: Link| Flow::Continue;
        links.create_and_update(1, 1, &mut silent).expect("create");
        links.create_and_update(2, 2, &mut silent).expect("create");
        links.create_and_update(1, 2, &mut silent).expect("create");
        links.delete(Link::empty(2), &mut silent).expect("delete");

        let bytes1 = links_to_bytes(&links).expect("first serialize");
        let restored = links_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = links_to_bytes(&restored).expect("second serialize");

        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
        assert_eq!(restored.allocated(), links.allocated());
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");

        let result = links_from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = links_to_bytes(&Links::new()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;

        let result = links_from_bytes(&bytes);
        assert!(matches!(result, Err(LinkError::SerializationError(_))));
    }

    #[test]
    fn runaway_allocation_mark_rejected() {
        let snapshot = Snapshot {
            allocated: Address::MAX - 1,
            links: Vec::new(),
        };
        let mut bytes = PersistenceHeader::new().to_bytes().to_vec();
        bytes.extend(postcard::to_stdvec(&snapshot).expect("encode"));

        let result = links_from_bytes(&bytes);
        assert!(matches!(result, Err(LinkError::SerializationError(_))));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(links_from_bytes(b"LNK").is_err());
    }
}
