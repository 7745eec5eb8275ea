//! # Primitives
//!
//! Hardcoded constants for the linkdb CORE.
//!
//! ## Sentinels
//!
//! 1. **Null** (`NULL`): address 0, the void reference. Never a stored index.
//! 2. **Any** (`ANY`): the query-only wildcard. Never stored as data.

use crate::types::Address;

/// The void address.
///
/// - `Index = 0` means "no link".
/// - A source or target of 0 is legal data (an empty side).
pub const NULL: Address = 0;

/// The wildcard address.
///
/// - Matches any address in a scan restriction.
/// - Never appears in stored data; creating a link with an `ANY` side is rejected.
pub const ANY: Address = Address::MAX;

/// Magic bytes for the linkdb snapshot header.
///
/// - File Header = Magic Bytes ("LNKS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"LNKS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of query text accepted by the parser (1 MB).
pub const MAX_QUERY_LENGTH: usize = 1024 * 1024;

/// Maximum nesting depth of parenthesised groups.
///
/// The parser is recursive; this keeps the call stack bounded.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Maximum depth followed by the structure renderer before falling back to
/// the bare address.
pub const MAX_STRUCTURE_DEPTH: usize = 64;

/// Maximum number of intermediate links `ensure_created` may allocate while
/// reaching a requested address.
pub const MAX_ENSURE_CREATED_GAP: u64 = 1_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_distinct() {
        assert_ne!(NULL, ANY);
        assert_eq!(NULL, 0);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"LNKS");
    }
}
