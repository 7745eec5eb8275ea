//! # Formats
//!
//! Binary snapshots and text renderings of stored links.

mod persistence;
mod text;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, links_from_bytes, links_to_bytes,
};
pub use text::format_structure;
