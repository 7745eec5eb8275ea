//! # Text Format
//!
//! Human-readable renderings of stored links.
//!
//! `format_structure` expands a link's source and target recursively:
//! `(1: 1 2)` with `(2: 1 1)` renders as `(1 (1 1))`.

use crate::primitives::MAX_STRUCTURE_DEPTH;
use crate::store::LinkStore;
use crate::{Address, LinkError};

/// Render the nested structure of the link at `index`.
///
/// - A point (`i = s = t`) renders as its bare index.
/// - A side that references the link itself renders as the bare index.
/// - A reference to a missing link renders as the bare number.
/// - Expansion stops at `MAX_STRUCTURE_DEPTH`.
pub fn format_structure<S: LinkStore + ?Sized>(
    store: &S,
    index: Address,
) -> Result<String, LinkError> {
    let link = store.get(index)?.ok_or(LinkError::NotFound(index))?;
    if link.is_point() {
        return Ok(index.to_string());
    }

    let mut out = String::new();
    out.push('(');
    write_side(store, index, link.source, 1, &mut out)?;
    out.push(' ');
    write_side(store, index, link.target, 1, &mut out)?;
    out.push(')');
    Ok(out)
}

fn write_side<S: LinkStore + ?Sized>(
    store: &S,
    parent: Address,
    address: Address,
    depth: usize,
    out: &mut String,
) -> Result<(), LinkError> {
    if address == parent || depth >= MAX_STRUCTURE_DEPTH {
        out.push_str(&address.to_string());
        return Ok(());
    }
    match store.get(address)? {
        Some(link) if !link.is_point() => {
            out.push('(');
            write_side(store, address, link.source, depth + 1, out)?;
            out.push(' ');
            write_side(store, address, link.target, depth + 1, out)?;
            out.push(')');
        }
        _ => out.push_str(&address.to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Links;
    use crate::{Flow, Link};

    fn store_with(contents: &[(Address, Address)]) -> Links {
        let mut links = Links::new();
        let mut silent = |_: Link, _: Link| Flow::Continue;
        for (source, target) in contents {
            links
                .create_and_update(*source, *target, &mut silent)
                .expect("create");
        }
        links
    }

    #[test]
    fn point_renders_bare() {
        let links = store_with(&[(1, 1)]);
        assert_eq!(format_structure(&links, 1).expect("format"), "1");
    }

    #[test]
    fn nested_renders_recursively() {
        let links = store_with(&[(1, 1), (2, 2), (1, 2), (3, 1)]);
        assert_eq!(format_structure(&links, 3).expect("format"), "(1 2)");
        assert_eq!(format_structure(&links, 4).expect("format"), "((1 2) 1)");
    }

    #[test]
    fn dangling_reference_renders_number() {
        let links = store_with(&[(7, 8)]);
        assert_eq!(format_structure(&links, 1).expect("format"), "(7 8)");
    }

    #[test]
    fn missing_root_is_not_found() {
        let links = Links::new();
        assert!(matches!(
            format_structure(&links, 1),
            Err(LinkError::NotFound(1))
        ));
    }
}
