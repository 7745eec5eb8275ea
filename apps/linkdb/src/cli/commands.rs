//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::{Backend, Settings};
use crate::render::{self, ChangeView, QueryReport, StatusReport, StructureReport};
use crate::tracer::TracingTracer;
use linkdb_core::{
    LinkError, LinkStore, QueryProcessor, StorageBackend, format_structure, links_from_bytes,
    links_to_bytes, simplify,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LinkError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LinkError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LinkError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path, rejecting anything that is not a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, LinkError> {
    let canonical = path.canonicalize().map_err(|e| {
        LinkError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LinkError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, LinkError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LinkError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(LinkError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LinkError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_output(text: &str) {
    print!("{}", text);
    if !text.is_empty() && !text.ends_with('\n') {
        println!();
    }
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Which sections `query` prints.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOutput {
    pub before: bool,
    pub changes: bool,
    pub after: bool,
    pub raw: bool,
}

/// Run a query.
///
/// Without any section flag the simplified changes are printed.
pub fn cmd_query(settings: &Settings, query: &str, output: QueryOutput) -> Result<(), LinkError> {
    let mut store = open_store(settings)?;
    let show_changes = output.changes || output.raw || !(output.before || output.after);

    let mut report = QueryReport::default();
    if output.before {
        report.before = Some(store.all()?);
    }

    let tracer = TracingTracer;
    let events = QueryProcessor::with_tracer(&tracer).process(&mut store, query)?;
    tracing::info!(events = events.len(), "query applied");

    let mutated = events.iter().any(|change| !change.is_unchanged());
    if mutated {
        save_store(&store, settings)?;
    }

    let changes = if output.raw { events } else { simplify(&events) };
    if show_changes {
        report.changes = Some(changes.iter().map(ChangeView::from).collect());
    }
    if output.after {
        report.after = Some(store.all()?);
    }

    if settings.json {
        println!("{}", render::to_json(&report)?);
    } else {
        print_output(&render::query_text(&report, &changes));
    }
    Ok(())
}

// =============================================================================
// STRUCTURE / LIST COMMANDS
// =============================================================================

/// Show the nested structure of a link.
pub fn cmd_structure(settings: &Settings, index: u64) -> Result<(), LinkError> {
    let store = open_store(settings)?;
    let link = store.get(index)?.ok_or(LinkError::NotFound(index))?;
    let structure = format_structure(&store, index)?;

    if settings.json {
        let report = StructureReport {
            index,
            link,
            structure,
        };
        println!("{}", render::to_json(&report)?);
    } else {
        println!("{}", structure);
    }
    Ok(())
}

/// Print every link.
pub fn cmd_list(settings: &Settings) -> Result<(), LinkError> {
    let store = open_store(settings)?;
    let links = store.all()?;

    if settings.json {
        println!("{}", render::to_json(&links)?);
    } else {
        print_output(&render::links_text(&links));
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show database status.
pub fn cmd_status(settings: &Settings) -> Result<(), LinkError> {
    let store = open_store(settings)?;
    let report = StatusReport {
        database: settings.database.to_string_lossy().into_owned(),
        backend: settings.backend,
        persistent: store.is_persistent(),
        link_count: store.count()?,
    };

    if settings.json {
        println!("{}", render::to_json(&report)?);
    } else {
        print_output(&render::status_text(&report));
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), LinkError> {
    let db_path = &settings.database;
    if settings.backend == Backend::Memory {
        println!("Memory backend keeps nothing on disk; nothing to initialize");
        return Ok(());
    }

    if db_path.exists() {
        if !force {
            return Err(LinkError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| LinkError::IoError(format!("Remove database: {}", e)))?;
        tracing::warn!(path = %db_path.display(), "existing database removed");
    }

    if settings.backend == Backend::Redb {
        let _store = StorageBackend::with_redb(db_path)?;
        println!("Initialized new redb database at {:?}", db_path);
    } else {
        save_store(&StorageBackend::default(), settings)?;
        println!("Initialized new file database at {:?}", db_path);
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export links to a snapshot file.
pub fn cmd_export(settings: &Settings, output: &Path) -> Result<(), LinkError> {
    let validated_output = validate_output_path(output)?;
    let store = open_store(settings)?;

    let data = links_to_bytes(&store.snapshot())?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| LinkError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Replace all links with the content of a snapshot file.
pub fn cmd_import(settings: &Settings, input: &Path) -> Result<(), LinkError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| LinkError::IoError(format!("Read file: {}", e)))?;
    let links = links_from_bytes(&data)?;
    let count = links.count()?;

    let mut store = open_store(settings)?;
    store.replace_all(links)?;
    save_store(&store, settings)?;

    println!("Imported {} links", count);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the store named by the settings.
///
/// The file backend starts empty when the snapshot does not exist yet.
pub fn open_store(settings: &Settings) -> Result<StorageBackend, LinkError> {
    let db_path = &settings.database;
    match settings.backend {
        Backend::Redb => StorageBackend::with_redb(db_path),
        Backend::Memory => Ok(StorageBackend::default()),
        Backend::File => {
            if !db_path.exists() {
                return Ok(StorageBackend::default());
            }
            validate_file_size(db_path, MAX_IMPORT_FILE_SIZE)?;
            let data = std::fs::read(db_path)
                .map_err(|e| LinkError::IoError(format!("Read db: {}", e)))?;
            Ok(StorageBackend::InMemory(links_from_bytes(&data)?))
        }
    }
}

/// Write the store back where the backend requires it.
pub fn save_store(store: &StorageBackend, settings: &Settings) -> Result<(), LinkError> {
    match settings.backend {
        // Redb commits every write; memory never persists.
        Backend::Redb | Backend::Memory => Ok(()),
        Backend::File => {
            let data = links_to_bytes(&store.snapshot())?;
            std::fs::write(&settings.database, data)
                .map_err(|e| LinkError::IoError(format!("Write db: {}", e)))
        }
    }
}
