//! Catalogs — read-only cards and paths loaded from the precomputed corpus.
//!
//! Both catalogs are built from a definition table and a matching embeddings
//! table keyed by the same ids. Loading is all-or-nothing: any missing or
//! ragged embedding aborts startup with a `LoadError`.

pub mod cards;
pub mod field;
pub mod matrix;
pub mod paths;
pub mod validation;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::cards::CardCatalog;
use crate::catalog::matrix::RaggedRows;
use crate::catalog::paths::PathCatalog;
use crate::catalog::validation::{check_catalogs, ensure_compatible_dimensions};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing embedding for {kind} '{id}'")]
    MissingEmbedding { kind: &'static str, id: String },

    #[error("Path '{path_id}' has {layers} {kind} layers but only {embeddings} embeddings")]
    LayerEmbeddingCount {
        path_id: String,
        kind: &'static str,
        layers: usize,
        embeddings: usize,
    },

    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Ragged {what} embeddings: {source}")]
    Ragged {
        what: &'static str,
        #[source]
        source: RaggedRows,
    },

    #[error("Card embeddings have dimension {cards}, layer embeddings have dimension {layers}")]
    DimensionMismatch { cards: usize, layers: usize },
}

/// Both catalogs of one planning run.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub cards: CardCatalog,
    pub paths: PathCatalog,
}

/// Loads and validates the card and path catalogs from the configured files.
///
/// Dangling references and similar findings are logged as warnings; a
/// dimensionality mismatch between the two catalogs is fatal.
pub fn load_catalogs(config: &Config) -> Result<Catalogs, LoadError> {
    let cards = CardCatalog::load(&config.cards_file(), &config.cards_embeddings_file())?;
    info!(
        "Loaded {} cards (dimension {})",
        cards.len(),
        cards.embeddings().dim()
    );

    let paths = PathCatalog::load(&config.guides_file(), &config.guides_embeddings_file())?;
    info!(
        "Loaded {} paths with {} expertise and {} collaboration layers",
        paths.paths().len(),
        paths.expertise().len(),
        paths.collaboration().len()
    );

    ensure_compatible_dimensions(&cards, &paths)?;

    for warning in check_catalogs(&cards, &paths) {
        warn!("{}", warning.description);
    }

    Ok(Catalogs { cards, paths })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LoadError> {
    let raw = serde_json::to_string(value).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, raw).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
