//! Corpus builder — turns the upstream guide repository into the four catalog
//! files the planner loads.
//!
//! Flow: download archive → extract → YAML sources → `cards.json` /
//! `guides.json` → embeddings (with retry on deadline errors).

pub mod collector;
pub mod embedding;

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::LoadError;
use crate::model_client::ModelError;

pub use collector::Collector;

/// Failure reading one YAML source file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} returned HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
