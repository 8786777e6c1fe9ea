//! Path Catalog — career paths made of expertise and collaboration layers.
//!
//! Each layer carries its own aggregate embedding (computed offline). The
//! catalog concatenates every path's layer embeddings per kind, in path order
//! then layer order, and keeps a parallel list of positions so a row index
//! maps back to its `(path, layer)`.

use std::fmt;
use std::path::Path as FsPath;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::field::Field;
use crate::catalog::matrix::EmbeddingMatrix;
use crate::catalog::{read_json, LoadError};

const PRIORITY_KEY: &str = "priority";

// ────────────────────────────────────────────────────────────────────────────
// Definitions (on-disk shape)
// ────────────────────────────────────────────────────────────────────────────

/// A layer's reference to a card: `{ "<card-id>": null, "priority": 10 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRef {
    pub card_id: String,
    pub priority: Option<i64>,
}

impl CardRef {
    /// Missing priority ranks lowest.
    pub fn priority_or_default(&self) -> i64 {
        self.priority.unwrap_or(0)
    }
}

impl<'de> Deserialize<'de> for CardRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, Value>::deserialize(deserializer)?;

        let Some(card_id) = map.keys().find(|k| k.as_str() != PRIORITY_KEY).cloned() else {
            return Err(<D::Error as de::Error>::custom(
                "card reference without a card id",
            ));
        };

        let priority = match map.get(PRIORITY_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(p) => Some(p),
                Err(_) => {
                    return Err(<D::Error as de::Error>::custom(format!(
                        "invalid priority '{s}' for card '{card_id}'"
                    )))
                }
            },
            Some(other) => {
                return Err(<D::Error as de::Error>::custom(format!(
                    "invalid priority {other} for card '{card_id}'"
                )))
            }
        };

        Ok(CardRef { card_id, priority })
    }
}

impl Serialize for CardRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.priority.is_some() { 2 } else { 1 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(&self.card_id, &Value::Null)?;
        if let Some(priority) = self.priority {
            map.serialize_entry(PRIORITY_KEY, &priority)?;
        }
        map.end()
    }
}

/// One expertise or collaboration layer as stored in `guides.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub cards: Field<Vec<CardRef>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl LayerDefinition {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn cards(&self) -> &[CardRef] {
        self.cards.as_slice()
    }
}

/// Path (guide) definition as stored in `guides.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathDefinition {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub tags: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub expertise: Field<Vec<LayerDefinition>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub collaboration: Field<Vec<LayerDefinition>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl PathDefinition {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_slice()
    }

    pub fn layers(&self, kind: LayerKind) -> &[LayerDefinition] {
        match kind {
            LayerKind::Expertise => self.expertise.as_slice(),
            LayerKind::Collaboration => self.collaboration.as_slice(),
        }
    }
}

/// Per-path layer embeddings as stored in `guides_embedding.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerEmbeddings {
    #[serde(default)]
    pub expertise: Vec<Vec<f64>>,
    #[serde(default)]
    pub collaboration: Vec<Vec<f64>>,
}

impl LayerEmbeddings {
    pub fn get(&self, kind: LayerKind) -> &[Vec<f64>] {
        match kind {
            LayerKind::Expertise => &self.expertise,
            LayerKind::Collaboration => &self.collaboration,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Expertise,
    Collaboration,
}

impl LayerKind {
    pub const ALL: [LayerKind; 2] = [LayerKind::Expertise, LayerKind::Collaboration];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Expertise => "expertise",
            LayerKind::Collaboration => "collaboration",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub cards: Vec<CardRef>,
    pub embedding: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Path {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub expertise: Vec<Layer>,
    pub collaboration: Vec<Layer>,
    expertise_embeddings: EmbeddingMatrix,
    collaboration_embeddings: EmbeddingMatrix,
}

impl Path {
    pub fn new(
        id: String,
        name: String,
        tags: Vec<String>,
        expertise: Vec<Layer>,
        collaboration: Vec<Layer>,
    ) -> Result<Self, LoadError> {
        let expertise_embeddings = stack_layers(&expertise)?;
        let collaboration_embeddings = stack_layers(&collaboration)?;
        Ok(Self {
            id,
            name,
            tags,
            expertise,
            collaboration,
            expertise_embeddings,
            collaboration_embeddings,
        })
    }

    pub fn layers(&self, kind: LayerKind) -> &[Layer] {
        match kind {
            LayerKind::Expertise => &self.expertise,
            LayerKind::Collaboration => &self.collaboration,
        }
    }

    pub fn embeddings(&self, kind: LayerKind) -> &EmbeddingMatrix {
        match kind {
            LayerKind::Expertise => &self.expertise_embeddings,
            LayerKind::Collaboration => &self.collaboration_embeddings,
        }
    }
}

fn stack_layers(layers: &[Layer]) -> Result<EmbeddingMatrix, LoadError> {
    EmbeddingMatrix::from_rows(layers.iter().map(|l| l.embedding.as_slice())).map_err(|source| {
        LoadError::Ragged {
            what: "layer",
            source,
        }
    })
}

/// Position of a flattened layer row: owning path and layer within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPosition {
    pub path: usize,
    pub layer: usize,
}

/// Catalog-wide layers of one kind: positions aligned with matrix rows.
#[derive(Debug, Clone, Default)]
pub struct LayerIndex {
    positions: Vec<LayerPosition>,
    embeddings: EmbeddingMatrix,
}

impl LayerIndex {
    pub fn positions(&self) -> &[LayerPosition] {
        &self.positions
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A resolved layer together with its owning path.
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    pub path: &'a Path,
    pub layer: &'a Layer,
    pub kind: LayerKind,
}

#[derive(Debug, Clone, Default)]
pub struct PathCatalog {
    paths: Vec<Path>,
    expertise: LayerIndex,
    collaboration: LayerIndex,
}

impl PathCatalog {
    pub fn new(paths: Vec<Path>) -> Result<Self, LoadError> {
        let expertise = index_layers(&paths, LayerKind::Expertise)?;
        let collaboration = index_layers(&paths, LayerKind::Collaboration)?;
        Ok(Self {
            paths,
            expertise,
            collaboration,
        })
    }

    /// Loads `guides.json` and `guides_embedding.json`.
    pub fn load(guides_file: &FsPath, embeddings_file: &FsPath) -> Result<Self, LoadError> {
        let definitions: IndexMap<String, PathDefinition> = read_json(guides_file)?;
        let embeddings: IndexMap<String, LayerEmbeddings> = read_json(embeddings_file)?;
        Self::from_tables(definitions, embeddings)
    }

    /// Joins path definitions with their layer embeddings, in definition
    /// order. The i-th layer of each kind takes the i-th embedding of that
    /// kind; a path with fewer embeddings than layers is a load error.
    pub fn from_tables(
        definitions: IndexMap<String, PathDefinition>,
        embeddings: IndexMap<String, LayerEmbeddings>,
    ) -> Result<Self, LoadError> {
        let empty = LayerEmbeddings::default();
        let mut paths = Vec::with_capacity(definitions.len());

        for (id, definition) in definitions {
            let has_layers = LayerKind::ALL
                .iter()
                .any(|&kind| !definition.layers(kind).is_empty());
            let path_embeddings = match embeddings.get(&id) {
                Some(e) => e,
                None if has_layers => {
                    return Err(LoadError::MissingEmbedding { kind: "path", id });
                }
                None => &empty,
            };

            let expertise = build_layers(&id, LayerKind::Expertise, &definition, path_embeddings)?;
            let collaboration =
                build_layers(&id, LayerKind::Collaboration, &definition, path_embeddings)?;

            paths.push(Path::new(
                id,
                definition.name().to_string(),
                definition.tags().to_vec(),
                expertise,
                collaboration,
            )?);
        }

        Self::new(paths)
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn expertise(&self) -> &LayerIndex {
        &self.expertise
    }

    pub fn collaboration(&self) -> &LayerIndex {
        &self.collaboration
    }

    pub fn layers(&self, kind: LayerKind) -> &LayerIndex {
        match kind {
            LayerKind::Expertise => &self.expertise,
            LayerKind::Collaboration => &self.collaboration,
        }
    }

    /// Resolves a flattened row index of the given kind.
    pub fn layer_at(&self, kind: LayerKind, row: usize) -> Option<LayerRef<'_>> {
        let position = self.layers(kind).positions.get(row)?;
        let path = self.paths.get(position.path)?;
        let layer = path.layers(kind).get(position.layer)?;
        Some(LayerRef { path, layer, kind })
    }

    /// Shared layer embedding dimensionality, if any layer exists.
    pub fn dim(&self) -> Option<usize> {
        LayerKind::ALL
            .iter()
            .map(|&kind| self.layers(kind).embeddings())
            .find(|m| !m.is_empty())
            .map(EmbeddingMatrix::dim)
    }
}

fn build_layers(
    path_id: &str,
    kind: LayerKind,
    definition: &PathDefinition,
    embeddings: &LayerEmbeddings,
) -> Result<Vec<Layer>, LoadError> {
    let layers = definition.layers(kind);
    let vectors = embeddings.get(kind);

    if vectors.len() < layers.len() {
        return Err(LoadError::LayerEmbeddingCount {
            path_id: path_id.to_string(),
            kind: kind.as_str(),
            layers: layers.len(),
            embeddings: vectors.len(),
        });
    }

    layers
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (layer, embedding))| {
            if embedding.is_empty() {
                return Err(LoadError::MissingEmbedding {
                    kind: "layer",
                    id: format!("{path_id}/{kind}[{i}]"),
                });
            }
            Ok(Layer {
                name: layer.name().to_string(),
                cards: layer.cards().to_vec(),
                embedding: embedding.clone(),
            })
        })
        .collect()
}

fn index_layers(paths: &[Path], kind: LayerKind) -> Result<LayerIndex, LoadError> {
    let positions = paths
        .iter()
        .enumerate()
        .flat_map(|(p, path)| {
            (0..path.layers(kind).len()).map(move |l| LayerPosition { path: p, layer: l })
        })
        .collect();

    let embeddings = EmbeddingMatrix::concat(paths.iter().map(|p| p.embeddings(kind)))
        .map_err(|source| LoadError::Ragged {
            what: "layer",
            source,
        })?;

    Ok(LayerIndex {
        positions,
        embeddings,
    })
}
