//! Card Catalog — skill cards with objectives, resources and one embedding each.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::field::Field;
use crate::catalog::matrix::EmbeddingMatrix;
use crate::catalog::{read_json, write_json, LoadError};

/// Resource type tag marking a provider course.
pub const COURSE: &str = "COURSE";

// ────────────────────────────────────────────────────────────────────────────
// Definitions (on-disk shape)
// ────────────────────────────────────────────────────────────────────────────

/// A learning resource attached to a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type", default, skip_serializing_if = "Field::is_absent")]
    pub kind: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub title: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub link: Field<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Resource {
    pub fn kind(&self) -> &str {
        self.kind.as_str()
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn link(&self) -> &str {
        self.link.as_str()
    }

    pub fn is_course(&self) -> bool {
        self.kind() == COURSE
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.kind(), self.title(), self.link())
    }
}

/// Card definition as stored in `cards.json`.
///
/// Every field remembers whether it was missing, `null` or set, so that
/// re-serialising writes back exactly what was read. Readers go through the
/// accessors, which treat missing and `null` as empty. Fields this crate does
/// not interpret are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CardDefinition {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub short_description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub key_objectives: Field<Vec<String>>,
    #[serde(
        default,
        rename = "aditional-objectives",
        skip_serializing_if = "Field::is_absent"
    )]
    pub additional_objectives: Field<Vec<String>>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub contents: Field<Vec<Resource>>,
    #[serde(
        default,
        rename = "alura-contents",
        skip_serializing_if = "Field::is_absent"
    )]
    pub provider_contents: Field<Vec<Resource>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl CardDefinition {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn short_description(&self) -> &str {
        self.short_description.as_str()
    }

    pub fn key_objectives(&self) -> &[String] {
        self.key_objectives.as_slice()
    }

    pub fn additional_objectives(&self) -> &[String] {
        self.additional_objectives.as_slice()
    }

    pub fn resources(&self) -> &[Resource] {
        self.contents.as_slice()
    }

    pub fn provider_resources(&self) -> &[Resource] {
        self.provider_contents.as_slice()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub definition: CardDefinition,
    pub embedding: Vec<f64>,
}

impl Card {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn short_description(&self) -> &str {
        self.definition.short_description()
    }

    pub fn key_objectives(&self) -> &[String] {
        self.definition.key_objectives()
    }

    pub fn additional_objectives(&self) -> &[String] {
        self.definition.additional_objectives()
    }

    /// Generic references.
    pub fn resources(&self) -> &[Resource] {
        self.definition.resources()
    }

    /// Provider-specific offerings.
    pub fn provider_resources(&self) -> &[Resource] {
        self.definition.provider_resources()
    }

    pub fn courses(&self) -> impl Iterator<Item = &Resource> {
        self.provider_resources().iter().filter(|r| r.is_course())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CARD: {} - {}", self.name(), self.key_objectives().join("; "))
    }
}

/// Ordered cards plus their stacked embeddings in the same order.
#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    cards: Vec<Card>,
    embeddings: EmbeddingMatrix,
    index: HashMap<String, usize>,
}

impl CardCatalog {
    /// Builds a catalog. Ids must be unique and embeddings non-empty with one
    /// shared dimensionality.
    pub fn new(cards: Vec<Card>) -> Result<Self, LoadError> {
        let mut index = HashMap::with_capacity(cards.len());
        for (i, card) in cards.iter().enumerate() {
            if card.embedding.is_empty() {
                return Err(LoadError::MissingEmbedding {
                    kind: "card",
                    id: card.id.clone(),
                });
            }
            if index.insert(card.id.clone(), i).is_some() {
                return Err(LoadError::DuplicateId {
                    kind: "card",
                    id: card.id.clone(),
                });
            }
        }

        let embeddings = EmbeddingMatrix::from_rows(cards.iter().map(|c| c.embedding.as_slice()))
            .map_err(|source| LoadError::Ragged {
                what: "card",
                source,
            })?;

        Ok(Self {
            cards,
            embeddings,
            index,
        })
    }

    /// Loads `cards.json` and `cards_embedding.json`.
    pub fn load(cards_file: &Path, embeddings_file: &Path) -> Result<Self, LoadError> {
        let definitions: IndexMap<String, CardDefinition> = read_json(cards_file)?;
        let embeddings: IndexMap<String, Option<Vec<f64>>> = read_json(embeddings_file)?;
        Self::from_tables(definitions, embeddings)
    }

    /// Joins a definition table with its embeddings table, keeping the
    /// definition table's order. Every definition id needs a non-null entry.
    pub fn from_tables(
        definitions: IndexMap<String, CardDefinition>,
        mut embeddings: IndexMap<String, Option<Vec<f64>>>,
    ) -> Result<Self, LoadError> {
        let cards = definitions
            .into_iter()
            .map(|(id, definition)| {
                match embeddings.swap_remove(&id).flatten() {
                    Some(embedding) if !embedding.is_empty() => Ok(Card {
                        id,
                        definition,
                        embedding,
                    }),
                    _ => Err(LoadError::MissingEmbedding { kind: "card", id }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(cards)
    }

    /// Writes the catalog back as a definition/embedding file pair.
    pub fn save(&self, cards_file: &Path, embeddings_file: &Path) -> Result<(), LoadError> {
        let definitions: IndexMap<&str, &CardDefinition> = self
            .cards
            .iter()
            .map(|c| (c.id.as_str(), &c.definition))
            .collect();
        let embeddings: IndexMap<&str, &[f64]> = self
            .cards
            .iter()
            .map(|c| (c.id.as_str(), c.embedding.as_slice()))
            .collect();

        write_json(cards_file, &definitions)?;
        write_json(embeddings_file, &embeddings)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.index.get(id).map(|&i| &self.cards[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Keeps the cards whose id is in `ids`, in catalog order.
    pub fn filter_by_ids(&self, ids: &HashSet<&str>) -> Self {
        let indices: Vec<usize> = self
            .cards
            .iter()
            .enumerate()
            .filter(|(_, c)| ids.contains(c.id.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.select(&indices)
    }

    /// Builds a sub-catalog from row indices, in the order given.
    /// Out-of-range and repeated indices are skipped.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut seen = HashSet::with_capacity(indices.len());
        let kept: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.cards.len() && seen.insert(i))
            .collect();

        let cards: Vec<Card> = kept.iter().map(|&i| self.cards[i].clone()).collect();
        let index = cards
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        Self {
            cards,
            embeddings: self.embeddings.select_rows(&kept),
            index,
        }
    }
}

impl fmt::Display for CardCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.cards.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("\n\n"))
    }
}
