use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::cards::CardCatalog;
use crate::catalog::paths::{LayerKind, PathCatalog};
use crate::catalog::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogWarningKind {
    DanglingCardReference,
    EmptyLayer,
    CardWithoutObjectives,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogWarning {
    pub kind: CatalogWarningKind,
    pub subject: String,
    pub description: String,
}

/// Checks the loaded catalogs for inconsistencies that do not prevent
/// planning. Returns advisory warnings (non-blocking).
///
/// Dangling references are reported once per `(path, layer, card)`; the
/// selector drops them at projection time anyway.
pub fn check_catalogs(cards: &CardCatalog, paths: &PathCatalog) -> Vec<CatalogWarning> {
    let mut warnings = Vec::new();

    for card in cards.cards() {
        if card.key_objectives().is_empty() {
            warnings.push(CatalogWarning {
                kind: CatalogWarningKind::CardWithoutObjectives,
                subject: card.id.clone(),
                description: format!("Card '{}' has no key objectives", card.id),
            });
        }
    }

    for path in paths.paths() {
        for kind in LayerKind::ALL {
            for layer in path.layers(kind) {
                let subject = format!("{}/{}/{}", path.id, kind, layer.name);

                if layer.cards.is_empty() {
                    warnings.push(CatalogWarning {
                        kind: CatalogWarningKind::EmptyLayer,
                        description: format!("Layer '{subject}' references no cards"),
                        subject,
                    });
                    continue;
                }

                let mut reported = HashSet::new();
                for card_ref in &layer.cards {
                    if !cards.contains(&card_ref.card_id) && reported.insert(&card_ref.card_id) {
                        warnings.push(CatalogWarning {
                            kind: CatalogWarningKind::DanglingCardReference,
                            subject: subject.clone(),
                            description: format!(
                                "Layer '{subject}' references unknown card '{}'",
                                card_ref.card_id
                            ),
                        });
                    }
                }
            }
        }
    }

    warnings
}

/// Card and layer embeddings are ranked against the same query, so they must
/// share one dimensionality.
pub fn ensure_compatible_dimensions(
    cards: &CardCatalog,
    paths: &PathCatalog,
) -> Result<(), LoadError> {
    let Some(layers) = paths.dim() else {
        return Ok(());
    };
    if cards.is_empty() {
        return Ok(());
    }

    let card_dim = cards.embeddings().dim();
    if card_dim != layers {
        return Err(LoadError::DimensionMismatch {
            cards: card_dim,
            layers,
        });
    }

    let expertise = paths.expertise().embeddings();
    let collaboration = paths.collaboration().embeddings();
    if !expertise.is_empty() && !collaboration.is_empty() && expertise.dim() != collaboration.dim()
    {
        return Err(LoadError::DimensionMismatch {
            cards: card_dim,
            layers: collaboration.dim(),
        });
    }

    Ok(())
}
