//! Embedding texts for cards and layers, and the retrying embed call used
//! while building the corpus.

use std::collections::HashSet;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::warn;

use crate::catalog::cards::CardDefinition;
use crate::catalog::paths::LayerDefinition;
use crate::model_client::{ModelError, ModelService};

/// Total attempts per text, first call included.
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(15);

/// Embeds `text`, retrying only deadline errors with a fixed delay.
pub async fn embed_with_retry(model: &dyn ModelService, text: &str) -> Result<Vec<f64>, ModelError> {
    let mut attempt = 1;
    loop {
        match model.embed(text).await {
            Ok(embedding) => return Ok(embedding),
            Err(e) if e.is_deadline_exceeded() && attempt < MAX_ATTEMPTS => {
                warn!(
                    "Embedding attempt {attempt}/{MAX_ATTEMPTS} hit a deadline, retrying in {}s: {e}",
                    RETRY_DELAY.as_secs()
                );
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Card name followed by its key objectives, one per line. A card without
/// objectives is embedded from its name alone.
pub fn card_embedding_text(card: &CardDefinition) -> String {
    std::iter::once(card.name())
        .chain(card.key_objectives().iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Name and key objectives of every known card the layer references, first
/// reference wins. Falls back to the layer name when no referenced card is
/// known.
pub fn layer_embedding_text(
    layer: &LayerDefinition,
    cards: &IndexMap<String, CardDefinition>,
) -> String {
    let mut seen = HashSet::new();
    let mut items: Vec<&str> = Vec::new();

    for card_ref in layer.cards() {
        if !seen.insert(card_ref.card_id.as_str()) {
            continue;
        }
        if let Some(card) = cards.get(&card_ref.card_id) {
            items.push(card.name());
            items.extend(card.key_objectives().iter().map(String::as_str));
        }
    }

    if items.is_empty() {
        return layer.name().to_string();
    }
    items.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field::Field;
    use crate::catalog::paths::CardRef;
    use crate::model_client::stub::StubModel;

    fn definition(name: &str, objectives: &[&str]) -> CardDefinition {
        CardDefinition {
            name: Field::Value(name.to_string()),
            key_objectives: Field::Value(objectives.iter().map(|o| o.to_string()).collect()),
            ..Default::default()
        }
    }

    fn layer_with(ids: &[&str]) -> LayerDefinition {
        LayerDefinition {
            name: Field::Value("Fundamentos".to_string()),
            cards: Field::Value(
                ids.iter()
                    .map(|id| CardRef {
                        card_id: id.to_string(),
                        priority: Some(1),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_card_text_is_name_then_objectives() {
        let card = definition("Git", &["Criar commits", "Resolver conflitos"]);
        assert_eq!(card_embedding_text(&card), "Git\nCriar commits\nResolver conflitos");
    }

    #[test]
    fn test_card_without_objectives_uses_name() {
        assert_eq!(card_embedding_text(&definition("Docker", &[])), "Docker");
        let bare = CardDefinition {
            name: Field::Value("Kafka".to_string()),
            ..Default::default()
        };
        assert_eq!(card_embedding_text(&bare), "Kafka");
    }

    #[test]
    fn test_layer_text_dedups_and_skips_unknown_cards() {
        let mut cards = IndexMap::new();
        cards.insert("git".to_string(), definition("Git", &["Criar commits"]));
        cards.insert("sql".to_string(), definition("SQL", &["Escrever joins"]));

        let text = layer_embedding_text(&layer_with(&["sql", "ghost", "git", "sql"]), &cards);
        assert_eq!(text, "SQL\nEscrever joins\nGit\nCriar commits");
    }

    #[test]
    fn test_layer_without_known_cards_uses_layer_name() {
        let text = layer_embedding_text(&layer_with(&["ghost"]), &IndexMap::new());
        assert_eq!(text, "Fundamentos");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_retried_until_success() {
        let model = StubModel::new(&[0.5, 0.5]).with_deadlines(2);
        let started = tokio::time::Instant::now();

        let embedding = embed_with_retry(&model, "Git").await.unwrap();

        assert_eq!(embedding, [0.5, 0.5]);
        assert_eq!(model.embed_count(), 3);
        assert!(started.elapsed() >= RETRY_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let model = StubModel::new(&[0.5]).with_deadlines(5);
        let err = embed_with_retry(&model, "Git").await.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(model.embed_count(), MAX_ATTEMPTS as usize);
    }
}
