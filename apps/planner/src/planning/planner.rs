//! Study-plan generation — orchestrates the full planning pipeline.
//!
//! Flow: embed job description → select (layers → pooled cards → re-rank) →
//!       narrative (three generation calls) → optional extra plans.
//!
//! A plan is returned only when every requested artifact was produced.

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::Catalogs;
use crate::errors::AppError;
use crate::model_client::ModelService;
use crate::planning::narrative::{
    write_card_plans, write_narrative, write_study_plan, CardPlan, Narrative,
};
use crate::ranking::selector::{rank_cards, select, SelectedLayer, SelectionParams};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub job_description: String,
    pub params: SelectionParams,
    /// Also produce one consolidated study plan.
    pub study_plan: bool,
    /// Also produce one study plan per selected card.
    pub per_card: bool,
}

/// A selected card as reported in plan output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedCard {
    pub id: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyPlan {
    /// The original job description, verbatim.
    pub job_description: String,
    pub layers: Vec<SelectedLayer>,
    pub candidate_count: usize,
    pub cards: Vec<PlannedCard>,
    pub narrative: Narrative,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_plan: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub card_plans: Vec<CardPlan>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs the full planning pipeline for one job description.
///
/// Steps:
/// 1. embed the job description (one model call, no retry)
/// 2. select() → layers, candidates, final cards
/// 3. write_narrative() → three generation calls
/// 4. optional consolidated and per-card plans
pub async fn plan(
    model: &dyn ModelService,
    catalogs: &Catalogs,
    request: PlanRequest,
) -> Result<StudyPlan, AppError> {
    validate_job_description(&request.job_description)?;

    // Step 1: Embed query
    let query = model.embed(&request.job_description).await?;
    debug!("Query embedding dimension {}", query.len());

    // Step 2: Selection
    let selection = select(&catalogs.cards, &catalogs.paths, &query, &request.params)?;
    for layer in &selection.layers {
        debug!(
            "Selected layer {}/{} (score {:.4})",
            layer.path_id, layer.layer, layer.score
        );
    }
    info!(
        "Selected {} layers, {} candidate cards, {} final cards",
        selection.layers.len(),
        selection.candidates.len(),
        selection.cards.len()
    );

    // Step 3: Narrative
    let cards = selection.cards.cards();
    let narrative = write_narrative(model, &request.job_description, cards).await?;

    // Step 4: Optional extra plans
    let study_plan = if request.study_plan {
        Some(write_study_plan(model, &request.job_description, cards).await?)
    } else {
        None
    };
    let card_plans = if request.per_card {
        write_card_plans(model, &request.job_description, cards).await?
    } else {
        Vec::new()
    };

    let planned = cards
        .iter()
        .zip(&selection.scores)
        .map(|(card, &score)| PlannedCard {
            id: card.id.clone(),
            name: card.name().to_string(),
            score,
        })
        .collect();

    Ok(StudyPlan {
        job_description: request.job_description,
        layers: selection.layers,
        candidate_count: selection.candidates.len(),
        cards: planned,
        narrative,
        study_plan,
        card_plans,
    })
}

/// Ranks the whole card catalog against a free-text query, without paths or
/// generation.
pub async fn search(
    model: &dyn ModelService,
    catalogs: &Catalogs,
    query: &str,
    quantity: usize,
) -> Result<Vec<PlannedCard>, AppError> {
    validate_job_description(query)?;

    let embedding = model.embed(query).await?;
    let (ranked, scores) = rank_cards(&catalogs.cards, &embedding, quantity)?;

    Ok(ranked
        .cards()
        .iter()
        .zip(scores)
        .map(|(card, score)| PlannedCard {
            id: card.id.clone(),
            name: card.name().to_string(),
            score,
        })
        .collect())
}

fn validate_job_description(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "job description cannot be empty".to_string(),
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

/// Plain-text rendering: the three narrative artifacts separated by blank
/// lines, followed by any extra plans.
pub fn render_text(plan: &StudyPlan) -> String {
    let narrative = &plan.narrative;
    let mut sections = vec![
        narrative.job_description.trim_end().to_string(),
        narrative.objectives.trim_end().to_string(),
        narrative.courses.trim_end().to_string(),
    ];

    if let Some(study_plan) = &plan.study_plan {
        sections.push(study_plan.trim_end().to_string());
    }
    sections.extend(
        plan.card_plans
            .iter()
            .map(|p| format!("## {}\n{}", p.card_name, p.plan.trim_end())),
    );

    sections.join("\n\n") + "\n"
}

/// One line per card: rank, score, id and name.
pub fn render_cards(cards: &[PlannedCard]) -> String {
    cards
        .iter()
        .enumerate()
        .map(|(i, card)| format!("{:>2}. {:.4}  {}  {}\n", i + 1, card.score, card.id, card.name))
        .collect()
}
