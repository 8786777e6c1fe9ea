//! Narrative Generator — turns a card selection into plan text via the model.
//!
//! Each artifact is one independent `generate` call. Nothing is retried: the
//! first failure aborts the whole narrative.

use serde::Serialize;
use tracing::info;

use crate::catalog::cards::Card;
use crate::errors::AppError;
use crate::model_client::ModelService;
use crate::planning::prompts::{
    card_study_plan_prompt, courses_prompt, objectives_prompt, rewrite_job_prompt,
    study_plan_prompt,
};

/// The three narrative artifacts of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub job_description: String,
    pub objectives: String,
    pub courses: String,
}

/// A study plan dedicated to one card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPlan {
    pub card_id: String,
    pub card_name: String,
    pub plan: String,
}

/// Produces the rewritten job description, the objectives narrative and the
/// course narrative, in that order.
pub async fn write_narrative(
    model: &dyn ModelService,
    job_description: &str,
    cards: &[Card],
) -> Result<Narrative, AppError> {
    ensure_cards(cards)?;

    info!("Generating job description rewrite");
    let job = model.generate(&rewrite_job_prompt(job_description)).await?;

    info!("Generating objectives narrative for {} cards", cards.len());
    let objectives = model.generate(&objectives_prompt(cards)).await?;

    info!("Generating course narrative");
    let courses = model.generate(&courses_prompt(cards)).await?;

    Ok(Narrative {
        job_description: job,
        objectives,
        courses,
    })
}

/// One consolidated study plan covering every selected card.
pub async fn write_study_plan(
    model: &dyn ModelService,
    job_description: &str,
    cards: &[Card],
) -> Result<String, AppError> {
    ensure_cards(cards)?;
    info!("Generating consolidated study plan");
    Ok(model
        .generate(&study_plan_prompt(job_description, cards))
        .await?)
}

/// One study plan per selected card, in selection order.
pub async fn write_card_plans(
    model: &dyn ModelService,
    job_description: &str,
    cards: &[Card],
) -> Result<Vec<CardPlan>, AppError> {
    ensure_cards(cards)?;

    let mut plans = Vec::with_capacity(cards.len());
    for card in cards {
        info!("Generating study plan for card {}", card.id);
        let plan = model
            .generate(&card_study_plan_prompt(job_description, card))
            .await?;
        plans.push(CardPlan {
            card_id: card.id.clone(),
            card_name: card.name().to_string(),
            plan,
        });
    }
    Ok(plans)
}

fn ensure_cards(cards: &[Card]) -> Result<(), AppError> {
    if cards.is_empty() {
        return Err(AppError::Validation(
            "No cards passed selection. Try a larger depth or a more specific job description."
                .to_string(),
        ));
    }
    Ok(())
}
