// Study-plan generation: prompts, narrative calls and the planning pipeline.
// All model calls go through model_client::ModelService.

pub mod narrative;
pub mod planner;
pub mod prompts;
