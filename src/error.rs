use thiserror::Error;

use crate::recipe_model::{IngredientId, RecipeId};

/// Hard failures surfaced to callers. Vocabulary misses, traversal
/// truncation and optimizer budget exhaustion are reflected in result data
/// instead (see `recommend::ReasonCode` and `PipelineStats`).
#[derive(Debug, Error)]
pub enum PantryError {
    #[error("no recipes loaded")]
    EmptyCorpus,

    #[error("unknown recipe id: {0}")]
    UnknownRecipe(RecipeId),

    #[error("recipe '{recipe}' references unknown ingredient '{ingredient}'")]
    CorpusValidation {
        recipe: RecipeId,
        ingredient: IngredientId,
    },

    #[error("failed to load data: {0}")]
    DataLoad(String),
}
