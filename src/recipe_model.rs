use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Canonical ingredient identifier (lowercase key owned by the normalizer).
pub type IngredientId = String;
/// Recipe identifier, unique within a corpus.
pub type RecipeId = String;

/// The recipe corpus: loaded once, replaced only by a full snapshot swap.
/// An ordered map keeps every corpus scan deterministic.
pub type RecipeCorpus = BTreeMap<RecipeId, Recipe>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitFamily {
    Mass,
    Volume,
    Count,
}

/// Canonical ingredient metadata from the vocabulary provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ingredient {
    pub id: IngredientId,
    pub display_name: String,
    pub unit_family: UnitFamily,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// One ingredient line of a recipe. `optional` lines (garnish etc.) never
/// block a match and stay out of the coverage ratio.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecipeIngredientLine {
    pub ingredient: IngredientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: Vec<RecipeIngredientLine>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Recipe {
    /// Deduplicated set of non-optional ingredient ids. This is the set the
    /// coverage ratio and the matched/missing partition are defined over.
    pub fn non_optional_ingredients(&self) -> BTreeSet<IngredientId> {
        self.ingredients
            .iter()
            .filter(|line| !line.optional)
            .map(|line| line.ingredient.clone())
            .collect()
    }

    /// All ingredient ids, optional lines included.
    pub fn all_ingredients(&self) -> BTreeSet<IngredientId> {
        self.ingredients
            .iter()
            .map(|line| line.ingredient.clone())
            .collect()
    }
}
