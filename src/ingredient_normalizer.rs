use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::recipe_model::{Ingredient, IngredientId};

/// Outcome of normalizing a batch of raw ingredient strings. Unresolved
/// entries are reported, not fatal: an unknown pantry item simply cannot
/// match anything.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPantry {
    pub resolved: BTreeSet<IngredientId>,
    pub unresolved: Vec<String>,
}

impl NormalizedPantry {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.unresolved.is_empty()
    }
}

/// Canonicalizes free-text ingredient names into stable identifiers.
/// Pure lookup over a table built once from the vocabulary provider.
#[derive(Debug, Clone)]
pub struct IngredientNormalizer {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    // Lowercased id / display name / synonym -> canonical id.
    lookup: HashMap<String, IngredientId>,
}

impl IngredientNormalizer {
    pub fn from_vocabulary(vocabulary: Vec<Ingredient>) -> Self {
        let mut ingredients = BTreeMap::new();
        let mut lookup = HashMap::new();

        for ingredient in vocabulary {
            let id = ingredient.id.to_lowercase();
            lookup.insert(id.clone(), id.clone());
            lookup.insert(ingredient.display_name.to_lowercase(), id.clone());
            for synonym in &ingredient.synonyms {
                let key = collapse_whitespace(&synonym.to_lowercase());
                if key.is_empty() {
                    continue;
                }
                if let Some(existing) = lookup.get(&key) {
                    if existing != &id {
                        log::warn!(
                            "synonym '{}' maps to both '{}' and '{}', keeping '{}'",
                            key,
                            existing,
                            id,
                            existing
                        );
                        continue;
                    }
                }
                lookup.insert(key, id.clone());
            }
            ingredients.insert(id, ingredient);
        }

        Self { ingredients, lookup }
    }

    /// `normalize(rawText) -> ingredientId | NotFound`. Case folding,
    /// whitespace trimming, singularization, synonym lookup. Never errors.
    pub fn normalize(&self, raw: &str) -> Option<IngredientId> {
        let cleaned = collapse_whitespace(&raw.trim().to_lowercase());
        if cleaned.is_empty() {
            return None;
        }
        if let Some(id) = self.lookup.get(&cleaned) {
            return Some(id.clone());
        }
        if let Some(singular) = singularize_phrase(&cleaned) {
            if let Some(id) = self.lookup.get(&singular) {
                return Some(id.clone());
            }
        }
        None
    }

    /// Deduplicates and drops unresolved entries, reporting them.
    pub fn normalize_set(&self, raws: &[String]) -> NormalizedPantry {
        let mut pantry = NormalizedPantry::default();
        for raw in raws {
            if raw.trim().is_empty() {
                continue;
            }
            match self.normalize(raw) {
                Some(id) => {
                    pantry.resolved.insert(id);
                }
                None => {
                    log::debug!("ingredient '{}' not in vocabulary", raw.trim());
                    pantry.unresolved.push(raw.trim().to_string());
                }
            }
        }
        pantry
    }

    pub fn get(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ingredients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Singularizes the final word of a phrase ("chicken breasts" ->
/// "chicken breast"). Returns None when no plural suffix applies.
fn singularize_phrase(phrase: &str) -> Option<String> {
    let (head, last) = match phrase.rsplit_once(' ') {
        Some((head, last)) => (Some(head), last),
        None => (None, phrase),
    };
    let singular = singularize_word(last)?;
    Some(match head {
        Some(head) => format!("{} {}", head, singular),
        None => singular,
    })
}

fn singularize_word(word: &str) -> Option<String> {
    // Too short to carry a plural suffix worth stripping.
    if word.len() < 4 {
        return None;
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return Some(format!("{}y", stem));
    }
    for suffix in ["oes", "ses", "shes", "ches", "xes"] {
        if word.ends_with(suffix) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe_model::UnitFamily;

    fn ingredient(id: &str, display: &str, synonyms: &[&str]) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            display_name: display.to_string(),
            unit_family: UnitFamily::Count,
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn test_normalizer() -> IngredientNormalizer {
        IngredientNormalizer::from_vocabulary(vec![
            ingredient("tomato", "Tomato", &["roma tomato"]),
            ingredient("onion", "Onion", &["yellow onion", "brown onion"]),
            ingredient("chicken breast", "Chicken breast", &[]),
            ingredient("berry", "Berry", &[]),
            ingredient("butter", "Butter", &["unsalted butter"]),
        ])
    }

    #[test]
    fn test_normalize_case_and_whitespace() {
        let n = test_normalizer();
        assert_eq!(n.normalize("  ToMaTo  "), Some("tomato".to_string()));
        assert_eq!(n.normalize("Yellow   Onion"), Some("onion".to_string()));
    }

    #[test]
    fn test_normalize_singularizes() {
        let n = test_normalizer();
        // "oes" strips the trailing "es"
        assert_eq!(n.normalize("tomatoes"), Some("tomato".to_string()));
        assert_eq!(n.normalize("onions"), Some("onion".to_string()));
        // "ies" -> "y"
        assert_eq!(n.normalize("berries"), Some("berry".to_string()));
        // Only the final word of a phrase is singularized.
        assert_eq!(
            n.normalize("chicken breasts"),
            Some("chicken breast".to_string())
        );
    }

    #[test]
    fn test_normalize_unknown_returns_none() {
        let n = test_normalizer();
        assert_eq!(n.normalize("dragonfruit"), None);
        assert_eq!(n.normalize(""), None);
        assert_eq!(n.normalize("   "), None);
    }

    #[test]
    fn test_normalize_set_dedupes_and_reports_unresolved() {
        let n = test_normalizer();
        let pantry = n.normalize_set(&[
            "Tomato".to_string(),
            "tomatoes".to_string(),
            "quinoa".to_string(),
            "".to_string(),
        ]);
        // Both tomato spellings collapse to one id.
        assert_eq!(pantry.resolved.len(), 1);
        assert!(pantry.resolved.contains("tomato"));
        assert_eq!(pantry.unresolved, vec!["quinoa".to_string()]);
    }

    #[test]
    fn test_short_words_not_singularized() {
        let n = test_normalizer();
        // "gas" is too short for suffix stripping; no such ingredient anyway.
        assert_eq!(n.normalize("gas"), None);
    }

    #[test]
    fn test_lookup_by_display_name_and_synonym() {
        let n = test_normalizer();
        assert_eq!(n.normalize("unsalted butter"), Some("butter".to_string()));
        assert_eq!(n.normalize("Chicken Breast"), Some("chicken breast".to_string()));
        assert!(n.contains("butter"));
        assert!(!n.contains("margarine"));
        assert_eq!(n.len(), 5);
    }
}
