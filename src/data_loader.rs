use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};

use crate::error::PantryError;
use crate::recipe_model::{Ingredient, Recipe, RecipeCorpus, UnitFamily};
use crate::relationship_graph::{RelationKind, RelationshipEdge};
use crate::snapshot_service::SnapshotSource;

// Expected vocabulary CSV columns
const VOCAB_ID_COL: &str = "Id";
const VOCAB_NAME_COL: &str = "Name";
const VOCAB_UNIT_COL: &str = "Unit family";
const VOCAB_SYNONYMS_COL: &str = "Synonyms";

// Expected relationship-graph CSV columns
const GRAPH_A_COL: &str = "Ingredient A";
const GRAPH_B_COL: &str = "Ingredient B";
const GRAPH_RELATION_COL: &str = "Relation";
const GRAPH_CONFIDENCE_COL: &str = "Confidence";

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
}

/// Loads the recipe corpus from a JSON array of recipes. Duplicate recipe
/// ids are a structural error; an empty corpus is allowed at load time and
/// only fails individual requests.
pub fn load_corpus_json(path: &Path) -> Result<RecipeCorpus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file at {:?}", path))?;
    let recipes: Vec<Recipe> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus JSON at {:?}", path))?;

    let mut corpus = RecipeCorpus::new();
    for recipe in recipes {
        if recipe.id.trim().is_empty() {
            return Err(anyhow::anyhow!("Corpus contains a recipe with an empty id"));
        }
        if corpus.insert(recipe.id.clone(), recipe).is_some() {
            return Err(anyhow::anyhow!("Duplicate recipe id in corpus"));
        }
    }
    if corpus.is_empty() {
        log::warn!("corpus at {:?} contains no recipes", path);
    }
    Ok(corpus)
}

/// Loads the ingredient vocabulary from CSV. Synonyms are `;`-separated in
/// one cell. Rows with an empty id or an unknown unit family are skipped
/// and logged; missing columns are a hard error.
pub fn load_vocabulary_csv(path: &Path) -> Result<Vec<Ingredient>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open vocabulary CSV at {:?}", path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers()?.clone();
    let id_idx = column_index(&headers, VOCAB_ID_COL)?;
    let name_idx = column_index(&headers, VOCAB_NAME_COL)?;
    let unit_idx = column_index(&headers, VOCAB_UNIT_COL)?;
    let synonyms_idx = column_index(&headers, VOCAB_SYNONYMS_COL)?;

    let mut vocabulary = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        let id = record.get(id_idx).unwrap_or("").trim().to_lowercase();
        if id.is_empty() {
            continue;
        }
        let unit_raw = record.get(unit_idx).unwrap_or("").trim();
        let unit_family = match unit_raw.to_lowercase().as_str() {
            "mass" => UnitFamily::Mass,
            "volume" => UnitFamily::Volume,
            "count" => UnitFamily::Count,
            other => {
                log::warn!(
                    "vocabulary row {}: unknown unit family '{}', skipping",
                    row_index,
                    other
                );
                continue;
            }
        };
        let display_name = record.get(name_idx).unwrap_or("").trim().to_string();
        let synonyms = record
            .get(synonyms_idx)
            .unwrap_or("")
            .split(';')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        vocabulary.push(Ingredient {
            id,
            display_name,
            unit_family,
            synonyms,
        });
    }

    if vocabulary.is_empty() {
        return Err(anyhow::anyhow!("No valid vocabulary rows loaded from {:?}", path));
    }
    Ok(vocabulary)
}

/// Loads relationship edges from CSV. Rows with an unknown relation kind or
/// an unparsable confidence are skipped and logged. An empty edge list is
/// valid: matching still works, there are just no suggestions.
pub fn load_graph_csv(path: &Path) -> Result<Vec<RelationshipEdge>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open relationship CSV at {:?}", path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers()?.clone();
    let a_idx = column_index(&headers, GRAPH_A_COL)?;
    let b_idx = column_index(&headers, GRAPH_B_COL)?;
    let relation_idx = column_index(&headers, GRAPH_RELATION_COL)?;
    let confidence_idx = column_index(&headers, GRAPH_CONFIDENCE_COL)?;

    let mut edges = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        let a = record.get(a_idx).unwrap_or("").trim().to_lowercase();
        let b = record.get(b_idx).unwrap_or("").trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            continue;
        }
        let kind = match record
            .get(relation_idx)
            .unwrap_or("")
            .trim()
            .to_lowercase()
            .as_str()
        {
            "substitute" => RelationKind::Substitute,
            "complement" => RelationKind::Complement,
            other => {
                log::warn!(
                    "relationship row {}: unknown relation '{}', skipping",
                    row_index,
                    other
                );
                continue;
            }
        };
        let confidence = match record
            .get(confidence_idx)
            .unwrap_or("")
            .trim()
            .parse::<f32>()
        {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "relationship row {}: unparsable confidence, skipping",
                    row_index
                );
                continue;
            }
        };
        edges.push(RelationshipEdge {
            a,
            b,
            kind,
            confidence,
        });
    }

    if edges.is_empty() {
        log::warn!("relationship graph at {:?} has no edges", path);
    }
    Ok(edges)
}

/// The file-backed corpus/graph/vocabulary provider consumed by the
/// snapshot service.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    pub corpus_path: PathBuf,
    pub vocabulary_path: PathBuf,
    pub graph_path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(corpus_path: PathBuf, vocabulary_path: PathBuf, graph_path: PathBuf) -> Self {
        Self {
            corpus_path,
            vocabulary_path,
            graph_path,
        }
    }
}

fn data_load_error(err: anyhow::Error) -> PantryError {
    PantryError::DataLoad(format!("{:#}", err))
}

impl SnapshotSource for FileSnapshotSource {
    fn load_corpus(&self) -> Result<RecipeCorpus, PantryError> {
        load_corpus_json(&self.corpus_path).map_err(data_load_error)
    }

    fn load_vocabulary(&self) -> Result<Vec<Ingredient>, PantryError> {
        load_vocabulary_csv(&self.vocabulary_path).map_err(data_load_error)
    }

    fn load_graph(&self) -> Result<Vec<RelationshipEdge>, PantryError> {
        load_graph_csv(&self.graph_path).map_err(data_load_error)
    }
}
