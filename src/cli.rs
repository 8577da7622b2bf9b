use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the recipe corpus JSON file
    #[arg(long, default_value = "data/recipes.json")]
    pub corpus: PathBuf,

    /// Path to the ingredient vocabulary CSV file
    #[arg(long, default_value = "data/ingredients.csv")]
    pub vocabulary: PathBuf,

    /// Path to the ingredient relationship CSV file
    #[arg(long, default_value = "data/relationships.csv")]
    pub graph: PathBuf,

    /// Comma-separated pantry ingredients, e.g. "rice, onion, eggs"
    #[arg(short, long)]
    pub ingredients: Option<String>,

    /// Free-text recipe search instead of pantry matching
    #[arg(short, long, conflicts_with = "ingredients")]
    pub query: Option<String>,

    /// Maximum number of recommendations to return
    #[arg(long, default_value_t = 5)]
    pub max_results: usize,

    /// Maximum recipes in the optimized meal plan
    #[arg(long, default_value_t = 3)]
    pub plan_size: usize,

    /// Skip the meal-plan optimizer and return ranked recipes only
    #[arg(long)]
    pub no_plan: bool,

    /// Print a random selection of recipes and exit
    #[arg(long)]
    pub featured: Option<usize>,

    /// Print per-stage algorithm statistics after the results
    #[arg(long)]
    pub explain: bool,

    /// Emit the full recommendation as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
