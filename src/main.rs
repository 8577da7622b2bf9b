use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

use pantry_match::cli::parse_args;
use pantry_match::data_loader::FileSnapshotSource;
use pantry_match::recommend::{ReasonCode, Recommendation, RecommendOptions};
use pantry_match::snapshot_service::SnapshotService;

// Cache TTL override in seconds; 0 disables the query cache.
const CACHE_TTL_ENV_VAR: &str = "PANTRY_CACHE_TTL_SECS";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli_args = parse_args();

    println!(
        "Loading pantry data (corpus: {:?}, vocabulary: {:?}, graph: {:?})...",
        cli_args.corpus, cli_args.vocabulary, cli_args.graph
    );
    let source = FileSnapshotSource::new(
        cli_args.corpus.clone(),
        cli_args.vocabulary.clone(),
        cli_args.graph.clone(),
    );

    let options = RecommendOptions {
        max_results: cli_args.max_results,
        plan_size: cli_args.plan_size,
        run_optimizer: !cli_args.no_plan,
        ..RecommendOptions::default()
    };
    let mut service = SnapshotService::from_source(&source, options)
        .context("Failed to build snapshot from data files")?;
    if let Some(secs) = env::var(CACHE_TTL_ENV_VAR)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        service = service.with_cache_ttl(Duration::from_secs(secs));
    }
    println!("Snapshot ready.");

    if let Some(count) = cli_args.featured {
        println!("\nFeatured recipes:");
        for recipe in service.featured_recipes(count) {
            println!(" - {} ({})", recipe.name, recipe.id);
        }
        return Ok(());
    }

    let recommendation = if let Some(query) = &cli_args.query {
        println!("\nSearching recipes for query: '{}'", query);
        service.recommend_by_query(query, cli_args.max_results)?
    } else if let Some(list) = &cli_args.ingredients {
        let raw: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        println!("\nMatching {} pantry ingredient(s)...", raw.len());
        service.recommend_by_ingredients(&raw, cli_args.max_results)?
    } else {
        return Err(anyhow!(
            "Nothing to do: pass --ingredients or --query (see --help)"
        ));
    };

    if cli_args.json {
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
    } else {
        print_recommendation(&service, &recommendation);
    }

    if cli_args.explain {
        let report = service.explain_algorithms();
        println!("\nAlgorithm report:");
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_recommendation(service: &SnapshotService, recommendation: &Recommendation) {
    if let Some(reason) = recommendation.reason {
        let message = match reason {
            ReasonCode::EmptyPantry => "No ingredients were supplied.",
            ReasonCode::UnknownIngredients => {
                "None of the supplied ingredients are in the vocabulary."
            }
            ReasonCode::NoMatches => "No recipe matches the supplied ingredients.",
            ReasonCode::EmptyQuery => "The query was empty.",
        };
        println!("\nNo results: {}", message);
        return;
    }

    let snapshot = service.current();
    println!("\nRecommendations:");
    for (rank, result) in recommendation.results.iter().enumerate() {
        let name = snapshot
            .corpus
            .get(&result.recipe_id)
            .map(|r| r.name.as_str())
            .unwrap_or(result.recipe_id.as_str());
        println!(
            "{}. {} ({}) - score {:.2} (raw {:.2})",
            rank + 1,
            name,
            result.recipe_id,
            result.enriched_score,
            result.raw_score
        );
        if !result.matched.is_empty() {
            println!(
                "   have: {}",
                result.matched.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        if !result.missing.is_empty() {
            println!(
                "   need: {}",
                result.missing.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        for (missing, suggestions) in &result.substitutions {
            let rendered: Vec<String> = suggestions
                .iter()
                .map(|s| format!("{} ({:.2})", s.ingredient, s.confidence))
                .collect();
            println!("   swap {}: {}", missing, rendered.join(", "));
        }
    }

    if let Some(plan) = &recommendation.plan {
        println!(
            "\nMeal plan ({} recipes, objective {:.2}):",
            plan.recipes.len(),
            plan.objective
        );
        if plan.distinct_missing.is_empty() {
            println!("   shopping list: nothing, the pantry covers it all");
        } else {
            println!(
                "   shopping list: {}",
                plan.distinct_missing
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if recommendation.stats.partial {
            println!("   (partial: optimizer budget exhausted, best plan found so far)");
        }
        if recommendation.stats.degraded_mode {
            println!("   (degraded: pool too large, greedy selection used)");
        }
    }
}
