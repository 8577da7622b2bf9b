pub mod cli;
pub mod data_loader;
pub mod error;
pub mod ingredient_normalizer;
pub mod recipe_model;
pub mod recommend;
pub mod relationship_graph;
pub mod snapshot_service;
