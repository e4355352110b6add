pub mod engine;
pub mod ranker;
pub mod rules;
