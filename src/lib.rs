pub mod app;
pub mod browse;
pub mod config;
pub mod dedupe;
pub mod domain;
pub mod druglikeness;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod model;
pub mod output;
pub mod pubchem;
pub mod retry;
pub mod schema;
pub mod store;
