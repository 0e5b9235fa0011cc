pub mod agents;
pub mod contacts;
pub mod freshness;
pub mod orchestrator;
pub mod qualifier;
pub mod query_gen;
pub mod scrape_chain;
pub mod scraper;
pub mod search_cache;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

#[cfg(test)]
mod pipeline_tests;

pub use orchestrator::{Orchestrator, PipelineDeps};
