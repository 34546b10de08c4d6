//! Process-wide services built once at startup.
//!
//! Each component either comes up or is recorded as not ready with the reason,
//! so one failing backend (no API key, unreachable page, corrupt snapshot)
//! degrades the endpoints that need it instead of stopping the process.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{Agent, AgentConfig};
use crate::config::BaristaConfig;
use crate::core_types::Readiness;
use crate::errors::AgentError;
use crate::llm::{create_llm_client, LLM};
use crate::outlets::{OutletQa, OutletStore, SqlQueryEngine};
use crate::rag::{create_embedding_generator, ProductIndex, ProductQa, RagAnswerer, TextSplitter};
use crate::scrape::{HttpScraper, OutletSource};
use crate::tools::{CalculatorTool, OutletLookupTool, ProductLookupTool, ToolRegistry};

pub struct Services {
    pub agent: Readiness<Arc<Agent>>,
    pub products: Readiness<Arc<dyn ProductQa>>,
    pub outlets: Readiness<Arc<dyn OutletQa>>,
}

impl Services {
    pub async fn initialize(config: &BaristaConfig) -> Self {
        log::info!("Initializing services");
        let llm = Readiness::from_result(create_llm_client(&config.llm));
        report("language model", &llm);

        let products = Readiness::from_result(configure_products(config, &llm).await);
        report("product lookup", &products);

        let outlets = Readiness::from_result(configure_outlets(config, &llm).await);
        report("outlet lookup", &outlets);

        let agent = match llm.get() {
            Ok(llm) => Readiness::Ready(Arc::new(build_agent(
                config,
                llm.clone(),
                products.clone(),
                outlets.clone(),
            ))),
            Err(err) => Readiness::NotReady(err.to_string()),
        };
        report("agent", &agent);

        Self {
            agent,
            products,
            outlets,
        }
    }

    pub fn from_parts(
        agent: Readiness<Arc<Agent>>,
        products: Readiness<Arc<dyn ProductQa>>,
        outlets: Readiness<Arc<dyn OutletQa>>,
    ) -> Self {
        Self {
            agent,
            products,
            outlets,
        }
    }

    /// Components that failed to initialize, with the reason.
    pub fn unavailable(&self) -> Vec<(&'static str, String)> {
        let mut unavailable = Vec::new();
        if let Readiness::NotReady(reason) = &self.agent {
            unavailable.push(("agent", reason.clone()));
        }
        if let Readiness::NotReady(reason) = &self.products {
            unavailable.push(("products", reason.clone()));
        }
        if let Readiness::NotReady(reason) = &self.outlets {
            unavailable.push(("outlets", reason.clone()));
        }
        unavailable
    }
}

fn report<T>(component: &str, readiness: &Readiness<T>) {
    match readiness {
        Readiness::Ready(_) => log::info!("{} ready", component),
        Readiness::NotReady(reason) => log::error!("{} not ready: {}", component, reason),
    }
}

/// Registers the three tools and wires them into an agent.
pub fn build_agent(
    config: &BaristaConfig,
    llm: Arc<dyn LLM>,
    products: Readiness<Arc<dyn ProductQa>>,
    outlets: Readiness<Arc<dyn OutletQa>>,
) -> Agent {
    let mut registry =
        ToolRegistry::new().with_timeout(Duration::from_secs(config.tools.timeout_secs));
    registry.register_tool(Arc::new(CalculatorTool::new()));
    registry.register_tool(Arc::new(ProductLookupTool::new(products)));
    registry.register_tool(Arc::new(OutletLookupTool::new(outlets)));

    Agent::new(
        llm,
        Arc::new(registry),
        AgentConfig::from(&config.agent),
    )
}

async fn configure_products(
    config: &BaristaConfig,
    llm: &Readiness<Arc<dyn LLM>>,
) -> Result<Arc<dyn ProductQa>, AgentError> {
    let llm = llm.get()?.clone();
    let scraper = HttpScraper::new(&config.scraper)?;
    let embedder = create_embedding_generator(&config.rag.embeddings)?;
    let splitter = TextSplitter::new(config.rag.chunk_size, config.rag.chunk_overlap);

    let index =
        ProductIndex::ensure_ready(&config.rag.index_path, &scraper, &splitter, embedder).await?;
    Ok(Arc::new(RagAnswerer::new(
        Arc::new(index),
        llm,
        config.rag.top_k,
    )))
}

async fn configure_outlets(
    config: &BaristaConfig,
    llm: &Readiness<Arc<dyn LLM>>,
) -> Result<Arc<dyn OutletQa>, AgentError> {
    let llm = llm.get()?.clone();
    let scraper = HttpScraper::new(&config.scraper)?;

    let store = OutletStore::ensure_ready(&config.outlets.database_path, &scraper).await?;
    Ok(Arc::new(SqlQueryEngine::new(
        store,
        llm,
        config.outlets.max_rows,
    )))
}

/// Re-scrapes the product pages and replaces the index snapshot. Returns the
/// number of indexed chunks.
pub async fn refresh_products(config: &BaristaConfig) -> Result<usize, AgentError> {
    let scraper = HttpScraper::new(&config.scraper)?;
    let embedder = create_embedding_generator(&config.rag.embeddings)?;
    let splitter = TextSplitter::new(config.rag.chunk_size, config.rag.chunk_overlap);

    let index = ProductIndex::rebuild(&config.rag.index_path, &scraper, &splitter, embedder).await?;
    Ok(index.document_count())
}

/// Re-scrapes the outlet pages and replaces the outlet database. Returns the
/// number of stored outlets.
pub async fn refresh_outlets(config: &BaristaConfig) -> Result<usize, AgentError> {
    let scraper = HttpScraper::new(&config.scraper)?;
    let records = scraper.fetch_outlets().await?;

    let store = OutletStore::rebuild(&config.outlets.database_path, &records).await?;
    store.close().await;
    Ok(records.len())
}
