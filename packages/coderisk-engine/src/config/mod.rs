//! Engine configuration.
//!
//! Assembled from environment variables at command startup. Every missing
//! or ill-formed value surfaces as `ConfigInvalid` with a remediation
//! hint; nothing here is read lazily mid-pipeline.

use std::env;
use std::time::Duration;

use crate::features::graph::GraphFlavor;
use crate::shared::models::{CoreError, Result};

/// Per-operation-kind timeout budgets.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Tier-1 metric query.
    pub metric_query: Duration,
    /// Ownership/developer history query.
    pub ownership_query: Duration,
    /// One ingestion phase end to end.
    pub ingest_phase: Duration,
    /// One node/edge batch transaction.
    pub batch_create: Duration,
    /// One Phase-2 investigation, all hops included.
    pub investigation: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metric_query: Duration::from_secs(30),
            ownership_query: Duration::from_secs(60),
            ingest_phase: Duration::from_secs(600),
            batch_create: Duration::from_secs(180),
            investigation: Duration::from_secs(60),
        }
    }
}

/// Staging store connection settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
}

impl PostgresConfig {
    /// `DATABASE_URL` wins; otherwise the DSN is assembled from the
    /// individual `POSTGRES_*` variables.
    pub fn from_env() -> Result<Self> {
        if let Ok(url) = env::var("DATABASE_URL") {
            return Ok(Self { url });
        }

        let host = env::var("POSTGRES_HOST").map_err(|_| {
            CoreError::config(
                "staging store is not configured: set DATABASE_URL or POSTGRES_HOST \
                 (plus POSTGRES_PORT/DB/USER/PASSWORD)",
            )
        })?;
        let port = env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
        let db = env::var("POSTGRES_DB").unwrap_or_else(|_| "coderisk".to_string());
        let user = env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("POSTGRES_PASSWORD").unwrap_or_default();

        Ok(Self {
            url: format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db),
        })
    }
}

/// Graph store connection settings.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub flavor: GraphFlavor,
    pub database: String,
}

impl GraphConfig {
    pub fn from_env() -> Result<Self> {
        let uri = env::var("GRAPH_URI").map_err(|_| {
            CoreError::config(
                "graph store is not configured: set GRAPH_URI \
                 (e.g. http://localhost:7474)",
            )
        })?;
        let flavor = match env::var("GRAPH_FLAVOR").as_deref() {
            Ok("memgraph") => GraphFlavor::Memgraph,
            Ok("neo4j") | Err(_) => GraphFlavor::Neo4j,
            Ok(other) => {
                return Err(CoreError::config(format!(
                    "unknown GRAPH_FLAVOR {:?}: expected \"neo4j\" or \"memgraph\"",
                    other
                )))
            }
        };

        Ok(Self {
            uri,
            user: env::var("GRAPH_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: env::var("GRAPH_PASSWORD").unwrap_or_default(),
            flavor,
            database: env::var("GRAPH_DATABASE").unwrap_or_else(|_| "neo4j".to_string()),
        })
    }
}

/// Optional LLM adapter settings. Absence is legal and downgrades the
/// Atomizer and Phase-2 investigation, never the metrics.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("CODERISK_LLM_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: env::var("CODERISK_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("CODERISK_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub postgres: PostgresConfig,
    pub graph: GraphConfig,
    pub llm: Option<LlmConfig>,
    pub timeouts: TimeoutConfig,
    /// Host used when deriving noreply author emails from logins.
    pub noreply_host: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            postgres: PostgresConfig::from_env()?,
            graph: GraphConfig::from_env()?,
            llm: LlmConfig::from_env(),
            timeouts: TimeoutConfig::default(),
            noreply_host: env::var("CODERISK_NOREPLY_HOST")
                .unwrap_or_else(|_| "github.com".to_string()),
        })
    }
}
