//! Session factory
//!
//! Builds the components a configured session needs: the language model
//! client, the (cached) database handle and the agent wired to both.

use crate::agent::{QueryAgent, SqlAgent, Toolkit};
use crate::config::{SessionConfiguration, Settings};
use crate::database::{CacheKey, ConnectOptions, HandleCache, SqlDatabase};
use crate::error::Result;
use crate::llm::{create_client, LLMProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Components of a ready session
#[derive(Clone)]
pub struct SessionComponents {
    pub agent: Arc<dyn QueryAgent>,
    /// Redacted description of the database the agent talks to
    pub database: String,
}

/// Builds session components from a validated configuration
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn build(&self, config: &SessionConfiguration) -> Result<SessionComponents>;
}

/// Factory wiring the Groq client, the SQL toolkit and `SqlAgent`
pub struct SqlSessionFactory {
    settings: Settings,
    cache: Mutex<HandleCache<SqlDatabase>>,
}

impl SqlSessionFactory {
    pub fn new(settings: Settings) -> Self {
        let cache = HandleCache::new(settings.cache_ttl);
        Self {
            settings,
            cache: Mutex::new(cache),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(
            self.settings.local_db_path.clone(),
            self.settings.remote_read_only,
        )
    }

    /// Cached handle for the configuration, opening one if needed
    pub async fn database(&self, config: &SessionConfiguration) -> Result<Arc<SqlDatabase>> {
        let options = self.connect_options();
        let key = CacheKey::for_configuration(config.mode(), config.remote(), &options);

        let mut cache = self.cache.lock().await;
        cache.purge_expired(Instant::now());
        cache
            .get_or_try_insert_with(key, Instant::now(), || {
                SqlDatabase::configure(config.mode(), config.remote(), &options)
            })
            .await
    }
}

#[async_trait]
impl SessionFactory for SqlSessionFactory {
    async fn build(&self, config: &SessionConfiguration) -> Result<SessionComponents> {
        let llm: Arc<dyn LLMProvider> =
            Arc::new(create_client(config.credential(), &self.settings.model)?);
        let db = self.database(config).await?;
        let database = db.description().to_string();

        let toolkit = Toolkit::for_database(db, Arc::clone(&llm));
        let agent = SqlAgent::new(llm, toolkit).with_max_iterations(self.settings.max_iterations);

        tracing::info!(database = %database, mode = %config.mode(), "session components ready");
        Ok(SessionComponents {
            agent: Arc::new(agent),
            database,
        })
    }
}
