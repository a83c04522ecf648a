//! A [`World`] backed by a throwaway PostgreSQL container.

use std::ops::Deref;
use std::sync::Arc;

use storage_adapters::PgStore;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

use crate::World;

/// Keeps the container alive for as long as the world is in use.
pub struct PgWorld {
    pub world: Arc<World>,
    _container: ContainerAsync<Postgres>,
}

impl Deref for PgWorld {
    type Target = World;

    fn deref(&self) -> &World {
        &self.world
    }
}

impl PgWorld {
    /// Starts a migrated database. `None` when no container runtime is reachable.
    pub async fn start() -> anyhow::Result<Option<Self>> {
        let container = match Postgres::default().start().await {
            Ok(container) => container,
            Err(e) => {
                eprintln!("skipping postgres contract: container runtime unavailable ({e})");
                return Ok(None);
            }
        };
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

        let store = PgStore::connect(&url, 8).await?;
        store.migrate().await?;
        Ok(Some(Self { world: Arc::new(World::with_store(Arc::new(store))), _container: container }))
    }
}
