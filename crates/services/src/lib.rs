//! # services
//!
//! Application services for the friendship state machine and the social
//! graph built on top of it. Each service holds the store handle it is given;
//! nothing here is global.

pub mod directory;
pub mod graph;
pub mod interactions;
pub mod relationships;

use std::sync::Arc;

use domains::{Clock, Store};

pub use directory::UserDirectory;
pub use graph::SocialGraph;
pub use interactions::{InteractionService, MAX_PAGE_SIZE};
pub use relationships::RelationshipService;

/// All services wired against one store and clock.
pub struct Services {
    pub directory: UserDirectory,
    pub relationships: RelationshipService,
    pub graph: SocialGraph,
    pub interactions: InteractionService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: UserDirectory::new(store.clone()),
            relationships: RelationshipService::new(store.clone(), clock.clone()),
            graph: SocialGraph::new(store.clone()),
            interactions: InteractionService::new(store, clock),
        }
    }
}
