//! Atomically swappable route table snapshots

use super::table::{RouteTable, RouteTableBuilder};
use crate::error::RouteConfigError;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{error, info};

/// Shared handle to the current route table.
///
/// Readers take a snapshot with [`load`](Self::load) and keep using it for
/// the rest of the request even if a new table is published meanwhile.
/// Publishing is a single pointer swap.
#[derive(Debug, Clone)]
pub struct SharedRouteTable {
    current: Arc<ArcSwap<RouteTable>>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    pub fn empty() -> Self {
        Self::new(RouteTable::empty())
    }

    /// The current snapshot
    pub fn load(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Replace the current table, returning the previous snapshot
    pub fn publish(&self, table: RouteTable) -> Arc<RouteTable> {
        let stats = table.stats();
        let previous = self.current.swap(Arc::new(table));
        info!(
            routes = stats.total_routes,
            named = stats.named_routes,
            "Published route table snapshot"
        );
        previous
    }

    /// Build and publish. On error the current snapshot stays in effect.
    pub fn rebuild(&self, builder: &RouteTableBuilder) -> Result<(), RouteConfigError> {
        match builder.build() {
            Ok(table) => {
                self.publish(table);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Route table rebuild failed; keeping current snapshot");
                Err(err)
            }
        }
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{HttpMethod, RouteDefinition};

    #[test]
    fn test_in_flight_snapshot_survives_publish() {
        let shared = SharedRouteTable::new(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/old"))
                .build()
                .unwrap(),
        );
        let in_flight = shared.load();

        shared
            .rebuild(&RouteTableBuilder::new().route(RouteDefinition::new("/new")))
            .unwrap();

        assert!(in_flight.select_best_match("/old", &HttpMethod::GET).is_some());
        assert!(shared.load().select_best_match("/old", &HttpMethod::GET).is_none());
        assert!(shared.load().select_best_match("/new", &HttpMethod::GET).is_some());
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_table() {
        let shared = SharedRouteTable::empty();
        shared
            .rebuild(&RouteTableBuilder::new().route(RouteDefinition::new("/ok")))
            .unwrap();

        let broken = RouteTableBuilder::new().route(RouteDefinition::new("/bad/{"));
        assert!(shared.rebuild(&broken).is_err());
        assert!(shared.load().select_best_match("/ok", &HttpMethod::GET).is_some());
    }

    #[test]
    fn test_clones_share_the_same_slot() {
        let shared = SharedRouteTable::empty();
        let other = shared.clone();
        other.publish(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/x"))
                .build()
                .unwrap(),
        );
        assert_eq!(shared.load().len(), 1);
    }
}
