//! Index status aggregation.

use std::sync::Arc;

use tracing::{debug, warn};

use scribe_types::{EntityStats, EntityType, IndexStatus};

use crate::coordinator::DualEngineCoordinator;
use crate::source::IndexRowStore;

/// Builds an [`IndexStatus`] snapshot from the row store and the primary
/// engine.
pub struct StatusReporter {
    rows: Arc<dyn IndexRowStore>,
    coordinator: Arc<DualEngineCoordinator>,
}

impl StatusReporter {
    pub fn new(rows: Arc<dyn IndexRowStore>, coordinator: Arc<DualEngineCoordinator>) -> Self {
        Self { rows, coordinator }
    }

    /// Single pass; unavailable parts are reported as zero or unhealthy.
    pub async fn report(&self) -> IndexStatus {
        let mut status = IndexStatus {
            is_search_engine_healthy: self.coordinator.is_primary_healthy().await,
            ..Default::default()
        };

        let summary = match self.rows.summary() {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Index row summary unavailable");
                None
            }
        };

        if let Some(summary) = &summary {
            status.database_index_count = summary.active_rows;
            status.last_updated_at = summary.last_updated_at;
        }

        if let Some(stats) = self.coordinator.primary_stats().await {
            status.search_engine_index_count = stats.document_count;
            status.index_size_in_bytes = stats.size_in_bytes;
        } else {
            status.is_search_engine_healthy = false;
        }

        for entity_type in EntityType::ALL {
            let database_count = summary
                .as_ref()
                .and_then(|s| s.active_by_type.get(&entity_type).copied())
                .unwrap_or(0);

            let stats = match self.coordinator.primary_count_by_type(entity_type).await {
                Some(count) => EntityStats {
                    database_count,
                    search_engine_count: count,
                    estimated: false,
                },
                None => EntityStats {
                    database_count,
                    search_engine_count: database_count,
                    estimated: true,
                },
            };
            status.entity_stats.insert(entity_type, stats);
        }

        debug!(
            healthy = status.is_search_engine_healthy,
            database = status.database_index_count,
            engine = status.search_engine_index_count,
            "Index status collected"
        );
        status
    }
}
