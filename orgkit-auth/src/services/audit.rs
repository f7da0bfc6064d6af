//! Audit recorder - append and query security/business events.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditFilter, AuditLogEntry};
use crate::services::AuthError;
use crate::stores::AuditStore;

/// Hard cap on page size for audit queries.
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry.
    ///
    /// A failed write must never abort the triggering business action, so
    /// the error is routed to operational logging and swallowed here.
    pub async fn record(&self, entry: AuditLogEntry) {
        if let Err(e) = self.store.append(&entry).await {
            tracing::error!(
                error = %e,
                action = %entry.action,
                entity_type = %entry.entity_type,
                "Failed to write audit entry"
            );
        }
    }

    /// Filtered page, newest-first. `page` is 1-based.
    pub async fn search(
        &self,
        filter: &AuditFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<AuditLogEntry>, i64), AuthError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let page = page.max(1);
        let offset = (page - 1) * limit;

        self.store
            .search(filter, offset, limit)
            .await
            .map_err(AuthError::Store)
    }

    /// Most recent entries touching one entity.
    pub async fn entity_logs(
        &self,
        entity_type: &str,
        entity_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuthError> {
        let filter = AuditFilter {
            entity_type: Some(entity_type.to_string()),
            entity_id: Some(entity_id.to_string()),
            ..Default::default()
        };
        let (entries, _) = self.search(&filter, 1, limit).await?;
        Ok(entries)
    }

    /// Most recent entries produced by one actor.
    pub async fn user_activity(
        &self,
        actor_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuthError> {
        let filter = AuditFilter {
            actor_principal_id: Some(actor_id),
            ..Default::default()
        };
        let (entries, _) = self.search(&filter, 1, limit).await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryAuditStore;
    use chrono::{Duration, Utc};

    fn recorder() -> AuditRecorder {
        AuditRecorder::new(Arc::new(InMemoryAuditStore::new()))
    }

    fn entry(action: &str, entity_type: &str, age_minutes: i64) -> AuditLogEntry {
        let mut entry = AuditLogEntry::new(
            Some(Uuid::new_v4()),
            action,
            entity_type,
            Some("42".to_string()),
            None,
            None,
            "127.0.0.1",
            "test-agent",
        );
        entry.created_at = Utc::now() - Duration::minutes(age_minutes);
        entry
    }

    #[tokio::test]
    async fn test_search_filters_by_entity_type() {
        let recorder = recorder();
        recorder.record(entry("update", "member", 3)).await;
        recorder.record(entry("update", "member", 2)).await;
        recorder.record(entry("update", "budget", 1)).await;

        let filter = AuditFilter {
            entity_type: Some("member".to_string()),
            ..Default::default()
        };
        let (entries, total) = recorder.search(&filter, 1, 50).await.unwrap();
        assert_eq!(total, 2);
        assert!(entries.iter().all(|e| e.entity_type == "member"));
    }

    #[tokio::test]
    async fn test_search_orders_newest_first() {
        let recorder = recorder();
        recorder.record(entry("a", "member", 30)).await;
        recorder.record(entry("b", "member", 10)).await;
        recorder.record(entry("c", "member", 20)).await;

        let (entries, _) = recorder
            .search(&AuditFilter::default(), 1, 50)
            .await
            .unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_pagination_reports_full_total() {
        let recorder = recorder();
        for i in 0..5 {
            recorder.record(entry("login", "principal", i)).await;
        }

        let (page, total) = recorder
            .search(&AuditFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_user_activity_narrows_to_actor() {
        let recorder = recorder();
        let mut mine = entry("login", "principal", 1);
        let actor = Uuid::new_v4();
        mine.actor_principal_id = Some(actor);
        recorder.record(mine).await;
        recorder.record(entry("login", "principal", 2)).await;

        let entries = recorder.user_activity(actor, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_principal_id, Some(actor));
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let recorder = recorder();
        recorder.record(entry("login", "principal", 1)).await;
        // A hostile limit must not translate into an unbounded page
        let (entries, _) = recorder
            .search(&AuditFilter::default(), 1, 1_000_000)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
