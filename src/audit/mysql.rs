use sqlx::MySqlPool;

use super::{AuditEvent, Error, EventPersister, Result};

/// An audit event row as stored in (and read back from) the database.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct StoredEvent {
    pub container_name: String,
    pub container_id: String,
    pub event_type: String,
    pub details: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct MySqlEventPersister {
    db: MySqlPool,
}

impl MySqlEventPersister {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }
}

impl EventPersister for MySqlEventPersister {
    async fn persist_event(&self, event: &AuditEvent) -> Result<()> {
        const INSERT_QUERY: &str = r#"
INSERT INTO sentinel_events (
    container_name, container_id, event_type, details, timestamp
) VALUES (
    ?, ?, ?, ?, ?
)
"#;
        sqlx::query(INSERT_QUERY)
            .bind(&event.container_name)
            .bind(&event.container_id)
            .bind(event.kind.as_str())
            .bind(&event.detail)
            .bind(event.timestamp)
            .execute(&self.db)
            .await
            .map_err(Error::InsertError)?;

        Ok(())
    }

    async fn recent_events(&self, limit: u32) -> Result<Vec<StoredEvent>> {
        sqlx::query_as::<_, StoredEvent>(
            r#"
SELECT container_name, container_id, event_type, details, timestamp
FROM sentinel_events
ORDER BY timestamp DESC, id DESC
LIMIT ?
"#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(Error::ReadError)
    }
}
