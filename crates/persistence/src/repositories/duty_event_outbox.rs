//! Outbox repository for duty domain events.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::DutyEventEntity;
use crate::metrics::QueryTimer;

/// Repository for the duty event outbox.
#[derive(Clone)]
pub struct DutyEventOutboxRepository {
    pool: PgPool,
}

impl DutyEventOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue inside the transaction that makes the change the event describes.
    pub async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_type: &str,
        aggregate_id: Uuid,
        payload: &serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> Result<DutyEventEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_duty_event");
        let result = sqlx::query_as::<_, DutyEventEntity>(
            r#"
            INSERT INTO duty_event_outbox (event_type, aggregate_id, payload, occurred_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, event_type, aggregate_id, payload, occurred_at, delivered_at, created_at
            "#,
        )
        .bind(event_type)
        .bind(aggregate_id)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(&mut **tx)
        .await;
        timer.record();
        result
    }

    /// Oldest undelivered events first.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<DutyEventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_pending_duty_events");
        let result = sqlx::query_as::<_, DutyEventEntity>(
            r#"
            SELECT id, event_type, aggregate_id, payload, occurred_at, delivered_at, created_at
            FROM duty_event_outbox
            WHERE delivered_at IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("mark_duty_event_delivered");
        let result = sqlx::query(
            "UPDATE duty_event_outbox SET delivered_at = $2 WHERE id = $1 AND delivered_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected() > 0);
        timer.record();
        result
    }
}
