use sqlx::Row;

use super::repository::{new_id, now, Repository};
use crate::errors::AppError;
use crate::models::{collections, ChangeKind, PushSubscription, SubscribeRequest};

impl Repository {
    /// Register an endpoint for a topic. Re-subscribing refreshes the keys.
    pub async fn upsert_push_subscription(
        &self,
        user_id: &str,
        request: &SubscribeRequest,
    ) -> Result<PushSubscription, AppError> {
        let topic = request.topic.trim();
        let endpoint = request.endpoint.trim();

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO push_subscriptions (id, topic, endpoint, p256dh, auth, user_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(topic, endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth, \
             user_id = excluded.user_id",
        )
        .bind(new_id())
        .bind(topic)
        .bind(endpoint)
        .bind(&request.keys.p256dh)
        .bind(&request.keys.auth)
        .bind(user_id)
        .bind(now())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT id, topic, endpoint, p256dh, auth, user_id, created_at FROM push_subscriptions \
             WHERE topic = ? AND endpoint = ?",
        )
        .bind(topic)
        .bind(endpoint)
        .fetch_one(&mut *tx)
        .await?;
        let subscription = subscription_from_row(&row);

        self.commit_one(
            tx,
            collections::PUSH_SUBSCRIPTIONS,
            &subscription.id,
            ChangeKind::Updated,
        )
        .await?;

        Ok(subscription)
    }

    /// Remove an endpoint from a topic, limited to `owner`'s subscriptions when
    /// given. Returns whether anything was removed.
    pub async fn remove_push_subscription(
        &self,
        topic: &str,
        endpoint: &str,
        owner: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "DELETE FROM push_subscriptions WHERE topic = ?1 AND endpoint = ?2 \
             AND (?3 IS NULL OR user_id = ?3)",
        )
        .bind(topic.trim())
        .bind(endpoint.trim())
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        self.commit(
            tx,
            vec![super::repository::Touched::collection(
                collections::PUSH_SUBSCRIPTIONS,
                ChangeKind::Deleted,
            )],
        )
        .await?;
        Ok(true)
    }

    /// Drop an endpoint from every topic; used when the push service reports it gone.
    pub async fn remove_push_endpoint(&self, endpoint: &str) -> Result<u64, AppError> {
        let mut tx = self.begin().await?;
        let removed = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        self.commit(
            tx,
            vec![super::repository::Touched::collection(
                collections::PUSH_SUBSCRIPTIONS,
                ChangeKind::Deleted,
            )],
        )
        .await?;
        Ok(removed)
    }

    pub async fn list_push_subscriptions(&self, topic: &str) -> Result<Vec<PushSubscription>, AppError> {
        let rows = sqlx::query(
            "SELECT id, topic, endpoint, p256dh, auth, user_id, created_at FROM push_subscriptions \
             WHERE topic = ? ORDER BY created_at",
        )
        .bind(topic)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(subscription_from_row).collect())
    }
}

fn subscription_from_row(row: &sqlx::sqlite::SqliteRow) -> PushSubscription {
    PushSubscription {
        id: row.get("id"),
        topic: row.get("topic"),
        endpoint: row.get("endpoint"),
        p256dh: row.get("p256dh"),
        auth: row.get("auth"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}
