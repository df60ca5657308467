use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{collections, Announcement, ChangeEvent, ChangeKind, ANNOUNCEMENTS_TOPIC};
use crate::ports::{PushError, PushSender};

const BODY_PREVIEW_CHARS: usize = 140;

/// Follow the change feed and push new announcements to their topic.
pub fn spawn_push_dispatcher(repo: Arc<Repository>, sender: Arc<dyn PushSender>) -> JoinHandle<()> {
    let mut events = repo.feed().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = dispatch(&repo, sender.as_ref(), &event).await {
                        tracing::error!(
                            collection = %event.collection,
                            id = ?event.id,
                            error = %e,
                            "Push dispatch failed"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push dispatcher fell behind the change feed");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("Push dispatcher stopped");
    })
}

/// Handle one feed event. Returns how many pushes were delivered.
pub(crate) async fn dispatch(
    repo: &Repository,
    sender: &dyn PushSender,
    event: &ChangeEvent,
) -> Result<usize, AppError> {
    if event.collection != collections::ANNOUNCEMENTS || event.kind != ChangeKind::Created {
        return Ok(0);
    }
    let Some(id) = event.id.as_deref() else {
        return Ok(0);
    };
    let Some(announcement) = repo.get_announcement(id).await? else {
        return Ok(0);
    };

    let payload = announcement_payload(&announcement);
    let subscriptions = repo.list_push_subscriptions(ANNOUNCEMENTS_TOPIC).await?;
    let mut delivered = 0;

    for subscription in &subscriptions {
        match sender.send(subscription, &payload).await {
            Ok(()) => delivered += 1,
            Err(PushError::Gone) => {
                tracing::info!(endpoint = %subscription.endpoint, "Removing expired push endpoint");
                if let Err(e) = repo.remove_push_endpoint(&subscription.endpoint).await {
                    tracing::warn!(endpoint = %subscription.endpoint, error = %e, "Could not remove expired push endpoint");
                }
            }
            Err(e) => {
                tracing::warn!(endpoint = %subscription.endpoint, error = %e, "Push delivery failed");
            }
        }
    }

    tracing::debug!(
        announcement_id = %announcement.id,
        delivered,
        total = subscriptions.len(),
        "Announcement push sent"
    );
    Ok(delivered)
}

fn announcement_payload(announcement: &Announcement) -> String {
    let mut body: String = announcement.content.chars().take(BODY_PREVIEW_CHARS).collect();
    if announcement.content.chars().count() > BODY_PREVIEW_CHARS {
        body.push('…');
    }

    json!({
        "title": announcement.title,
        "body": body,
        "url": "/announcements",
        "tag": format!("announcement-{}", announcement.id),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentStatus;

    #[test]
    fn test_payload_truncates_long_content() {
        let announcement = Announcement {
            id: "a1".to_string(),
            title: "Retreat".to_string(),
            content: "x".repeat(200),
            category: None,
            author_id: "u1".to_string(),
            author_name: "Ann".to_string(),
            status: ContentStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        };

        let payload: serde_json::Value =
            serde_json::from_str(&announcement_payload(&announcement)).unwrap();
        assert_eq!(payload["title"], "Retreat");
        assert_eq!(payload["body"].as_str().unwrap().chars().count(), 141);
        assert_eq!(payload["tag"], "announcement-a1");
    }
}
