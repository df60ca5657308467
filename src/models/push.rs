//! Web push subscription model.

use serde::{Deserialize, Serialize};

/// Topic for announcement pushes.
pub const ANNOUNCEMENTS_TOPIC: &str = "announcements";

/// A browser push subscription registered for a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: String,
    pub topic: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Body mirrors the browser's `PushSubscription.toJSON()` plus a topic.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub topic: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeRequest {
    pub topic: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}
