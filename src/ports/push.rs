use super::BoxFuture;
use crate::models::PushSubscription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The push service no longer knows the endpoint; drop the subscription
    Gone,
    Failed(String),
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Gone => f.write_str("endpoint expired"),
            PushError::Failed(reason) => write!(f, "push failed: {}", reason),
        }
    }
}

pub trait PushSender: Send + Sync {
    /// VAPID public key handed to browsers when they subscribe.
    fn public_key(&self) -> &str;

    fn send<'a>(
        &'a self,
        subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), PushError>>;
}
