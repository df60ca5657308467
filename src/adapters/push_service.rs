use std::sync::Arc;

use web_push::WebPushError;

use crate::config::VapidConfig;
use crate::models::PushSubscription;
use crate::ports::{BoxFuture, PushError, PushSender};

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }

    async fn deliver(&self, subscription: &PushSubscription, payload: &str) -> Result<(), WebPushError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload.as_bytes());
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        signature_builder.add_claim("sub", self.vapid.subject.as_str());
        builder.set_vapid_signature(signature_builder.build()?);
        self.client.send(builder.build()?).await
    }
}

impl PushSender for WebPushSender {
    fn public_key(&self) -> &str {
        &self.vapid.public_key
    }

    fn send<'a>(
        &'a self,
        subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            self.deliver(subscription, payload)
                .await
                .map_err(|err| match err {
                    WebPushError::EndpointNotValid | WebPushError::EndpointNotFound => PushError::Gone,
                    other => PushError::Failed(other.to_string()),
                })
        })
    }
}
