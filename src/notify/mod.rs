//! Outbound notifications: opt-in email broadcasts, transactional email and
//! the web push dispatcher.

mod dispatch;
pub mod templates;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub use dispatch::spawn_push_dispatcher;
use templates::Rendered;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{EmailKind, ServiceAssignment, UserProfile};
use crate::ports::{Mailer, OutgoingEmail};

/// Counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Sends email through the configured mailer. Without one, every send is a
/// logged no-op.
#[derive(Clone)]
pub struct Notifier {
    repo: Arc<Repository>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl Notifier {
    pub fn new(repo: Arc<Repository>, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self { repo, mailer }
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send one message. Failures are logged and reported as `false`.
    pub async fn send(&self, to: &str, message: &Rendered) -> bool {
        let Some(mailer) = &self.mailer else {
            tracing::debug!(to = %to, subject = %message.subject, "Email disabled; skipping");
            return false;
        };

        let email = OutgoingEmail {
            to: to.to_string(),
            subject: message.subject.clone(),
            html: message.html.clone(),
        };
        match mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(to = %to, subject = %message.subject, error = %e, "Email delivery failed");
                false
            }
        }
    }

    /// Send to every approved user who opted into `kind`.
    pub async fn broadcast(&self, kind: EmailKind, message: &Rendered) -> Result<DeliveryReport, AppError> {
        if self.mailer.is_none() {
            return Ok(DeliveryReport::default());
        }

        let recipients = self.repo.email_recipients(kind).await?;
        let mut report = DeliveryReport {
            recipients: recipients.len(),
            ..DeliveryReport::default()
        };

        for user in &recipients {
            if self.send(&user.email, message).await {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            kind = ?kind,
            recipients = report.recipients,
            sent = report.sent,
            failed = report.failed,
            "Email broadcast finished"
        );
        Ok(report)
    }

    /// Run a broadcast after the response has been sent.
    pub fn broadcast_in_background(&self, kind: EmailKind, message: Result<Rendered, AppError>) {
        if self.mailer.is_none() {
            return;
        }
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(kind = ?kind, error = %e, "Could not render broadcast");
                return;
            }
        };

        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.broadcast(kind, &message).await {
                tracing::error!(kind = ?kind, error = %e, "Email broadcast failed");
            }
        });
    }

    /// Tell a user their account was approved.
    pub async fn account_approved(&self, profile: &UserProfile) {
        match templates::account_approved(profile) {
            Ok(message) => {
                self.send(&profile.email, &message).await;
            }
            Err(e) => tracing::error!(user_id = %profile.id, error = %e, "Could not render approval email"),
        }
    }

    /// Email newly scheduled people who keep service reminders on.
    pub async fn service_assignments(&self, assignments: &[ServiceAssignment]) {
        if self.mailer.is_none() {
            return;
        }

        for assignment in assignments {
            match self.repo.get_user(&assignment.user_id).await {
                Ok(Some(user)) if user.email_subscriptions.allows(EmailKind::ServiceReminders) => {
                    match templates::service_assignment(assignment) {
                        Ok(message) => {
                            self.send(&user.email, &message).await;
                        }
                        Err(e) => tracing::error!(assignment_id = %assignment.id, error = %e, "Could not render assignment email"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(user_id = %assignment.user_id, error = %e, "Could not load assignee")
                }
            }
        }
    }

    /// Digest of the last seven days of active announcements.
    pub async fn send_weekly_digest(&self, now: DateTime<Utc>) -> Result<DeliveryReport, AppError> {
        if self.mailer.is_none() {
            return Err(AppError::Configuration(
                "Email delivery is not configured".to_string(),
            ));
        }

        let since = (now - Duration::days(7)).to_rfc3339();
        let announcements = self.repo.announcements_since(&since).await?;

        match templates::digest(now.date_naive(), &announcements)? {
            Some(message) => self.broadcast(EmailKind::Announcements, &message).await,
            None => {
                tracing::info!("No announcements this week; digest skipped");
                Ok(DeliveryReport::default())
            }
        }
    }
}
