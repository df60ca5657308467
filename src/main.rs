//! Church Hub Backend
//!
//! REST backend for a church community app: announcements, prayer, life groups,
//! schedules, volunteers, bulletins, the directory and sermons, on SQLite with
//! optional Cloudinary, SMTP, web push and YouTube integrations.

mod adapters;
mod api;
mod auth;
mod config;
mod db;
mod errors;
mod feed;
mod models;
mod notify;
mod ports;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::SessionKeys;
use config::Config;
use db::Repository;
use errors::AppError;
use notify::Notifier;
use ports::{Mailer, MediaStore, PushSender, VideoSource};

const SERVICE_NAME: &str = "church-hub";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionKeys>,
    pub notifier: Notifier,
    pub media: Option<Arc<dyn MediaStore>>,
    pub push: Option<Arc<dyn PushSender>>,
    pub videos: Option<Arc<dyn VideoSource>>,
}

impl AppState {
    pub fn media_store(&self) -> Result<Arc<dyn MediaStore>, AppError> {
        self.media.clone().ok_or_else(|| {
            AppError::Configuration("Media storage is not configured".to_string())
        })
    }

    pub fn push_sender(&self) -> Result<Arc<dyn PushSender>, AppError> {
        self.push.clone().ok_or_else(|| {
            AppError::Configuration("Web push is not configured".to_string())
        })
    }

    pub fn video_source(&self) -> Result<Arc<dyn VideoSource>, AppError> {
        self.videos.clone().ok_or_else(|| {
            AppError::Configuration("Video playlist sync is not configured".to_string())
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Church Hub Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.internal_psk.is_none() {
        tracing::warn!("No internal PSK configured (CHURCH_INTERNAL_PSK); /internal routes are closed");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Outbound integrations
    let media: Option<Arc<dyn MediaStore>> = config
        .cloudinary
        .clone()
        .map(|c| Arc::new(adapters::CloudinaryStore::new(c)) as Arc<dyn MediaStore>);

    let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(adapters::SmtpMailer::new(smtp)?)),
        None => None,
    };

    let push: Option<Arc<dyn PushSender>> = match config.vapid.clone() {
        Some(vapid) => match adapters::WebPushSender::new(vapid) {
            Ok(sender) => Some(Arc::new(sender)),
            Err(e) => {
                tracing::error!(error = %e, "Web push client failed to start; push disabled");
                None
            }
        },
        None => None,
    };

    let videos: Option<Arc<dyn VideoSource>> = config
        .youtube
        .clone()
        .map(|c| Arc::new(adapters::YouTubePlaylist::new(c)) as Arc<dyn VideoSource>);

    let notifier = Notifier::new(repo.clone(), mailer);

    tracing::info!(
        media = media.is_some(),
        email = notifier.is_enabled(),
        push = push.is_some(),
        videos = videos.is_some(),
        "Integrations configured"
    );

    if let Some(sender) = &push {
        notify::spawn_push_dispatcher(repo.clone(), sender.clone());
    }

    let sessions = Arc::new(SessionKeys::new(
        config.auth_secret.as_deref(),
        SERVICE_NAME,
        config.token_ttl_hours,
    ));

    // Create application state
    let state = AppState {
        notifier,
        repo,
        config: Arc::new(config.clone()),
        sessions,
        media,
        push,
        videos,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.internal_psk.clone();

    // API routes, authenticated per handler through the Session extractor
    let api_routes = Router::new()
        // Auth and own profile
        .route("/auth/sign-up", post(api::sign_up))
        .route("/auth/sign-in", post(api::sign_in))
        .route("/auth/sign-out", post(api::sign_out))
        .route("/me", get(api::get_me))
        .route("/me", put(api::update_me))
        // Users
        .route("/users", get(api::list_users))
        .route("/users/{id}", delete(api::delete_user))
        .route("/users/{id}/approval", put(api::set_user_approval))
        .route("/users/{id}/role", put(api::set_user_role))
        // Announcements
        .route("/announcements", get(api::list_announcements))
        .route("/announcements", post(api::create_announcement))
        .route("/announcements/{id}", get(api::get_announcement))
        .route("/announcements/{id}", put(api::update_announcement))
        .route("/announcements/{id}", delete(api::delete_announcement))
        .route("/announcements/{id}/archive", put(api::archive_announcement))
        .route("/event-categories", get(api::list_event_categories))
        .route("/event-categories", post(api::create_event_category))
        .route("/event-categories/{id}", delete(api::delete_event_category))
        // Prayer
        .route("/prayer", get(api::list_prayer_items))
        .route("/prayer", post(api::create_prayer_item))
        .route("/prayer/{id}", delete(api::delete_prayer_item))
        .route("/prayer/{id}/approval", put(api::set_prayer_approval))
        .route("/prayer/{id}/status", put(api::set_prayer_status))
        // Life groups
        .route("/life-groups", get(api::list_life_groups))
        .route("/life-groups", post(api::create_life_group))
        .route("/life-groups/{id}", get(api::get_life_group))
        .route("/life-groups/{id}", put(api::update_life_group))
        .route("/life-groups/{id}", delete(api::delete_life_group))
        .route("/life-groups/{id}/members", get(api::list_group_members))
        .route("/life-groups/{id}/members", post(api::add_group_member))
        .route(
            "/life-groups/{id}/members/{member_id}",
            put(api::update_group_member),
        )
        .route(
            "/life-groups/{id}/members/{member_id}",
            delete(api::remove_group_member),
        )
        .route(
            "/life-groups/{id}/families/{family_id}",
            post(api::attach_family),
        )
        .route(
            "/life-groups/{id}/families/{family_id}",
            delete(api::detach_family),
        )
        // Families
        .route("/families", get(api::list_families))
        .route("/families", post(api::create_family))
        .route("/families/{id}", get(api::get_family))
        .route("/families/{id}", put(api::update_family))
        .route("/families/{id}", delete(api::delete_family))
        // Teaching
        .route("/teachers", get(api::list_teachers))
        .route("/teachers", post(api::create_teacher))
        .route("/teachers/{id}", delete(api::delete_teacher))
        .route("/teaching/{year}", get(api::get_teaching_schedule))
        .route("/teaching/{year}/grid", get(api::get_teaching_grid))
        .route(
            "/teaching/{year}/assignments",
            post(api::create_teacher_assignment),
        )
        .route(
            "/teaching/{year}/assignments/{id}",
            put(api::update_teacher_assignment),
        )
        .route(
            "/teaching/{year}/assignments/{id}",
            delete(api::delete_teacher_assignment),
        )
        // Service scheduling
        .route("/service-roles", get(api::list_service_roles))
        .route("/service-roles", post(api::create_service_role))
        .route("/service-roles/{id}", delete(api::delete_service_role))
        .route("/service-weeks/{date}", get(api::get_service_week))
        .route("/service-weeks/{date}", put(api::save_service_week))
        .route(
            "/service-assignments/mine",
            get(api::my_service_assignments),
        )
        .route(
            "/service-assignments/{id}/response",
            put(api::respond_to_assignment),
        )
        // Volunteers
        .route("/volunteer-opportunities", get(api::list_opportunities))
        .route("/volunteer-opportunities", post(api::create_opportunity))
        .route("/volunteer-opportunities/{id}", get(api::get_opportunity))
        .route("/volunteer-opportunities/{id}", put(api::update_opportunity))
        .route(
            "/volunteer-opportunities/{id}",
            delete(api::delete_opportunity),
        )
        .route(
            "/volunteer-opportunities/{id}/status",
            put(api::set_opportunity_status),
        )
        .route(
            "/volunteer-opportunities/{id}/signup",
            post(api::sign_up_volunteer),
        )
        .route(
            "/volunteer-opportunities/{id}/signup",
            delete(api::withdraw_volunteer),
        )
        // Bulletins and media
        .route("/bulletins", get(api::list_bulletins))
        .route("/bulletins", post(api::create_bulletin))
        .route("/bulletins/{id}", delete(api::delete_bulletin))
        .route("/media/signature", get(api::media_signature))
        // Directory
        .route("/directory", get(api::list_directory))
        .route("/directory/{id}", delete(api::delete_directory_member))
        .route("/directory/submissions", get(api::list_submissions))
        .route("/directory/submissions", post(api::create_submission))
        .route(
            "/directory/submissions/{id}/approve",
            put(api::approve_submission),
        )
        .route(
            "/directory/submissions/{id}/reject",
            put(api::reject_submission),
        )
        // Sermons
        .route("/sermons", get(api::list_sermons))
        .route("/sermons", post(api::create_sermon))
        .route("/sermons/sync", post(api::sync_sermons))
        .route("/sermons/{id}", delete(api::delete_sermon))
        // Push
        .route("/push/public-key", get(api::push_public_key))
        .route("/push/subscriptions", post(api::subscribe_push))
        .route("/push/subscriptions", delete(api::unsubscribe_push))
        // Change feed
        .route("/changes", get(api::poll_changes))
        .route("/revisions", get(api::get_revisions));

    // Scheduler-triggered routes behind the pre-shared key
    let internal_routes = Router::new()
        .route("/digest", post(api::send_weekly_digest))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .nest("/internal", internal_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
