//! Integration tests for the church hub backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::{SessionKeys, API_KEY_HEADER};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::models::{PushSubscription, SignedUpload, VideoItem, ANNOUNCEMENTS_TOPIC};
use crate::notify::{spawn_push_dispatcher, Notifier};
use crate::ports::{
    BoxFuture, Mailer, MediaAsset, MediaStore, OutgoingEmail, PushError, PushSender, VideoSource,
};
use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "admin@church.test";
const DIGEST_KEY: &str = "digest-key";

// ==================== FAKE ADAPTERS ====================

#[derive(Default)]
struct FakeMediaStore {
    destroyed: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MediaStore for FakeMediaStore {
    fn sign_upload(&self, folder: &str) -> SignedUpload {
        SignedUpload {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            folder: folder.to_string(),
            timestamp: 1_700_000_000,
            signature: "signed".to_string(),
            signature_algorithm: "sha256".to_string(),
        }
    }

    fn destroy<'a>(&'a self, asset: &'a MediaAsset) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::External("media host unavailable".to_string()));
            }
            self.destroyed.lock().unwrap().push(asset.public_id.clone());
            Ok(())
        })
    }
}

#[derive(Default)]
struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl FakeMailer {
    fn subjects_starting_with(&self, prefix: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.subject.starts_with(prefix))
            .map(|e| e.to.clone())
            .collect()
    }
}

impl Mailer for FakeMailer {
    fn send<'a>(&'a self, email: &'a OutgoingEmail) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        })
    }
}

/// Endpoints containing "gone" behave like expired subscriptions.
#[derive(Default)]
struct FakePush {
    delivered: Mutex<Vec<(String, String)>>,
}

impl PushSender for FakePush {
    fn public_key(&self) -> &str {
        "BPublicKey"
    }

    fn send<'a>(
        &'a self,
        subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            if subscription.endpoint.contains("gone") {
                return Err(PushError::Gone);
            }
            self.delivered
                .lock()
                .unwrap()
                .push((subscription.endpoint.clone(), payload.to_string()));
            Ok(())
        })
    }
}

struct FakeVideos;

impl VideoSource for FakeVideos {
    fn list_videos(&self) -> BoxFuture<'_, Result<Vec<VideoItem>, AppError>> {
        Box::pin(async {
            Ok(vec![
                VideoItem {
                    video_id: "abc123def45".to_string(),
                    title: "Sunday Service".to_string(),
                    description: Some("Week one".to_string()),
                    published_on: chrono::NaiveDate::from_ymd_opt(2024, 6, 9),
                    thumbnail_url: None,
                },
                VideoItem {
                    video_id: "zyx987wvu65".to_string(),
                    title: "Evening Worship".to_string(),
                    description: None,
                    published_on: chrono::NaiveDate::from_ymd_opt(2024, 6, 16),
                    thumbnail_url: None,
                },
            ])
        })
    }
}

// ==================== FIXTURE ====================

/// A signed-in account used by a test.
struct Account {
    token: String,
    id: String,
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    media: Arc<FakeMediaStore>,
    mailer: Arc<FakeMailer>,
    push: Arc<FakePush>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let mut config = Config::for_tests(db_path);
        config.internal_psk = Some(DIGEST_KEY.to_string());
        config.bootstrap_admin_email = Some(ADMIN_EMAIL.to_string());

        let media = Arc::new(FakeMediaStore::default());
        let mailer = Arc::new(FakeMailer::default());
        let push = Arc::new(FakePush::default());

        spawn_push_dispatcher(repo.clone(), push.clone());

        let state = AppState {
            repo: repo.clone(),
            sessions: Arc::new(SessionKeys::new(
                config.auth_secret.as_deref(),
                "church-hub-test",
                config.token_ttl_hours,
            )),
            config: Arc::new(config),
            notifier: Notifier::new(repo.clone(), Some(mailer.clone())),
            media: Some(media.clone()),
            push: Some(push.clone()),
            videos: Some(Arc::new(FakeVideos)),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            media,
            mailer,
            push,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, Some(token), Some(body)).await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, path, Some(token), Some(body)).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, path, Some(token), None).await
    }

    async fn sign_up(&self, email: &str, name: &str) -> Account {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/sign-up",
                None,
                Some(json!({ "email": email, "password": "hunter2hunter2", "displayName": name })),
            )
            .await;
        assert_eq!(status, 200, "sign-up failed: {}", body);
        Account {
            token: body["data"]["token"].as_str().unwrap().to_string(),
            id: body["data"]["profile"]["id"].as_str().unwrap().to_string(),
        }
    }

    async fn admin(&self) -> Account {
        self.sign_up(ADMIN_EMAIL, "Pastor Admin").await
    }

    /// Sign up, approve, and give the account a role.
    async fn approved(&self, admin: &Account, email: &str, name: &str, role: &str) -> Account {
        let account = self.sign_up(email, name).await;
        let (status, _) = self
            .put(
                &format!("/api/users/{}/approval", account.id),
                &admin.token,
                json!({ "status": "approved" }),
            )
            .await;
        assert_eq!(status, 200);
        let (status, _) = self
            .put(
                &format!("/api/users/{}/role", account.id),
                &admin.token,
                json!({ "role": role }),
            )
            .await;
        assert_eq!(status, 200);
        account
    }
}

/// Poll until `check` holds or a couple of seconds pass.
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

fn items(body: &Value) -> &Vec<Value> {
    body["data"].as_array().expect("data should be an array")
}

// ==================== HEALTH & AUTH ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_sign_up_starts_pending() {
    let fixture = TestFixture::new().await;
    let user = fixture.sign_up("jane@church.test", "Jane").await;

    let (status, body) = fixture.get("/api/me", &user.token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["role"], "user");

    // Pending accounts can only see their own profile
    let (status, body) = fixture.get("/api/announcements", &user.token).await;
    assert_eq!(status, 403);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_bootstrap_admin_is_approved() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture.get("/api/me", &admin.token).await;
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["isAdmin"], true);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let fixture = TestFixture::new().await;
    fixture.sign_up("jane@church.test", "Jane").await;

    let (status, _) = fixture
        .call(
            Method::POST,
            "/api/auth/sign-up",
            None,
            Some(json!({ "email": "JANE@church.test", "password": "hunter2hunter2", "displayName": "J" })),
        )
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_short_password_rejected() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .call(
            Method::POST,
            "/api/auth/sign-up",
            None,
            Some(json!({ "email": "a@church.test", "password": "short", "displayName": "A" })),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_sign_in_and_sign_out() {
    let fixture = TestFixture::new().await;
    fixture.sign_up("jane@church.test", "Jane").await;

    let (status, _) = fixture
        .call(
            Method::POST,
            "/api/auth/sign-in",
            None,
            Some(json!({ "email": "jane@church.test", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, 401);

    let (status, body) = fixture
        .call(
            Method::POST,
            "/api/auth/sign-in",
            None,
            Some(json!({ "email": "Jane@Church.test", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, 200);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .call(Method::POST, "/api/auth/sign-out", Some(&token), None)
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture.get("/api/me", &token).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_missing_token_unauthorized() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.call(Method::GET, "/api/me", None, None).await;
    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rejected_account_cannot_sign_in() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let user = fixture.sign_up("mallory@church.test", "Mallory").await;

    let (status, _) = fixture
        .put(
            &format!("/api/users/{}/approval", user.id),
            &admin.token,
            json!({ "status": "rejected" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, _) = fixture
        .call(
            Method::POST,
            "/api/auth/sign-in",
            None,
            Some(json!({ "email": "mallory@church.test", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, 403);
}

// ==================== USERS ====================

#[tokio::test]
async fn test_admin_routes_forbidden_to_members() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, _) = fixture.get("/api/users", &member.token).await;
    assert_eq!(status, 403);

    let (status, body) = fixture.get("/api/users", &admin.token).await;
    assert_eq!(status, 200);
    assert_eq!(items(&body).len(), 2);
}

#[tokio::test]
async fn test_approval_sends_email() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let recipients = fixture
        .mailer
        .subjects_starting_with("Your account has been approved");
    assert_eq!(recipients, vec!["m@church.test".to_string()]);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, _) = fixture
        .delete(&format!("/api/users/{}", admin.id), &admin.token)
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_delete_user_removes_photo_first() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, _) = fixture
        .put(
            "/api/me",
            &member.token,
            json!({ "photoUrl": "https://res.cloudinary.com/demo/image/upload/v17/profiles/member.jpg" }),
        )
        .await;
    assert_eq!(status, 200);

    // A failing media store keeps the account
    fixture.media.fail.store(true, Ordering::SeqCst);
    let (status, _) = fixture
        .delete(&format!("/api/users/{}", member.id), &admin.token)
        .await;
    assert_eq!(status, 502);
    let (_, body) = fixture.get("/api/users", &admin.token).await;
    assert_eq!(items(&body).len(), 2);

    fixture.media.fail.store(false, Ordering::SeqCst);
    let (status, _) = fixture
        .delete(&format!("/api/users/{}", member.id), &admin.token)
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        *fixture.media.destroyed.lock().unwrap(),
        vec!["profiles/member".to_string()]
    );
}

// ==================== ANNOUNCEMENTS ====================

#[tokio::test]
async fn test_empty_list_is_empty_array() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture.get("/api/announcements", &admin.token).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_created_announcement_appears_in_list() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Retreat", "content": "<p>Sign up by Friday</p>" }),
        )
        .await;
    assert_eq!(status, 200);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let create_revision = body["revisionId"].as_i64().unwrap();
    assert!(create_revision > 0);

    let (_, body) = fixture.get("/api/announcements", &admin.token).await;
    let list = items(&body);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["authorName"], "Pastor Admin");
}

#[tokio::test]
async fn test_failed_create_leaves_list_unchanged() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "  ", "content": "Body" }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &member.token,
            json!({ "title": "Hi", "content": "Body" }),
        )
        .await;
    assert_eq!(status, 403);

    let (_, body) = fixture.get("/api/announcements", &admin.token).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_stale_version_conflict() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Picnic", "content": "Saturday" }),
        )
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["version"], 1);

    let (status, body) = fixture
        .put(
            &format!("/api/announcements/{}", id),
            &admin.token,
            json!({ "title": "Picnic (moved)", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["version"], 2);

    let (status, body) = fixture
        .put(
            &format!("/api/announcements/{}", id),
            &admin.token,
            json!({ "title": "Stale edit", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 2);
}

#[tokio::test]
async fn test_archive_moves_announcement() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Old news", "content": "Done" }),
        )
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .put(
            &format!("/api/announcements/{}/archive", id),
            &admin.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get("/api/announcements", &admin.token).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = fixture
        .get("/api/announcements?status=archived", &admin.token)
        .await;
    assert_eq!(items(&body).len(), 1);
}

#[tokio::test]
async fn test_event_category_names_unique() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, _) = fixture
        .post("/api/event-categories", &admin.token, json!({ "name": "Youth" }))
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .post("/api/event-categories", &admin.token, json!({ "name": "youth" }))
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_notify_emails_subscribers_and_pushes() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    for endpoint in ["https://push.test/live", "https://push.test/gone"] {
        let (status, _) = fixture
            .post(
                "/api/push/subscriptions",
                &member.token,
                json!({
                    "topic": ANNOUNCEMENTS_TOPIC,
                    "endpoint": endpoint,
                    "keys": { "p256dh": "p256", "auth": "secret" }
                }),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Retreat", "content": "Join us", "notify": true }),
        )
        .await;
    assert_eq!(status, 200);

    let mailer = fixture.mailer.clone();
    assert!(
        eventually(|| mailer.subjects_starting_with("Announcement: Retreat").len() == 2).await
    );

    let push = fixture.push.clone();
    assert!(eventually(|| push.delivered.lock().unwrap().len() == 1).await);
    let (endpoint, payload) = push.delivered.lock().unwrap()[0].clone();
    assert_eq!(endpoint, "https://push.test/live");
    let payload: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(payload["title"], "Retreat");

    // The expired endpoint is dropped
    let mut remaining = 0;
    for _ in 0..100 {
        remaining = fixture
            .repo
            .list_push_subscriptions(ANNOUNCEMENTS_TOPIC)
            .await
            .unwrap()
            .len();
        if remaining == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_push_public_key() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .call(Method::GET, "/api/push/public-key", None, None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["publicKey"], "BPublicKey");
}

async fn subscribe(fixture: &TestFixture, account: &Account, endpoint: &str) {
    let (status, _) = fixture
        .post(
            "/api/push/subscriptions",
            &account.token,
            json!({
                "topic": ANNOUNCEMENTS_TOPIC,
                "endpoint": endpoint,
                "keys": { "p256dh": "p256", "auth": "secret" }
            }),
        )
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_expired_endpoint_does_not_stop_other_pushes() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let first = fixture
        .approved(&admin, "first@church.test", "First", "member")
        .await;
    let second = fixture
        .approved(&admin, "second@church.test", "Second", "member")
        .await;

    subscribe(&fixture, &first, "https://push.test/gone").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    subscribe(&fixture, &first, "https://push.test/first").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    subscribe(&fixture, &second, "https://push.test/second").await;

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Potluck", "content": "Sunday noon" }),
        )
        .await;
    assert_eq!(status, 200);

    let push = fixture.push.clone();
    assert!(eventually(|| push.delivered.lock().unwrap().len() == 2).await);
    let mut endpoints: Vec<String> = push
        .delivered
        .lock()
        .unwrap()
        .iter()
        .map(|(endpoint, _)| endpoint.clone())
        .collect();
    endpoints.sort();
    assert_eq!(
        endpoints,
        vec!["https://push.test/first", "https://push.test/second"]
    );

    let mut remaining = Vec::new();
    for _ in 0..100 {
        remaining = fixture
            .repo
            .list_push_subscriptions(ANNOUNCEMENTS_TOPIC)
            .await
            .unwrap();
        if remaining.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|s| !s.endpoint.contains("gone")));
}

#[tokio::test]
async fn test_unsubscribe_only_removes_own_endpoint() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let owner = fixture
        .approved(&admin, "owner@church.test", "Owner", "member")
        .await;
    let other = fixture
        .approved(&admin, "other@church.test", "Other", "member")
        .await;

    subscribe(&fixture, &owner, "https://push.test/owner").await;
    subscribe(&fixture, &owner, "https://push.test/owner-laptop").await;

    let unsubscribe = |endpoint: &str| {
        Some(json!({ "topic": ANNOUNCEMENTS_TOPIC, "endpoint": endpoint }))
    };

    let (status, body) = fixture
        .call(
            Method::DELETE,
            "/api/push/subscriptions",
            Some(&other.token),
            unsubscribe("https://push.test/owner"),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], false);

    let (_, body) = fixture
        .call(
            Method::DELETE,
            "/api/push/subscriptions",
            Some(&owner.token),
            unsubscribe("https://push.test/owner"),
        )
        .await;
    assert_eq!(body["data"], true);

    // User managers can clean up anyone's endpoint
    let (_, body) = fixture
        .call(
            Method::DELETE,
            "/api/push/subscriptions",
            Some(&admin.token),
            unsubscribe("https://push.test/owner-laptop"),
        )
        .await;
    assert_eq!(body["data"], true);

    assert!(fixture
        .repo
        .list_push_subscriptions(ANNOUNCEMENTS_TOPIC)
        .await
        .unwrap()
        .is_empty());
}

// ==================== PRAYER ====================

#[tokio::test]
async fn test_prayer_visibility_and_redaction() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let author = fixture
        .approved(&admin, "a@church.test", "Alice", "member")
        .await;
    let other = fixture
        .approved(&admin, "b@church.test", "Bob", "member")
        .await;

    let (status, body) = fixture
        .post(
            "/api/prayer",
            &author.token,
            json!({ "title": "Healing", "content": "For my mother", "type": "prayer", "anonymous": true }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["approval"], "pending");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Pending items are only visible to their author and moderators
    let (_, body) = fixture.get("/api/prayer", &other.token).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = fixture.get("/api/prayer", &author.token).await;
    assert_eq!(items(&body)[0]["authorId"], author.id.as_str());

    let (status, _) = fixture
        .put(
            &format!("/api/prayer/{}/approval", id),
            &other.token,
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, 403);

    let (status, _) = fixture
        .put(
            &format!("/api/prayer/{}/approval", id),
            &admin.token,
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get("/api/prayer", &other.token).await;
    let list = items(&body);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["authorName"], "Anonymous");
    assert!(list[0].get("authorId").is_none());

    let (_, body) = fixture
        .get("/api/prayer?approval=approved", &admin.token)
        .await;
    assert_eq!(items(&body)[0]["authorId"], author.id.as_str());

    // Only the author or a moderator may delete
    let (status, _) = fixture
        .delete(&format!("/api/prayer/{}", id), &other.token)
        .await;
    assert_eq!(status, 403);
    let (status, _) = fixture
        .delete(&format!("/api/prayer/{}", id), &author.token)
        .await;
    assert_eq!(status, 200);
}

// ==================== LIFE GROUPS ====================

#[tokio::test]
async fn test_group_leader_edits_own_group_only() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let leader = fixture
        .approved(&admin, "lead@church.test", "Lead", "lifeGroupLeader")
        .await;
    let other_leader = fixture
        .approved(&admin, "lead2@church.test", "Lead Two", "lifeGroupLeader")
        .await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, body) = fixture
        .post(
            "/api/life-groups",
            &admin.token,
            json!({ "name": "Northside", "leaderId": leader.id, "meetingDay": "Tuesday" }),
        )
        .await;
    assert_eq!(status, 200);
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .put(
            &format!("/api/life-groups/{}", group_id),
            &other_leader.token,
            json!({ "name": "Taken over" }),
        )
        .await;
    assert_eq!(status, 403);

    let (status, body) = fixture
        .put(
            &format!("/api/life-groups/{}", group_id),
            &leader.token,
            json!({ "name": "Northside Tuesdays", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["name"], "Northside Tuesdays");

    let member_path = format!("/api/life-groups/{}/members", group_id);
    let (status, _) = fixture
        .post(
            &member_path,
            &leader.token,
            json!({ "name": "Member", "userId": member.id }),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .post(
            &member_path,
            &leader.token,
            json!({ "name": "Member again", "userId": member.id }),
        )
        .await;
    assert_eq!(status, 409);

    let (_, body) = fixture
        .get(&format!("/api/life-groups/{}", group_id), &member.token)
        .await;
    assert_eq!(body["data"]["memberCount"], 1);
    assert_eq!(body["data"]["members"][0]["name"], "Member");
}

#[tokio::test]
async fn test_roster_removal_checks_version() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture
        .post("/api/life-groups", &admin.token, json!({ "name": "Eastside" }))
        .await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = fixture
        .post(
            &format!("/api/life-groups/{}/members", group_id),
            &admin.token,
            json!({ "name": "Visitor" }),
        )
        .await;
    assert_eq!(status, 200);
    let member_path = format!(
        "/api/life-groups/{}/members/{}",
        group_id,
        body["data"]["id"].as_str().unwrap()
    );

    let (status, body) = fixture
        .put(
            &member_path,
            &admin.token,
            json!({ "phone": "555-0100", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["version"], 2);

    // Removing from a stale view is refused
    let (status, body) = fixture
        .delete(&format!("{}?expectedVersion=1", member_path), &admin.token)
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 2);

    let (status, _) = fixture
        .delete(&format!("{}?expectedVersion=2", member_path), &admin.token)
        .await;
    assert_eq!(status, 200);

    let (status, _) = fixture.delete(&member_path, &admin.token).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_family_total_count_follows_members() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture
        .post(
            "/api/families",
            &admin.token,
            json!({
                "familyName": "Doe",
                "members": [
                    { "name": "Jane", "relationship": "parent" },
                    { "name": "Jim", "age": 7, "relationship": "child" }
                ]
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["totalCount"], 2);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = fixture
        .put(
            &format!("/api/families/{}", id),
            &admin.token,
            json!({ "members": [{ "name": "Jane", "relationship": "parent" }], "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["totalCount"], 1);
}

// ==================== TEACHING ====================

#[tokio::test]
async fn test_teaching_schedule_and_grid() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture
        .post("/api/teachers", &admin.token, json!({ "name": "Ruth" }))
        .await;
    assert_eq!(status, 200);
    let teacher_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .post(
            "/api/teaching/2024-2025/assignments",
            &admin.token,
            json!({ "className": "Sparks", "ageGroup": "3-5", "quarter": "Q1", "teacherId": "nobody" }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = fixture
        .post(
            "/api/teaching/2024-2025/assignments",
            &admin.token,
            json!({ "className": "Sparks", "ageGroup": "3-5", "quarter": "Q2", "teacherId": teacher_id, "isLead": true }),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get("/api/teaching/2024-2025", &admin.token).await;
    assert_eq!(body["data"]["assignments"][0]["teacherName"], "Ruth");

    let (status, body) = fixture
        .get("/api/teaching/2024-2025/grid", &admin.token)
        .await;
    assert_eq!(status, 200);
    let row = &body["data"]["rows"][0];
    assert_eq!(row["className"], "Sparks");
    assert_eq!(row["quarters"]["Q2"][0]["teacherName"], "Ruth");
    assert_eq!(row["quarters"]["Q1"], json!([]));

    // Without a quarter the assignment lands in the current one
    let (status, body) = fixture
        .post(
            "/api/teaching/2024-2025/assignments",
            &admin.token,
            json!({ "className": "Lambs", "ageGroup": "0-2", "teacherId": teacher_id }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        body["data"]["quarter"],
        crate::models::Quarter::current().as_str()
    );

    let (status, _) = fixture.get("/api/teaching/2024-2026", &admin.token).await;
    assert_eq!(status, 400);
}

// ==================== SERVICE SCHEDULING ====================

#[tokio::test]
async fn test_week_save_matches_edit_map() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let ann = fixture
        .approved(&admin, "ann@church.test", "Ann", "member")
        .await;
    let ben = fixture
        .approved(&admin, "ben@church.test", "Ben", "member")
        .await;

    for name in ["Worship", "Sound"] {
        let (status, _) = fixture
            .post("/api/service-roles", &admin.token, json!({ "name": name }))
            .await;
        assert_eq!(status, 200);
    }

    // A Wednesday resolves to the Sunday that starts its week
    let (status, body) = fixture
        .put(
            "/api/service-weeks/2030-06-12",
            &admin.token,
            json!({ "assignments": { "Worship": ann.id, "Sound": ben.id } }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["weekStart"], "2030-06-09");
    assert_eq!(body["data"]["version"], 1);
    let assignments = body["data"]["assignments"].as_array().unwrap().clone();
    assert_eq!(assignments.len(), 2);
    assert!(assignments
        .iter()
        .all(|a| a["status"] == "awaiting_confirmation"));
    let worship_id = assignments
        .iter()
        .find(|a| a["role"] == "Worship")
        .unwrap()["id"]
        .clone();

    let (status, body) = fixture
        .put(
            "/api/service-weeks/2030-06-09",
            &admin.token,
            json!({ "assignments": { "Worship": ann.id, "Sound": null }, "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    let week = &body["data"]["assignments"];
    assert_eq!(week.as_array().unwrap().len(), 1);
    assert_eq!(week[0]["role"], "Worship");
    assert_eq!(week[0]["id"], worship_id);

    let (status, body) = fixture
        .put(
            "/api/service-weeks/2030-06-09",
            &admin.token,
            json!({ "assignments": { "Sound": ben.id }, "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["details"]["currentVersion"], 2);

    let (status, _) = fixture
        .put(
            "/api/service-weeks/2030-06-09",
            &admin.token,
            json!({ "assignments": { "Ushers": ann.id } }),
        )
        .await;
    assert_eq!(status, 400);

    let (_, body) = fixture
        .get("/api/service-weeks/2030-06-15", &ben.token)
        .await;
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["assignments"].as_array().unwrap().len(), 1);

    let mailer = fixture.mailer.clone();
    assert!(eventually(|| mailer.subjects_starting_with("You're scheduled").len() == 2).await);
}

#[tokio::test]
async fn test_only_assignee_responds() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let ann = fixture
        .approved(&admin, "ann@church.test", "Ann", "member")
        .await;
    let ben = fixture
        .approved(&admin, "ben@church.test", "Ben", "member")
        .await;
    fixture
        .post("/api/service-roles", &admin.token, json!({ "name": "Worship" }))
        .await;
    fixture
        .put(
            "/api/service-weeks/2030-06-09",
            &admin.token,
            json!({ "assignments": { "Worship": ann.id } }),
        )
        .await;

    let (_, body) = fixture
        .get("/api/service-assignments/mine", &ann.token)
        .await;
    let mine = items(&body);
    assert_eq!(mine.len(), 1);
    let id = mine[0]["id"].as_str().unwrap().to_string();

    let path = format!("/api/service-assignments/{}/response", id);
    let (status, _) = fixture
        .put(&path, &ben.token, json!({ "accept": true }))
        .await;
    assert_eq!(status, 403);

    let (status, body) = fixture
        .put(&path, &ann.token, json!({ "accept": false }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "declined");
    assert!(body["data"]["respondedAt"].is_string());
}

// ==================== VOLUNTEERS ====================

#[tokio::test]
async fn test_signup_capacity_enforced() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let ann = fixture
        .approved(&admin, "ann@church.test", "Ann", "member")
        .await;
    let ben = fixture
        .approved(&admin, "ben@church.test", "Ben", "member")
        .await;

    let (status, body) = fixture
        .post(
            "/api/volunteer-opportunities",
            &admin.token,
            json!({ "title": "Parking team", "startsAt": "2030-06-09T08:30:00Z", "maxVolunteers": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "open");
    let path = format!(
        "/api/volunteer-opportunities/{}/signup",
        body["data"]["id"].as_str().unwrap()
    );

    let (status, body) = fixture.post(&path, &ann.token, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["volunteers"][0]["name"], "Ann");

    let (status, body) = fixture.post(&path, &ann.token, json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = fixture.post(&path, &ben.token, json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["message"], "Opportunity is full");

    let (status, _) = fixture.delete(&path, &ann.token).await;
    assert_eq!(status, 200);
    let (status, _) = fixture.post(&path, &ben.token, json!({})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_simultaneous_duplicate_signups_report_already_signed_up() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let ann = fixture
        .approved(&admin, "ann@church.test", "Ann", "member")
        .await;

    let (_, body) = fixture
        .post(
            "/api/volunteer-opportunities",
            &admin.token,
            json!({ "title": "Greeters", "startsAt": "2030-06-09T09:00:00Z", "maxVolunteers": 5 }),
        )
        .await;
    let path = format!(
        "/api/volunteer-opportunities/{}/signup",
        body["data"]["id"].as_str().unwrap()
    );

    let (a, b, c) = tokio::join!(
        fixture.post(&path, &ann.token, json!({})),
        fixture.post(&path, &ann.token, json!({})),
        fixture.post(&path, &ann.token, json!({})),
    );

    let results = [a, b, c];
    let accepted = results.iter().filter(|(status, _)| *status == 200).count();
    assert_eq!(accepted, 1);
    for (status, body) in results.iter().filter(|(status, _)| *status != 200) {
        assert_eq!(*status, 409);
        assert_eq!(body["error"]["message"], "Already signed up");
    }
}

#[tokio::test]
async fn test_member_proposals_start_pending() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let ann = fixture
        .approved(&admin, "ann@church.test", "Ann", "member")
        .await;

    let (status, body) = fixture
        .post(
            "/api/volunteer-opportunities",
            &ann.token,
            json!({ "title": "Meal train", "startsAt": "2030-06-10T18:00:00Z" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture
        .get("/api/volunteer-opportunities", &ann.token)
        .await;
    assert_eq!(body["data"], json!([]));

    let (status, _) = fixture
        .put(
            &format!("/api/volunteer-opportunities/{}/status", id),
            &admin.token,
            json!({ "status": "open" }),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture
        .get("/api/volunteer-opportunities", &ann.token)
        .await;
    assert_eq!(items(&body).len(), 1);
}

// ==================== BULLETINS & MEDIA ====================

#[tokio::test]
async fn test_bulletin_kept_when_media_delete_fails() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture
        .post(
            "/api/bulletins",
            &admin.token,
            json!({
                "title": "June 9",
                "date": "2024-06-09",
                "fileUrl": "https://res.cloudinary.com/demo/raw/upload/v1717900000/bulletins/june-9.pdf"
            }),
        )
        .await;
    assert_eq!(status, 200);
    let path = format!("/api/bulletins/{}", body["data"]["id"].as_str().unwrap());

    fixture.media.fail.store(true, Ordering::SeqCst);
    let (status, body) = fixture.delete(&path, &admin.token).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "EXTERNAL_SERVICE_ERROR");
    let (_, body) = fixture.get("/api/bulletins", &admin.token).await;
    assert_eq!(items(&body).len(), 1);

    fixture.media.fail.store(false, Ordering::SeqCst);
    let (status, _) = fixture.delete(&path, &admin.token).await;
    assert_eq!(status, 200);
    let (_, body) = fixture.get("/api/bulletins", &admin.token).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(
        *fixture.media.destroyed.lock().unwrap(),
        vec!["bulletins/june-9.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_media_signature_folders() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, _) = fixture
        .get("/api/media/signature?folder=bulletins", &member.token)
        .await;
    assert_eq!(status, 403);

    let (status, _) = fixture
        .get("/api/media/signature?folder=anything", &admin.token)
        .await;
    assert_eq!(status, 400);

    let (status, body) = fixture
        .get("/api/media/signature?folder=bulletins", &admin.token)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["folder"], "bulletins");
    assert_eq!(body["data"]["signatureAlgorithm"], "sha256");
}

// ==================== DIRECTORY ====================

#[tokio::test]
async fn test_directory_submission_flow() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let member = fixture
        .approved(&admin, "m@church.test", "Member", "member")
        .await;

    let (status, _) = fixture
        .post(
            "/api/directory/submissions",
            &member.token,
            json!({ "firstName": "Jane", "lastName": "Doe" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, _) = fixture
        .get("/api/directory/submissions", &member.token)
        .await;
    assert_eq!(status, 403);

    let (_, body) = fixture
        .get("/api/directory/submissions", &admin.token)
        .await;
    let submissions = items(&body);
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["firstName"], "Jane");
    assert_eq!(submissions[0]["status"], "pending");
    assert_eq!(submissions[0]["photoUrl"], "");
    let id = submissions[0]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture.get("/api/directory", &member.token).await;
    assert_eq!(body["data"], json!([]));

    let approve = format!("/api/directory/submissions/{}/approve", id);
    let (status, body) = fixture.put(&approve, &admin.token, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["lastName"], "Doe");

    let (_, body) = fixture.get("/api/directory?q=do", &member.token).await;
    assert_eq!(items(&body).len(), 1);

    let (status, _) = fixture.put(&approve, &admin.token, json!({})).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_directory_hidden_from_plain_users() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    let user = fixture
        .approved(&admin, "u@church.test", "User", "user")
        .await;

    let (status, _) = fixture.get("/api/directory", &user.token).await;
    assert_eq!(status, 403);
}

// ==================== SERMONS ====================

#[tokio::test]
async fn test_sermon_sync_upserts_by_video() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (status, body) = fixture
        .post("/api/sermons/sync", &admin.token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["added"], 2);

    let (_, body) = fixture
        .post("/api/sermons/sync", &admin.token, json!({}))
        .await;
    assert_eq!(body["data"]["added"], 0);
    assert_eq!(body["data"]["updated"], 0);

    let (_, body) = fixture.get("/api/sermons", &admin.token).await;
    let sermons = items(&body);
    assert_eq!(sermons.len(), 2);
    let ids: HashSet<&str> = sermons
        .iter()
        .filter_map(|s| s["videoId"].as_str())
        .collect();
    assert!(ids.contains("abc123def45"));

    let (status, _) = fixture
        .post(
            "/api/sermons",
            &admin.token,
            json!({ "title": "Dup", "videoUrl": "https://youtu.be/abc123def45" }),
        )
        .await;
    assert_eq!(status, 409);

    let (status, _) = fixture
        .post(
            "/api/sermons",
            &admin.token,
            json!({ "title": "Bad", "videoUrl": "https://example.com/video" }),
        )
        .await;
    assert_eq!(status, 400);
}

// ==================== CHANGE FEED ====================

#[tokio::test]
async fn test_changes_returns_immediately_when_behind() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Hello", "content": "World" }),
        )
        .await;

    let (status, body) = fixture
        .get("/api/changes?since=0&timeoutSecs=30", &admin.token)
        .await;
    assert_eq!(status, 200);
    let collections = body["data"]["collections"].as_array().unwrap();
    assert!(collections.contains(&json!("announcements")));
    assert!(collections.contains(&json!("users")));
}

#[tokio::test]
async fn test_changes_long_poll_wakes_on_write() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture.get("/api/revisions", &admin.token).await;
    let since = body["data"]["revisionId"].as_i64().unwrap();

    let poll = {
        let request = fixture
            .client
            .get(fixture.url(&format!("/api/changes?since={}&timeoutSecs=10", since)))
            .bearer_auth(&admin.token);
        tokio::spawn(async move { request.send().await.unwrap().json::<Value>().await.unwrap() })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Live", "content": "Update" }),
        )
        .await;

    let body = tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("long poll should wake before its timeout")
        .unwrap();
    assert!(body["data"]["revisionId"].as_i64().unwrap() > since);
    assert_eq!(body["data"]["collections"], json!(["announcements"]));
}

#[tokio::test]
async fn test_changes_times_out_quietly() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let (_, body) = fixture.get("/api/revisions", &admin.token).await;
    let since = body["data"]["revisionId"].as_i64().unwrap();

    let (status, body) = fixture
        .get(
            &format!("/api/changes?since={}&timeoutSecs=1", since),
            &admin.token,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["collections"], json!([]));
}

// ==================== INTERNAL ====================

#[tokio::test]
async fn test_digest_requires_key() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;
    fixture
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Weekly", "content": "News" }),
        )
        .await;

    let resp = fixture
        .client
        .post(fixture.url("/internal/digest"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/internal/digest"))
        .header(API_KEY_HEADER, "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // A user session is not a substitute for the key
    let resp = fixture
        .client
        .post(fixture.url("/internal/digest"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/internal/digest"))
        .header(API_KEY_HEADER, DIGEST_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["recipients"], 1);
    assert_eq!(body["data"]["sent"], 1);
    assert_eq!(fixture.mailer.subjects_starting_with("This week").len(), 1);

    // Schedulers that only send bearer tokens use the same key
    let resp = fixture
        .client
        .post(fixture.url("/internal/digest"))
        .bearer_auth(DIGEST_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(fixture.mailer.subjects_starting_with("This week").len(), 2);
}
