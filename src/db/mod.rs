//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod announcements;
mod bulletins;
mod directory;
mod life_groups;
mod prayer;
mod push;
mod repository;
mod sermons;
mod service;
mod teaching;
mod users;
mod volunteers;

pub use repository::*;
pub use users::NewUser;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));

        CREATE TABLE IF NOT EXISTS collection_revisions (
            collection TEXT PRIMARY KEY,
            revision_id INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            is_admin INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            notifications_enabled INTEGER NOT NULL DEFAULT 0,
            email_announcements INTEGER NOT NULL DEFAULT 1,
            email_prayer_requests INTEGER NOT NULL DEFAULT 0,
            email_volunteer_opportunities INTEGER NOT NULL DEFAULT 0,
            email_service_reminders INTEGER NOT NULL DEFAULT 1,
            photo_url TEXT,
            session_epoch INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS announcements (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            category TEXT,
            author_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS event_categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            color TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prayer_items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            kind TEXT NOT NULL,
            author_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            anonymous INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            approval TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS life_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            leader_id TEXT,
            meeting_day TEXT,
            meeting_time TEXT,
            location TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS life_group_members (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL REFERENCES life_groups(id) ON DELETE CASCADE,
            user_id TEXT,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            joined_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_life_group_members_user
            ON life_group_members(group_id, user_id) WHERE user_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS families (
            id TEXT PRIMARY KEY,
            family_name TEXT NOT NULL,
            members TEXT NOT NULL DEFAULT '[]',
            photo_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS life_group_families (
            group_id TEXT NOT NULL REFERENCES life_groups(id) ON DELETE CASCADE,
            family_id TEXT NOT NULL REFERENCES families(id) ON DELETE CASCADE,
            PRIMARY KEY (group_id, family_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teachers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS teaching_schedules (
            school_year TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS teacher_assignments (
            id TEXT PRIMARY KEY,
            school_year TEXT NOT NULL REFERENCES teaching_schedules(school_year) ON DELETE CASCADE,
            class_name TEXT NOT NULL,
            age_group TEXT NOT NULL,
            quarter TEXT NOT NULL,
            teacher_id TEXT NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
            is_lead INTEGER NOT NULL DEFAULT 0,
            is_substitute INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS service_weeks (
            week_start TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS service_assignments (
            id TEXT PRIMARY KEY,
            week_start TEXT NOT NULL,
            role TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            responded_at TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS volunteer_opportunities (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            starts_at TEXT NOT NULL,
            location TEXT,
            max_volunteers INTEGER,
            status TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS volunteer_signups (
            opportunity_id TEXT NOT NULL REFERENCES volunteer_opportunities(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            signed_up_at TEXT NOT NULL,
            PRIMARY KEY (opportunity_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bulletins (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            file_url TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS directory_submissions (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            address TEXT,
            photo_url TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending',
            submitted_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            decided_at TEXT,
            decided_by TEXT
        );

        CREATE TABLE IF NOT EXISTS directory_members (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            address TEXT,
            photo_url TEXT NOT NULL DEFAULT '',
            submission_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sermons (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            speaker TEXT,
            preached_on TEXT,
            video_id TEXT UNIQUE,
            video_url TEXT,
            description TEXT,
            thumbnail_url TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS push_subscriptions (
            id TEXT PRIMARY KEY,
            topic TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            p256dh TEXT NOT NULL,
            auth TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (topic, endpoint)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);
        CREATE INDEX IF NOT EXISTS idx_announcements_created_at ON announcements(created_at);
        CREATE INDEX IF NOT EXISTS idx_prayer_items_created_at ON prayer_items(created_at);
        CREATE INDEX IF NOT EXISTS idx_life_group_members_group ON life_group_members(group_id);
        CREATE INDEX IF NOT EXISTS idx_teacher_assignments_year ON teacher_assignments(school_year);
        CREATE INDEX IF NOT EXISTS idx_service_assignments_week ON service_assignments(week_start);
        CREATE INDEX IF NOT EXISTS idx_service_assignments_user ON service_assignments(user_id);
        CREATE INDEX IF NOT EXISTS idx_directory_members_name ON directory_members(last_name, first_name);
        CREATE INDEX IF NOT EXISTS idx_directory_submissions_status ON directory_submissions(status);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
