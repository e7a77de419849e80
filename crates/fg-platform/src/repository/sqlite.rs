//! SQLite store
//!
//! Timestamps are stored as INTEGER milliseconds since the Unix epoch and
//! every list is ordered by `(created_at, id)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::{
    normalize_email, Flag, Otp, OtpType, Platform, Project, User, UserIdentity, UserInvitation,
};
use crate::error::{PlatformError, Result};
use crate::repository::{
    FlagRepository, IdentityRepository, InvitationRepository, MemberSignUp, OtpRepository,
    PlatformRepository, ProjectRepository, RootSignUp, SignUpUnitOfWork, UserRepository,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS user_identities (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        password_hash TEXT,
        provider TEXT NOT NULL,
        verified INTEGER NOT NULL DEFAULT 0,
        track_events INTEGER NOT NULL DEFAULT 0,
        news_letter INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS platforms (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        sso_enabled INTEGER NOT NULL DEFAULT 0,
        embedding_enabled INTEGER NOT NULL DEFAULT 0,
        email_auth_enabled INTEGER NOT NULL DEFAULT 1,
        enforce_allowed_auth_domains INTEGER NOT NULL DEFAULT 0,
        allowed_auth_domains TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_platforms_created ON platforms(created_at, id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        identity_id TEXT NOT NULL REFERENCES user_identities(id) ON DELETE CASCADE,
        platform_id TEXT REFERENCES platforms(id) ON DELETE CASCADE,
        platform_role TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (identity_id, platform_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        platform_id TEXT NOT NULL REFERENCES platforms(id) ON DELETE CASCADE,
        display_name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_projects_platform ON projects(platform_id, created_at, id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_invitations (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        platform_id TEXT NOT NULL REFERENCES platforms(id) ON DELETE CASCADE,
        platform_role TEXT NOT NULL,
        project_id TEXT,
        status TEXT NOT NULL,
        invited_by TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_invitations_email ON user_invitations(email, platform_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS otps (
        identity_id TEXT NOT NULL REFERENCES user_identities(id) ON DELETE CASCADE,
        otp_type TEXT NOT NULL,
        value_hash TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (identity_id, otp_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS flags (
        id TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (and create if missing) a database file. Call `init_schema`
    /// before use.
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            // Concurrent sign-ups queue on the write lock instead of failing
            .busy_timeout(acquire_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database with the schema applied. A single pinned
    /// connection keeps the database alive for the life of the pool.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("SQLite schema initialized");
        Ok(())
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PlatformError::internal(format!("Timestamp out of range: {}", millis)))
}

/// Translate constraint failures into domain errors; everything else stays a
/// storage error.
fn map_write_error(err: sqlx::Error, entity_type: &str, field: &str, value: &str) -> PlatformError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return PlatformError::conflict(entity_type, field, value);
        }
        if db.is_foreign_key_violation() {
            return PlatformError::not_found(entity_type, format!("reference for {}", value));
        }
    }
    PlatformError::Database(err)
}

fn identity_from_row(row: &SqliteRow) -> Result<UserIdentity> {
    Ok(UserIdentity {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        password_hash: row.try_get("password_hash")?,
        provider: row.try_get::<String, _>("provider")?.parse()?,
        verified: row.try_get("verified")?,
        track_events: row.try_get("track_events")?,
        news_letter: row.try_get("news_letter")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn platform_from_row(row: &SqliteRow) -> Result<Platform> {
    let domains: String = row.try_get("allowed_auth_domains")?;
    Ok(Platform {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        sso_enabled: row.try_get("sso_enabled")?,
        embedding_enabled: row.try_get("embedding_enabled")?,
        email_auth_enabled: row.try_get("email_auth_enabled")?,
        enforce_allowed_auth_domains: row.try_get("enforce_allowed_auth_domains")?,
        allowed_auth_domains: serde_json::from_str(&domains)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        identity_id: row.try_get("identity_id")?,
        platform_id: row.try_get("platform_id")?,
        platform_role: row.try_get::<String, _>("platform_role")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        platform_id: row.try_get("platform_id")?,
        display_name: row.try_get("display_name")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn invitation_from_row(row: &SqliteRow) -> Result<UserInvitation> {
    Ok(UserInvitation {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        platform_id: row.try_get("platform_id")?,
        platform_role: row.try_get::<String, _>("platform_role")?.parse()?,
        project_id: row.try_get("project_id")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        invited_by: row.try_get("invited_by")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn otp_from_row(row: &SqliteRow) -> Result<Otp> {
    Ok(Otp {
        identity_id: row.try_get("identity_id")?,
        otp_type: row.try_get::<String, _>("otp_type")?.parse()?,
        value_hash: row.try_get("value_hash")?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

async fn insert_identity_row(conn: &mut SqliteConnection, identity: &UserIdentity) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_identities
            (id, email, first_name, last_name, password_hash, provider, verified,
             track_events, news_letter, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&identity.id)
    .bind(&identity.email)
    .bind(&identity.first_name)
    .bind(&identity.last_name)
    .bind(&identity.password_hash)
    .bind(identity.provider.as_str())
    .bind(identity.verified)
    .bind(identity.track_events)
    .bind(identity.news_letter)
    .bind(to_millis(identity.created_at))
    .bind(to_millis(identity.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "UserIdentity", "email", &identity.email))?;
    Ok(())
}

async fn insert_user_row(
    conn: &mut SqliteConnection,
    user: &User,
    platform_id: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, identity_id, platform_id, platform_role, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.identity_id)
    .bind(platform_id)
    .bind(user.platform_role.as_str())
    .bind(user.status.as_str())
    .bind(to_millis(user.created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        let pair = format!("{}+{}", user.identity_id, platform_id.unwrap_or_default());
        map_write_error(e, "User", "identityId+platformId", &pair)
    })?;
    Ok(())
}

async fn insert_platform_row(conn: &mut SqliteConnection, platform: &Platform) -> Result<()> {
    let domains = serde_json::to_string(&platform.allowed_auth_domains)?;
    sqlx::query(
        r#"
        INSERT INTO platforms
            (id, owner_id, name, sso_enabled, embedding_enabled, email_auth_enabled,
             enforce_allowed_auth_domains, allowed_auth_domains, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&platform.id)
    .bind(&platform.owner_id)
    .bind(&platform.name)
    .bind(platform.sso_enabled)
    .bind(platform.embedding_enabled)
    .bind(platform.email_auth_enabled)
    .bind(platform.enforce_allowed_auth_domains)
    .bind(domains)
    .bind(to_millis(platform.created_at))
    .bind(to_millis(platform.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "Platform", "id", &platform.id))?;
    Ok(())
}

async fn insert_project_row(conn: &mut SqliteConnection, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, owner_id, platform_id, display_name, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.id)
    .bind(&project.owner_id)
    .bind(&project.platform_id)
    .bind(&project.display_name)
    .bind(to_millis(project.created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, "Project", "id", &project.id))?;
    Ok(())
}

#[async_trait]
impl IdentityRepository for SqliteStore {
    async fn find_identity(&self, id: &str) -> Result<Option<UserIdentity>> {
        let row = sqlx::query("SELECT * FROM user_identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        let row = sqlx::query("SELECT * FROM user_identities WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn insert_identity(&self, identity: &UserIdentity) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_identity_row(&mut conn, identity).await
    }

    async fn update_identity(&self, identity: &UserIdentity) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_identities
            SET email = ?, first_name = ?, last_name = ?, password_hash = ?, provider = ?,
                verified = ?, track_events = ?, news_letter = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.password_hash)
        .bind(identity.provider.as_str())
        .bind(identity.verified)
        .bind(identity.track_events)
        .bind(identity.news_letter)
        .bind(to_millis(identity.updated_at))
        .bind(&identity.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "UserIdentity", "email", &identity.email))?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("UserIdentity", &identity.id));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformRepository for SqliteStore {
    async fn find_platform(&self, id: &str) -> Result<Option<Platform>> {
        let row = sqlx::query("SELECT * FROM platforms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(platform_from_row).transpose()
    }

    async fn find_oldest_platform(&self) -> Result<Option<Platform>> {
        let row = sqlx::query("SELECT * FROM platforms ORDER BY created_at ASC, id ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(platform_from_row).transpose()
    }

    async fn list_platforms_for_identity(&self, identity_id: &str) -> Result<Vec<Platform>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM platforms p
            JOIN users u ON u.platform_id = p.id
            WHERE u.identity_id = ?
            ORDER BY p.created_at ASC, p.id ASC
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(platform_from_row).collect()
    }

    async fn update_platform(&self, platform: &Platform) -> Result<()> {
        let domains = serde_json::to_string(&platform.allowed_auth_domains)?;
        let result = sqlx::query(
            r#"
            UPDATE platforms
            SET owner_id = ?, name = ?, sso_enabled = ?, embedding_enabled = ?,
                email_auth_enabled = ?, enforce_allowed_auth_domains = ?,
                allowed_auth_domains = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&platform.owner_id)
        .bind(&platform.name)
        .bind(platform.sso_enabled)
        .bind(platform.embedding_enabled)
        .bind(platform.email_auth_enabled)
        .bind(platform.enforce_allowed_auth_domains)
        .bind(domains)
        .bind(to_millis(platform.updated_at))
        .bind(&platform.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("Platform", &platform.id));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_identity_and_platform(
        &self,
        identity_id: &str,
        platform_id: &str,
    ) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE identity_id = ? AND platform_id = ?")
            .bind(identity_id)
            .bind(platform_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_user_row(&mut conn, user, user.platform_id.as_deref()).await
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET platform_id = ?, platform_role = ?, status = ? WHERE id = ?",
        )
        .bind(&user.platform_id)
        .bind(user.platform_role.as_str())
        .bind(user.status.as_str())
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User", "identityId+platformId", &user.identity_id))?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("User", &user.id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for SqliteStore {
    async fn find_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_projects_for_platform(&self, platform_id: &str) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT * FROM projects WHERE platform_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(platform_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_from_row).collect()
    }

    async fn insert_project(&self, project: &Project) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_project_row(&mut conn, project).await
    }
}

#[async_trait]
impl InvitationRepository for SqliteStore {
    async fn insert_invitation(&self, invitation: &UserInvitation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_invitations
                (id, email, platform_id, platform_role, project_id, status, invited_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.email)
        .bind(&invitation.platform_id)
        .bind(invitation.platform_role.as_str())
        .bind(&invitation.project_id)
        .bind(invitation.status.as_str())
        .bind(&invitation.invited_by)
        .bind(to_millis(invitation.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "UserInvitation", "id", &invitation.id))?;
        Ok(())
    }

    async fn find_pending_invitation(
        &self,
        email: &str,
        platform_id: &str,
    ) -> Result<Option<UserInvitation>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM user_invitations
            WHERE email = ? AND platform_id = ? AND status = 'PENDING'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(normalize_email(email))
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(invitation_from_row).transpose()
    }

    async fn list_invitations_for_platform(&self, platform_id: &str) -> Result<Vec<UserInvitation>> {
        let rows = sqlx::query(
            "SELECT * FROM user_invitations WHERE platform_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(platform_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(invitation_from_row).collect()
    }
}

#[async_trait]
impl OtpRepository for SqliteStore {
    async fn save_otp(&self, otp: &Otp) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otps (identity_id, otp_type, value_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (identity_id, otp_type) DO UPDATE SET
                value_hash = excluded.value_hash,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at
            "#,
        )
        .bind(&otp.identity_id)
        .bind(otp.otp_type.as_str())
        .bind(&otp.value_hash)
        .bind(to_millis(otp.expires_at))
        .bind(to_millis(otp.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Otp", "identityId", &otp.identity_id))?;
        Ok(())
    }

    async fn find_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<Option<Otp>> {
        let row = sqlx::query("SELECT * FROM otps WHERE identity_id = ? AND otp_type = ?")
            .bind(identity_id)
            .bind(otp_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(otp_from_row).transpose()
    }

    async fn delete_otp(&self, identity_id: &str, otp_type: OtpType) -> Result<()> {
        sqlx::query("DELETE FROM otps WHERE identity_id = ? AND otp_type = ?")
            .bind(identity_id)
            .bind(otp_type.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FlagRepository for SqliteStore {
    async fn find_flag(&self, id: &str) -> Result<Option<Flag>> {
        let row = sqlx::query("SELECT id, value, updated_at FROM flags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let value: String = row.try_get("value")?;
                Ok(Some(Flag {
                    id: row.try_get("id")?,
                    value: serde_json::from_str(&value)?,
                    updated_at: from_millis(row.try_get("updated_at")?)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_flag(&self, flag: &Flag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flags (id, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&flag.id)
        .bind(serde_json::to_string(&flag.value)?)
        .bind(to_millis(flag.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SignUpUnitOfWork for SqliteStore {
    async fn commit_root_sign_up(&self, sign_up: &RootSignUp) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_identity_row(&mut tx, &sign_up.identity).await?;
        // The owner row exists before its platform; ownership is assigned
        // once the platform is in place.
        insert_user_row(&mut tx, &sign_up.user, None).await?;
        insert_platform_row(&mut tx, &sign_up.platform).await?;
        sqlx::query("UPDATE users SET platform_id = ? WHERE id = ?")
            .bind(&sign_up.platform.id)
            .bind(&sign_up.user.id)
            .execute(&mut *tx)
            .await?;
        insert_project_row(&mut tx, &sign_up.project).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn commit_member_sign_up(&self, sign_up: &MemberSignUp) -> Result<()> {
        let platform_id = sign_up
            .user
            .platform_id
            .as_deref()
            .ok_or_else(|| PlatformError::validation("Member user must be bound to a platform"))?;

        let mut tx = self.pool.begin().await?;

        if let Some(identity) = &sign_up.new_identity {
            insert_identity_row(&mut tx, identity).await?;
        }
        insert_user_row(&mut tx, &sign_up.user, Some(platform_id)).await?;
        sqlx::query(
            r#"
            UPDATE user_invitations SET status = 'ACCEPTED'
            WHERE email = ? AND platform_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(normalize_email(&sign_up.invitation_email))
        .bind(platform_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
