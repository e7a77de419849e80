//! SQLite Store Integration Tests
//!
//! Constraint enforcement, sign-up atomicity and ordering against a real
//! SQLite database.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use fg_platform::domain::{
    IdentityProvider, InvitationStatus, Platform, PlatformRole, Project, User, UserIdentity,
    UserInvitation,
};
use fg_platform::repository::{
    IdentityRepository, InvitationRepository, MemberSignUp, PlatformRepository, ProjectRepository,
    RootSignUp, SignUpUnitOfWork, SqliteStore, UserRepository,
};

fn root_sign_up(email: &str) -> RootSignUp {
    let identity = UserIdentity::new(email, "Ada", "Lovelace", IdentityProvider::Email)
        .with_password_hash("$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA");
    let user = User::new(&identity.id, PlatformRole::Admin);
    let platform = Platform::new(&user.id, Platform::personal_name("Ada"));
    let project = Project::default_for(&user.id, &platform.id);
    RootSignUp {
        identity,
        user,
        platform,
        project,
    }
}

async fn count(store: &SqliteStore, table: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .unwrap();
    row.0
}

mod sign_up_tests {
    use super::*;

    #[tokio::test]
    async fn test_root_sign_up_persists_all_entities() {
        let store = SqliteStore::in_memory().await.unwrap();
        let sign_up = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&sign_up).await.unwrap();

        let user = store.find_user(&sign_up.user.id).await.unwrap().unwrap();
        assert_eq!(user.platform_id.as_deref(), Some(sign_up.platform.id.as_str()));

        let platform = store.find_platform(&sign_up.platform.id).await.unwrap().unwrap();
        assert_eq!(platform.owner_id, user.id);

        let project = store.find_project(&sign_up.project.id).await.unwrap().unwrap();
        assert_eq!(project.platform_id, platform.id);

        let identity = store
            .find_identity_by_email("ADA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.id, sign_up.identity.id);
        assert!(identity.password_hash.is_some());
    }

    #[tokio::test]
    async fn test_failed_root_sign_up_leaves_nothing_behind() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&first).await.unwrap();

        // Identity and user insert fine, then the platform id collides
        let mut second = root_sign_up("grace@example.com");
        second.platform.id = first.platform.id.clone();
        let err = store.commit_root_sign_up(&second).await.unwrap_err();
        assert!(err.is_conflict());

        assert!(store.find_identity(&second.identity.id).await.unwrap().is_none());
        assert!(store.find_user(&second.user.id).await.unwrap().is_none());
        assert!(store.find_project(&second.project.id).await.unwrap().is_none());
        assert_eq!(count(&store, "user_identities").await, 1);
        assert_eq!(count(&store, "users").await, 1);
        assert_eq!(count(&store, "projects").await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.commit_root_sign_up(&root_sign_up("ada@example.com")).await.unwrap();

        let err = store
            .commit_root_sign_up(&root_sign_up("ada@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(count(&store, "platforms").await, 1);
    }

    #[tokio::test]
    async fn test_member_sign_up_accepts_invitation() {
        let store = SqliteStore::in_memory().await.unwrap();
        let root = root_sign_up("owner@corp.com");
        store.commit_root_sign_up(&root).await.unwrap();

        let invitation = UserInvitation::new("bob@corp.com", &root.platform.id, PlatformRole::Member)
            .with_inviter(&root.user.id);
        store.insert_invitation(&invitation).await.unwrap();

        let identity = UserIdentity::new("bob@corp.com", "Bob", "Builder", IdentityProvider::Email)
            .with_verified(true);
        let user = User::new(&identity.id, PlatformRole::Member).with_platform(&root.platform.id);
        store
            .commit_member_sign_up(&MemberSignUp {
                new_identity: Some(identity.clone()),
                user: user.clone(),
                invitation_email: "Bob@Corp.com".to_string(),
            })
            .await
            .unwrap();

        let found = store
            .find_user_by_identity_and_platform(&identity.id, &root.platform.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(store
            .find_pending_invitation("bob@corp.com", &root.platform.id)
            .await
            .unwrap()
            .is_none());

        let listed = store.list_invitations_for_platform(&root.platform.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, InvitationStatus::Accepted);
    }

    #[tokio::test]
    async fn test_member_sign_up_to_missing_platform_rolls_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        let identity = UserIdentity::new("bob@corp.com", "Bob", "Builder", IdentityProvider::Email);
        let user = User::new(&identity.id, PlatformRole::Member).with_platform("0MISSINGPLATF");

        let result = store
            .commit_member_sign_up(&MemberSignUp {
                new_identity: Some(identity.clone()),
                user,
                invitation_email: identity.email.clone(),
            })
            .await;
        assert!(result.is_err());
        assert!(store.find_identity(&identity.id).await.unwrap().is_none());
    }
}

mod constraint_tests {
    use super::*;

    #[tokio::test]
    async fn test_user_unique_per_identity_and_platform() {
        let store = SqliteStore::in_memory().await.unwrap();
        let root = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&root).await.unwrap();

        let duplicate =
            User::new(&root.identity.id, PlatformRole::Member).with_platform(&root.platform.id);
        let err = store.insert_user(&duplicate).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_platform_delete_cascades() {
        let store = SqliteStore::in_memory().await.unwrap();
        let root = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&root).await.unwrap();

        sqlx::query("DELETE FROM platforms WHERE id = ?")
            .bind(&root.platform.id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(store.find_user(&root.user.id).await.unwrap().is_none());
        assert!(store.find_project(&root.project.id).await.unwrap().is_none());
        assert!(store.find_identity(&root.identity.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_platform_settings_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let root = root_sign_up("ada@example.com");
        store.commit_root_sign_up(&root).await.unwrap();

        let mut platform = root
            .platform
            .clone()
            .with_sso(true)
            .with_allowed_domains(vec!["Corp.com".to_string(), "corp.io".to_string()]);
        platform.email_auth_enabled = false;
        store.update_platform(&platform).await.unwrap();

        let loaded = store.find_platform(&platform.id).await.unwrap().unwrap();
        assert!(loaded.sso_enabled);
        assert!(!loaded.email_auth_enabled);
        assert!(loaded.enforce_allowed_auth_domains);
        assert_eq!(loaded.allowed_auth_domains, vec!["corp.com", "corp.io"]);
    }
}

mod ordering_tests {
    use super::*;

    #[tokio::test]
    async fn test_oldest_platform_and_project_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let newer = root_sign_up("newer@example.com");
        let mut older = root_sign_up("older@example.com");
        older.platform.created_at = Utc::now() - ChronoDuration::days(30);

        store.commit_root_sign_up(&newer).await.unwrap();
        store.commit_root_sign_up(&older).await.unwrap();

        let oldest = store.find_oldest_platform().await.unwrap().unwrap();
        assert_eq!(oldest.id, older.platform.id);

        let mut early = Project::new(&newer.user.id, &newer.platform.id, "Early");
        early.created_at = Utc::now() - ChronoDuration::days(1);
        store.insert_project(&early).await.unwrap();

        let projects = store.list_projects_for_platform(&newer.platform.id).await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Early", "Default Project"]);
    }

    #[tokio::test]
    async fn test_platforms_for_identity() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ada = root_sign_up("ada@example.com");
        let grace = root_sign_up("grace@example.com");
        store.commit_root_sign_up(&ada).await.unwrap();
        store.commit_root_sign_up(&grace).await.unwrap();

        let membership =
            User::new(&ada.identity.id, PlatformRole::Member).with_platform(&grace.platform.id);
        store.insert_user(&membership).await.unwrap();

        let platforms = store.list_platforms_for_identity(&ada.identity.id).await.unwrap();
        let ids: Vec<_> = platforms.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![ada.platform.id.clone(), grace.platform.id.clone()]);
    }
}

mod file_tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("auth.db").display());
        let sign_up = root_sign_up("ada@example.com");

        {
            let store = SqliteStore::connect(&url, 2, Duration::from_secs(5)).await.unwrap();
            store.init_schema().await.unwrap();
            store.commit_root_sign_up(&sign_up).await.unwrap();
            store.pool().close().await;
        }

        let store = SqliteStore::connect(&url, 2, Duration::from_secs(5)).await.unwrap();
        store.init_schema().await.unwrap();
        let platform = store.find_oldest_platform().await.unwrap().unwrap();
        assert_eq!(platform.id, sign_up.platform.id);
    }
}

mod concurrency_tests {
    use super::*;
    use std::sync::Arc;

    use fg_common::Edition;
    use fg_platform::service::{
        Argon2Config, AuthConfig, AuthenticationService, SignUpCredential, SignUpParams,
    };
    use fg_platform::PlatformError;

    fn params(email: &str) -> SignUpParams {
        SignUpParams {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            credential: SignUpCredential::Password("correct-horse-battery".to_string()),
            track_events: false,
            news_letter: false,
            platform_id: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_same_email_sign_ups_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("auth.db").display());
        let store = SqliteStore::connect(&url, 8, Duration::from_secs(5)).await.unwrap();
        store.init_schema().await.unwrap();
        let store = Arc::new(store);

        let config = AuthConfig {
            secret: "sqlite-test-secret-0123456789abcdef".to_string(),
            ..Default::default()
        };
        let auth = Arc::new(
            AuthenticationService::builder(store.clone(), Edition::Cloud, config)
                .argon2(Argon2Config::low_cost())
                .build()
                .unwrap(),
        );

        let attempts = (0..8).map(|_| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.sign_up(params("race@example.com")).await })
        });
        let results: Vec<_> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(err.is_conflict(), "unexpected error: {:?}", err);
            assert_eq!(err.code(), "EXISTING_USER");
        }
        assert!(!results
            .iter()
            .any(|r| matches!(r, Err(PlatformError::Internal { .. }))));

        assert_eq!(count(&store, "user_identities").await, 1);
        assert_eq!(count(&store, "users").await, 1);
        assert_eq!(count(&store, "platforms").await, 1);
    }
}
