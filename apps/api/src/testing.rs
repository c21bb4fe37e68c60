//! In-memory stand-ins for the external backends, used by unit and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{AuthError, IdentityProvider};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::analysis::AnalysisRow;
use crate::models::resume::{NewResume, ResumeRow, ResumeStatus};
use crate::models::user::{Locale, Profile, User};
use crate::repository::{MetadataRepository, RepositoryError};
use crate::scoring::{ResumeScorer, ScoringInput};
use crate::state::AppState;
use crate::storage::{ObjectStore, StorageError};

fn injected(what: &str) -> RepositoryError {
    RepositoryError::Database(sqlx::Error::Protocol(format!("injected {what} failure")))
}

// ────────────────────────────────────────────────────────────────────────────
// Object store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected put failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(format!("memory://{key}?expires={}", ttl.as_secs()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Metadata repository
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    resumes: HashMap<Uuid, ResumeRow>,
    analyses: Vec<AnalysisRow>,
}

/// Mirrors the Postgres constraints: unique email, unique (user, name) over
/// all of a user's rows, and quota checked atomically with the insert.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    hide_next_email_lookup: AtomicBool,
    fail_transitions: AtomicBool,
    fail_row_deletes: AtomicBool,
    finalize_after_next_scan: AtomicBool,
}

impl MemoryRepository {
    pub fn seed_user(&self, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(id, user_from_profile(id, &sample_profile(email)));
        tables.emails.insert(email.to_string(), id);
        id
    }

    pub fn hide_next_email_lookup(&self) {
        self.hide_next_email_lookup.store(true, Ordering::SeqCst);
    }

    pub fn fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_row_deletes(&self, fail: bool) {
        self.fail_row_deletes.store(fail, Ordering::SeqCst);
    }

    /// The next `stale_resumes` call returns its rows, then moves every
    /// pending row to live, as a late finalize would.
    pub fn finalize_after_next_scan(&self) {
        self.finalize_after_next_scan.store(true, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn row_count(&self) -> usize {
        self.tables.lock().unwrap().resumes.len()
    }

    /// Rows holding a quota slot for `user_id`, whatever their status.
    pub fn slot_count(&self, user_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .resumes
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    pub fn analysis_count(&self) -> usize {
        self.tables.lock().unwrap().analyses.len()
    }
}

fn name_conflict(tables: &Tables, user_id: Uuid, name: &str, exclude: Option<Uuid>) -> bool {
    tables.resumes.values().any(|r| {
        r.user_id == user_id && r.name == name && Some(r.resume_id) != exclude
    })
}

#[async_trait]
impl MetadataRepository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        if self.hide_next_email_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &User, email: &str) -> Result<Option<Uuid>, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.emails.contains_key(email) {
            return Ok(None);
        }
        tables.users.insert(user.id, user.clone());
        tables.emails.insert(email.to_string(), user.id);
        Ok(Some(user.id))
    }

    async fn count_active_resumes(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        Ok(self.slot_count(user_id) as i64)
    }

    async fn name_taken(
        &self,
        user_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepositoryError> {
        Ok(name_conflict(&self.tables.lock().unwrap(), user_id, name, exclude))
    }

    async fn reserve_resume(&self, resume: &NewResume, quota: i64) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let active = tables
            .resumes
            .values()
            .filter(|r| r.user_id == resume.user_id)
            .count() as i64;
        if active >= quota {
            return Err(RepositoryError::QuotaExceeded);
        }
        if name_conflict(&tables, resume.user_id, &resume.name, None) {
            return Err(RepositoryError::DuplicateName);
        }
        let now = Utc::now();
        tables.resumes.insert(
            resume.resume_id,
            ResumeRow {
                resume_id: resume.resume_id,
                user_id: resume.user_id,
                storage_key: resume.storage_key.clone(),
                name: resume.name.clone(),
                description: resume.description.clone(),
                content_type: resume.content_type.clone(),
                size_bytes: resume.size_bytes,
                status: ResumeStatus::Pending,
                upload_date: now,
                status_changed_at: now,
            },
        );
        Ok(())
    }

    async fn transition_resume(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool, RepositoryError> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(injected("transition"));
        }
        let mut tables = self.tables.lock().unwrap();
        match tables.resumes.get_mut(&resume_id) {
            Some(row) if row.status == from => {
                row.status = to;
                row.status_changed_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_resume_row(
        &self,
        resume_id: Uuid,
        status: ResumeStatus,
    ) -> Result<bool, RepositoryError> {
        if self.fail_row_deletes.load(Ordering::SeqCst) {
            return Err(injected("row delete"));
        }
        let mut tables = self.tables.lock().unwrap();
        match tables.resumes.get(&resume_id) {
            Some(r) if r.status == status => {
                tables.resumes.remove(&resume_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_live_resumes(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<ResumeRow> = tables
            .resumes
            .values()
            .filter(|r| r.user_id == user_id && r.status == ResumeStatus::Live)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(rows)
    }

    async fn find_live_resume(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ResumeRow>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .resumes
            .get(&resume_id)
            .filter(|r| r.user_id == user_id && r.status == ResumeStatus::Live)
            .cloned())
    }

    async fn update_resume_details(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let owned_live = tables
            .resumes
            .get(&resume_id)
            .is_some_and(|r| r.user_id == user_id && r.status == ResumeStatus::Live);
        if !owned_live {
            return Ok(false);
        }
        if name_conflict(&tables, user_id, name, Some(resume_id)) {
            return Err(RepositoryError::DuplicateName);
        }
        if let Some(row) = tables.resumes.get_mut(&resume_id) {
            row.name = name.to_string();
            row.description = description.to_string();
        }
        Ok(true)
    }

    async fn stale_resumes(&self, cutoff: DateTime<Utc>) -> Result<Vec<ResumeRow>, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let stale = tables
            .resumes
            .values()
            .filter(|r| r.status != ResumeStatus::Live && r.status_changed_at < cutoff)
            .cloned()
            .collect();
        if self.finalize_after_next_scan.swap(false, Ordering::SeqCst) {
            for row in tables.resumes.values_mut() {
                if row.status == ResumeStatus::Pending {
                    row.status = ResumeStatus::Live;
                    row.status_changed_at = Utc::now();
                }
            }
        }
        Ok(stale)
    }

    async fn insert_analysis(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        payload: &Value,
    ) -> Result<AnalysisRow, RepositoryError> {
        let row = AnalysisRow {
            id: Uuid::new_v4(),
            resume_id,
            user_id,
            payload: payload.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().analyses.push(row.clone());
        Ok(row)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Identity provider and scorer
// ────────────────────────────────────────────────────────────────────────────

pub const GOOD_CODE: &str = "good-code";

/// Accepts only `GOOD_CODE` and always returns the configured profile.
pub struct StubIdentityProvider {
    pub profile: Profile,
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        if code == GOOD_CODE {
            Ok("access-token".to_string())
        } else {
            Err(AuthError::ExchangeFailed("provider returned 400: invalid_grant".to_string()))
        }
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Profile, AuthError> {
        if access_token == "access-token" {
            Ok(self.profile.clone())
        } else {
            Err(AuthError::IdentityFetchFailed("provider returned 401".to_string()))
        }
    }
}

pub struct StubScorer;

#[async_trait]
impl ResumeScorer for StubScorer {
    async fn analyze(&self, input: ScoringInput<'_>) -> Result<Value, AppError> {
        Ok(json!({
            "ats_score": "72.50%",
            "bytes_seen": input.bytes.len(),
            "job_desc": input.job_description,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn sample_profile(email: &str) -> Profile {
    Profile {
        sub: format!("sub-{}", email.trim().to_lowercase()),
        email_verified: true,
        name: "Dana Brook".to_string(),
        locale: Locale {
            country: Some("US".to_string()),
            language: Some("en".to_string()),
        },
        given_name: Some("Dana".to_string()),
        family_name: Some("Brook".to_string()),
        email: Some(email.to_string()),
        picture: Some("https://media.example.com/dana.jpg".to_string()),
    }
}

fn user_from_profile(id: Uuid, profile: &Profile) -> User {
    User {
        id,
        subject: profile.sub.clone(),
        name: profile.name.clone(),
        given_name: profile.given_name.clone(),
        family_name: profile.family_name.clone(),
        country: profile.locale.country.clone(),
        language: profile.locale.language.clone(),
        picture: profile.picture.clone(),
        email_verified: profile.email_verified,
        created_at: Utc::now(),
    }
}

pub fn test_config() -> Config {
    let vars = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/aipply_test"),
        ("S3_BUCKET", "resumes-test"),
        ("AWS_ACCESS_KEY_ID", "test"),
        ("AWS_SECRET_ACCESS_KEY", "test"),
        ("OAUTH_CLIENT_ID", "client-123"),
        ("OAUTH_CLIENT_SECRET", "client-secret"),
        ("JWT_SECRET", "test-jwt-secret"),
        ("MAX_UPLOAD_BYTES", "1024"),
    ]);
    Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub store: Arc<MemoryObjectStore>,
}

pub fn test_app(login_email: &str) -> TestApp {
    let repo = Arc::new(MemoryRepository::default());
    let store = Arc::new(MemoryObjectStore::default());
    let state = AppState::new(
        test_config(),
        repo.clone(),
        store.clone(),
        Arc::new(StubIdentityProvider {
            profile: sample_profile(login_email),
        }),
        Arc::new(StubScorer),
    );
    TestApp { state, repo, store }
}
