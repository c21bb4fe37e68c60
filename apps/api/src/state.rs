use std::sync::Arc;

use crate::auth::{IdentityProvider, SessionIssuer, UserDirectory};
use crate::config::Config;
use crate::repository::MetadataRepository;
use crate::resumes::ResumeStore;
use crate::scoring::ResumeScorer;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionIssuer,
    /// Pluggable identity provider. Default: LinkedIn.
    pub identity: Arc<dyn IdentityProvider>,
    pub users: UserDirectory,
    pub resumes: ResumeStore,
    pub repo: Arc<dyn MetadataRepository>,
    pub scorer: Arc<dyn ResumeScorer>,
}

impl AppState {
    pub fn new(
        config: Config,
        repo: Arc<dyn MetadataRepository>,
        store: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        scorer: Arc<dyn ResumeScorer>,
    ) -> Self {
        Self {
            sessions: SessionIssuer::new(&config.jwt_secret, config.secure_cookies),
            users: UserDirectory::new(repo.clone()),
            resumes: ResumeStore::new(repo.clone(), store),
            config: Arc::new(config),
            identity,
            repo,
            scorer,
        }
    }
}
