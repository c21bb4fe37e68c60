//! Sequences blob and metadata operations for resumes.
//!
//! Every resume moves through `pending → live → deleting → (gone)`. The
//! metadata row is written before the blob and removed after it, so a live row
//! always points at a real blob. Partial failures leave a `pending` or
//! `deleting` row behind, which the sweeper reconciles.

use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{NewResume, ResumeRow, ResumeStatus, RESUME_QUOTA};
use crate::repository::MetadataRepository;
use crate::storage::{resolve_content_type, storage_key, ObjectStore, PRESIGN_TTL};

const MAX_NAME_CHARS: usize = 255;
const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: Uuid,
    pub bytes: Bytes,
    pub name: String,
    pub description: String,
    /// File name reported by the client; used for the key extension only.
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct ResumeStore {
    pub(crate) repo: Arc<dyn MetadataRepository>,
    pub(crate) store: Arc<dyn ObjectStore>,
}

impl ResumeStore {
    pub fn new(repo: Arc<dyn MetadataRepository>, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
        Ok(self.repo.list_live_resumes(user_id).await?)
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<Uuid, AppError> {
        let UploadRequest {
            user_id,
            bytes,
            name,
            description,
            file_name,
            content_type,
        } = request;

        let name = clean_name(&name)?;
        let description = clean_description(&description)?;
        if bytes.is_empty() {
            return Err(AppError::Validation("resume file is empty".to_string()));
        }

        // Fast rejections. The reservation below is the authoritative guard.
        if self.repo.count_active_resumes(user_id).await? >= RESUME_QUOTA {
            return Err(AppError::QuotaExceeded);
        }
        if self.repo.name_taken(user_id, &name, None).await? {
            return Err(duplicate(&name));
        }

        let content_type = resolve_content_type(content_type.as_deref(), &file_name);
        let resume = NewResume {
            resume_id: Uuid::new_v4(),
            user_id,
            storage_key: storage_key(user_id, &file_name, &content_type),
            name,
            description,
            content_type,
            size_bytes: bytes.len() as i64,
        };

        self.repo
            .reserve_resume(&resume, RESUME_QUOTA)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::DuplicateName(_) => duplicate(&resume.name),
                other => other,
            })?;

        if let Err(e) = self.store.put(&resume.storage_key, bytes, &resume.content_type).await {
            error!(
                "Blob write failed for resume {} (key {}): {e}",
                resume.resume_id, resume.storage_key
            );
            self.abandon_reservation(&resume).await;
            return Err(e.into());
        }

        let finalized = self
            .repo
            .transition_resume(resume.resume_id, ResumeStatus::Pending, ResumeStatus::Live)
            .await
            .map_err(|e| {
                error!(
                    "Finalizing resume {} failed; left pending for the sweeper: {e}",
                    resume.resume_id
                );
                e
            })?;
        if !finalized {
            return Err(anyhow!(
                "reservation for resume {} disappeared before finalize",
                resume.resume_id
            )
            .into());
        }

        info!(
            "Uploaded resume {} for user {user_id} ({} bytes)",
            resume.resume_id, resume.size_bytes
        );
        Ok(resume.resume_id)
    }

    /// Returns the stored bytes and metadata. A resume owned by someone else is
    /// reported exactly like a missing one.
    pub async fn download(&self, resume_id: Uuid, user_id: Uuid) -> Result<(Bytes, ResumeRow), AppError> {
        let resume = self.find(resume_id, user_id).await?;
        let bytes = self.store.get(&resume.storage_key).await.map_err(|e| {
            error!("Blob read failed for resume {resume_id} (key {}): {e}", resume.storage_key);
            e
        })?;
        Ok((bytes, resume))
    }

    /// Time-bounded URL the client can fetch the blob from directly.
    pub async fn presign(&self, resume_id: Uuid, user_id: Uuid) -> Result<String, AppError> {
        let resume = self.find(resume_id, user_id).await?;
        Ok(self.store.presign_get(&resume.storage_key, PRESIGN_TTL).await?)
    }

    pub async fn delete(&self, resume_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let resume = self.find(resume_id, user_id).await?;

        let withdrawn = self
            .repo
            .transition_resume(resume_id, ResumeStatus::Live, ResumeStatus::Deleting)
            .await?;
        if !withdrawn {
            // Lost a race with another delete of the same resume.
            return Err(not_found(resume_id));
        }

        // The `deleting` row still holds its quota slot and name, so restoring it
        // below cannot collide with uploads that ran in the meantime.

        if let Err(e) = self.store.delete(&resume.storage_key).await {
            error!("Blob delete failed for resume {resume_id}; restoring: {e}");
            if let Err(restore) = self
                .repo
                .transition_resume(resume_id, ResumeStatus::Deleting, ResumeStatus::Live)
                .await
            {
                warn!("Could not restore resume {resume_id}; the sweeper will finish the delete: {restore}");
            }
            return Err(e.into());
        }

        if let Err(e) = self.repo.delete_resume_row(resume_id, ResumeStatus::Deleting).await {
            warn!("Row delete failed for resume {resume_id}; left for the sweeper: {e}");
            return Err(e.into());
        }

        info!("Deleted resume {resume_id} for user {user_id}");
        Ok(())
    }

    /// Updates name and description. The storage key and upload date never change.
    pub async fn rename(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<ResumeRow, AppError> {
        let name = clean_name(name)?;
        let description = clean_description(description)?;
        self.find(resume_id, user_id).await?;

        if self.repo.name_taken(user_id, &name, Some(resume_id)).await? {
            return Err(duplicate(&name));
        }

        let updated = self
            .repo
            .update_resume_details(resume_id, user_id, &name, &description)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::DuplicateName(_) => duplicate(&name),
                other => other,
            })?;
        if !updated {
            return Err(not_found(resume_id));
        }

        self.find(resume_id, user_id).await
    }

    pub(crate) async fn find(&self, resume_id: Uuid, user_id: Uuid) -> Result<ResumeRow, AppError> {
        self.repo
            .find_live_resume(resume_id, user_id)
            .await?
            .ok_or_else(|| not_found(resume_id))
    }

    /// Best-effort rollback of a reservation whose blob never landed.
    async fn abandon_reservation(&self, resume: &NewResume) {
        if let Err(e) = self.store.delete(&resume.storage_key).await {
            warn!("Could not remove partial blob {}: {e}", resume.storage_key);
        }
        match self
            .repo
            .delete_resume_row(resume.resume_id, ResumeStatus::Pending)
            .await
        {
            Ok(_) => {}
            Err(e) => warn!(
                "Could not discard pending resume {}; left for the sweeper: {e}",
                resume.resume_id
            ),
        }
    }
}

fn clean_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("resume name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "resume name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn clean_description(description: &str) -> Result<String, AppError> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(description.to_string())
}

fn duplicate(name: &str) -> AppError {
    AppError::DuplicateName(format!("a resume named '{name}' already exists"))
}

fn not_found(resume_id: Uuid) -> AppError {
    AppError::NotFound(format!("Resume {resume_id} not found"))
}
