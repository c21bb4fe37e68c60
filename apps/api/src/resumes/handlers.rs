//! Axum route handlers for the resume API. Every handler is gated by
//! `AuthenticatedUser`.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resumes::UploadRequest;
use crate::scoring::ScoringInput;
use crate::state::AppState;
use crate::storage::PRESIGN_TTL;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub resume_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub resume_id: Uuid,
    pub analysis_id: Uuid,
    pub data: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/users/me/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    Ok(Json(state.resumes.list(user.user_id).await?))
}

/// POST /api/users/me/resumes
///
/// Multipart fields: `resume` (the file), `name`, `description`. When `name`
/// is absent the uploaded file name is used.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut name: Option<String> = None;
    let mut description = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("resume") | Some("file") => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((bytes, file_name, content_type));
            }
            Some("name") => name = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => description = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }

    let (bytes, file_name, content_type) =
        file.ok_or_else(|| AppError::Validation("missing 'resume' file field".to_string()))?;
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::PayloadTooLarge);
    }
    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| file_name.clone());

    let resume_id = state
        .resumes
        .upload(UploadRequest {
            user_id: user.user_id,
            bytes,
            name,
            description,
            file_name,
            content_type,
        })
        .await?;

    Ok(Json(UploadResponse { resume_id }))
}

/// GET /api/users/me/resumes/:id/download
pub async fn handle_download_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (bytes, resume) = state.resumes.download(resume_id, user.user_id).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, resume.content_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&resume.name)),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// GET /api/users/me/resumes/:id/url
pub async fn handle_presign_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<PresignResponse>, AppError> {
    let url = state.resumes.presign(resume_id, user.user_id).await?;
    Ok(Json(PresignResponse {
        url,
        expires_in: PRESIGN_TTL.as_secs(),
    }))
}

/// PATCH /api/users/me/resumes/:id
pub async fn handle_rename_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = state
        .resumes
        .rename(resume_id, user.user_id, &request.name, &request.description)
        .await?;
    Ok(Json(resume))
}

/// DELETE /api/users/me/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.resumes.delete(resume_id, user.user_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/users/me/resumes/:id/parse
///
/// Sends the stored file to the scoring service and records its analysis.
pub async fn handle_parse_resume(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let (bytes, resume) = state.resumes.download(resume_id, user.user_id).await?;
    let data = state
        .scorer
        .analyze(ScoringInput {
            bytes,
            file_name: &resume.name,
            content_type: &resume.content_type,
            job_description: &request.job_description,
        })
        .await?;

    let analysis = state
        .repo
        .insert_analysis(resume_id, user.user_id, &data)
        .await?;
    info!("Stored analysis {} for resume {resume_id}", analysis.id);

    Ok(Json(ParseResponse {
        resume_id,
        analysis_id: analysis.id,
        data: analysis.payload,
    }))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation(format!("invalid multipart body: {}", err.body_text()))
    }
}

/// `attachment; filename="..."` with characters that would break the header replaced.
fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
