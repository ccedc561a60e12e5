//! Revision photo pipeline handlers.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use bytes::Bytes;
use validator::Validate;

use farmhub_core::error::AppError;
use farmhub_core::types::{PhotoId, RevisionId};
use farmhub_entity::revision::{Revision, RevisionPhoto};
use farmhub_service::intake::IntakeReport;
use farmhub_service::revision::{
    CountCheck, FinalizeOutcome, IntakeOutcome, RevisionPhotos, UploadedFile,
};

use super::form;
use crate::dto::request::{CreateRevisionFields, FinalizeRequest};
use crate::dto::response::{ApiResponse, MessageResponse, ReindexResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Read a form that carries a single `archive` file field.
async fn archive_only(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    let mut archive = None;
    while let Some(field) = form::next_field(multipart).await? {
        if field.name() == Some("archive") {
            archive = Some(form::bytes(field).await?);
        }
    }
    archive.ok_or_else(|| AppError::validation("archive is required").into())
}

/// POST /api/revisions — multipart `farm_id`, `sector_id`, `date`,
/// `revision_type?`, `archive`
pub async fn create_revision(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<IntakeOutcome>>), ApiError> {
    let mut farm_id = None;
    let mut sector_id = None;
    let mut date = None;
    let mut revision_type = None;
    let mut archive = None;

    while let Some(field) = form::next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "farm_id" => farm_id = Some(form::text(field).await?),
            "sector_id" => sector_id = Some(form::text(field).await?),
            "date" => date = Some(form::text(field).await?),
            "revision_type" => {
                let text = form::text(field).await?;
                let text = text.trim();
                if !text.is_empty() {
                    revision_type = Some(text.to_string());
                }
            }
            "archive" => archive = Some(form::bytes(field).await?),
            _ => {}
        }
    }

    let fields = CreateRevisionFields {
        farm_id: form::required("farm_id", farm_id)?,
        sector_id: form::required("sector_id", sector_id)?,
        date: form::required("date", date)?,
        revision_type,
    };
    fields
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let archive = archive.ok_or_else(|| AppError::validation("archive is required"))?;

    let outcome = state
        .revisions
        .create_revision_from_archive(fields.into(), archive)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}

/// POST /api/revisions/inspect — multipart `archive`
pub async fn inspect_archive(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<IntakeReport>>, ApiError> {
    let archive = archive_only(&mut multipart).await?;
    let report = state.revisions.inspect_archive(archive).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/revisions/{id}
pub async fn get_revision(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
) -> Result<Json<ApiResponse<Revision>>, ApiError> {
    let revision = state.revisions.get_revision(id).await?;
    Ok(Json(ApiResponse::ok(revision)))
}

/// DELETE /api/revisions/{id}
pub async fn delete_revision(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.revisions.delete_revision(id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new(format!(
        "Revision {id} deleted"
    )))))
}

/// GET /api/revisions/{id}/photos
pub async fn list_photos(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
) -> Result<Json<ApiResponse<RevisionPhotos>>, ApiError> {
    let listed = state.revisions.list_photos(id).await?;
    Ok(Json(ApiResponse::ok(listed)))
}

/// POST /api/revisions/{id}/photos — multipart `files` (repeated)
pub async fn add_photos(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<RevisionPhoto>>>), ApiError> {
    let mut files = Vec::new();
    while let Some(field) = form::next_field(&mut multipart).await? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = form::bytes(field).await?;
        state.revisions.intake().check_file_size(data.len())?;
        files.push(UploadedFile { filename, data });
    }

    let added = state.revisions.add_photos(id, files).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(added))))
}

/// PUT /api/revisions/{id}/photos/archive — multipart `archive`
pub async fn replace_photos(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<IntakeOutcome>>, ApiError> {
    let archive = archive_only(&mut multipart).await?;
    let outcome = state
        .revisions
        .replace_photos_from_archive(id, archive)
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /api/revisions/{id}/photos/{photo_id}
pub async fn delete_photo(
    State(state): State<AppState>,
    Path((id, photo_id)): Path<(RevisionId, PhotoId)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.revisions.delete_photo(id, photo_id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new(format!(
        "Photo {photo_id} deleted"
    )))))
}

/// POST /api/revisions/{id}/validate
pub async fn validate_count(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
) -> Result<Json<ApiResponse<CountCheck>>, ApiError> {
    let check = state.revisions.validate_count(id).await?;
    Ok(Json(ApiResponse::ok(check)))
}

/// POST /api/revisions/{id}/reindex
pub async fn reindex(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
) -> Result<Json<ApiResponse<ReindexResponse>>, ApiError> {
    let renumbered = state.revisions.reindex(id).await?;
    Ok(Json(ApiResponse::ok(ReindexResponse { renumbered })))
}

/// POST /api/revisions/{id}/finalize
pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<RevisionId>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<ApiResponse<FinalizeOutcome>>, ApiError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let outcome = state
        .revisions
        .finalize(id, &req.into_assignments())
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
