//! Illustrative CRUD endpoints for a session-protected resource.
//!
//! Flow Overview:
//! 1) The session middleware has already attached an `Identity`.
//! 2) Rows are scoped to the owner; a foreign note reads as 404, not 403,
//!    to avoid resource enumeration.
//! 3) Every reply goes through the response envelope.

use crate::{
    api::{ServerContext, envelope::{ApiError, ApiSuccess}, handlers::internal},
    auth::Identity,
    db::Database,
};
use axum::{
    Json,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, error};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NoteRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

const TITLE_MAX_CHARS: usize = 200;

// Parsed by hand so a malformed id still gets the JSON envelope instead of
// the extractor's plain-text rejection.
fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| {
        ApiError::bad_request("Validation failed").with_detail(json!({"id": "must be a UUID"}))
    })
}

fn validate(request: &NoteRequest) -> Result<(), ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Validation failed")
            .with_detail(json!({"title": "must not be empty"})));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ApiError::bad_request("Validation failed")
            .with_detail(json!({"title": "too long"})));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/notes",
    responses(
        (status = 200, description = "Notes owned by the caller"),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "notes"
)]
pub async fn list(
    Extension(identity): Extension<Identity>,
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
) -> Response {
    match fetch_notes(db.pool(), identity.id).await {
        Ok(notes) => ApiSuccess::new("Notes retrieved")
            .with_data(&notes)
            .into_response(),
        Err(err) => {
            error!("Failed to list notes: {err}");
            internal(&context, &err).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/notes",
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note created"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "notes"
)]
pub async fn create(
    Extension(identity): Extension<Identity>,
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<NoteRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };
    if let Err(response) = validate(&request) {
        return response.into_response();
    }

    match insert_note(db.pool(), identity.id, request.title.trim(), &request.body).await {
        Ok(note) => ApiSuccess::created("Note created")
            .with_data(&note)
            .into_response(),
        Err(err) => {
            error!("Failed to create note: {err}");
            internal(&context, &err).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note found"),
        (status = 404, description = "Note absent"),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "notes"
)]
pub async fn get(
    Extension(identity): Extension<Identity>,
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(error) => return error.into_response(),
    };
    match fetch_note(db.pool(), identity.id, id).await {
        Ok(Some(note)) => ApiSuccess::new("Note retrieved")
            .with_data(&note)
            .into_response(),
        Ok(None) => ApiError::not_found("Note not found").into_response(),
        Err(err) => {
            error!("Failed to fetch note: {err}");
            internal(&context, &err).into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Note updated"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Note absent"),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "notes"
)]
pub async fn update(
    Extension(identity): Extension<Identity>,
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
    Path(id): Path<String>,
    payload: Option<Json<NoteRequest>>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(error) => return error.into_response(),
    };
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };
    if let Err(response) = validate(&request) {
        return response.into_response();
    }

    match update_note(db.pool(), identity.id, id, request.title.trim(), &request.body).await {
        Ok(Some(note)) => ApiSuccess::new("Note updated")
            .with_data(&note)
            .into_response(),
        Ok(None) => ApiError::not_found("Note not found").into_response(),
        Err(err) => {
            error!("Failed to update note: {err}");
            internal(&context, &err).into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note deleted"),
        (status = 404, description = "Note absent"),
        (status = 401, description = "Missing or invalid session")
    ),
    tag = "notes"
)]
pub async fn delete(
    Extension(identity): Extension<Identity>,
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(error) => return error.into_response(),
    };
    match delete_note(db.pool(), identity.id, id).await {
        Ok(true) => ApiSuccess::new("Note deleted").into_response(),
        Ok(false) => ApiError::not_found("Note not found").into_response(),
        Err(err) => {
            error!("Failed to delete note: {err}");
            internal(&context, &err).into_response()
        }
    }
}

fn note_from_row(row: &sqlx::postgres::PgRow) -> Note {
    let id: Uuid = row.get("id");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");
    Note {
        id: id.to_string(),
        title: row.get("title"),
        body: row.get("body"),
        created_at: created_at.to_rfc3339(),
        updated_at: updated_at.to_rfc3339(),
    }
}

async fn fetch_notes(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Note>, sqlx::Error> {
    let query = "SELECT id, title, body, created_at, updated_at FROM notes \
                 WHERE owner_id = $1 ORDER BY created_at DESC";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(owner_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(note_from_row).collect())
}

async fn insert_note(
    pool: &PgPool,
    owner_id: Uuid,
    title: &str,
    body: &str,
) -> Result<Note, sqlx::Error> {
    let query = "INSERT INTO notes (owner_id, title, body) VALUES ($1, $2, $3) \
                 RETURNING id, title, body, created_at, updated_at";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(owner_id)
        .bind(title)
        .bind(body)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(note_from_row(&row))
}

async fn fetch_note(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<Note>, sqlx::Error> {
    let query = "SELECT id, title, body, created_at, updated_at FROM notes \
                 WHERE id = $1 AND owner_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(note_from_row))
}

async fn update_note(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    title: &str,
    body: &str,
) -> Result<Option<Note>, sqlx::Error> {
    let query = "UPDATE notes SET title = $3, body = $4, updated_at = now() \
                 WHERE id = $1 AND owner_id = $2 \
                 RETURNING id, title, body, created_at, updated_at";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(owner_id)
        .bind(title)
        .bind(body)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(note_from_row))
}

async fn delete_note(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM notes WHERE id = $1 AND owner_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn empty_title_is_rejected() {
        let request = NoteRequest {
            title: "   ".to_string(),
            body: String::new(),
        };
        let error = validate(&request).expect_err("should reject");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn oversized_title_is_rejected() {
        let request = NoteRequest {
            title: "a".repeat(TITLE_MAX_CHARS + 1),
            body: String::new(),
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn malformed_id_is_a_bad_request() {
        let error = parse_id("not-a-uuid").expect_err("should reject");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).expect("should parse"), id);
    }

    #[test]
    fn reasonable_title_is_accepted() {
        let request = NoteRequest {
            title: "Groceries".to_string(),
            body: "milk".to_string(),
        };
        assert!(validate(&request).is_ok());
    }
}
