/**
 * Resource Routes
 * List / create / retrieve / update / delete, written once and instantiated
 * per entity
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::fmt::Display;

use crate::db::models::{Entity, ListFilter};
use crate::db::{DbError, Repository, Store};
use crate::error::ApiError;
use crate::routes::Envelope;
use crate::validation::{body_object, FieldErrors, Object, NON_FIELD_ERRORS};
use crate::AppState;

/// An entity exposed over HTTP: where it is stored and how its payloads parse.
pub trait Resource: Entity {
    fn repo(store: &dyn Store) -> &dyn Repository<Self>;

    fn parse_new(body: &Object) -> Result<Self::New, FieldErrors>;

    /// `partial` is set for PATCH; PUT must carry every required field.
    fn parse_patch(body: &Object, partial: bool) -> Result<Self::Patch, FieldErrors>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Create,
    Retrieve,
    Update,
    Delete,
}

fn not_found<R: Entity>(op: Op, id: impl Display) -> ApiError {
    let detail = match op {
        Op::Update => format!("{} with id {} not found for update.", R::LABEL, id),
        Op::Delete => format!("{} with id {} not found. Deletion aborted.", R::LABEL, id),
        Op::Create | Op::Retrieve => format!(
            "{} with id {} not found. Please verify the provided identifier.",
            R::LABEL,
            id
        ),
    };
    ApiError::NotFound(detail)
}

fn invalid<R: Entity>(op: Op, errors: FieldErrors) -> ApiError {
    let detail = match op {
        Op::Update => format!("Failed to update {}. Please review the errors.", R::NOUN),
        _ => format!("Failed to create {}. Please review the input data.", R::NOUN),
    };
    ApiError::validation(detail, errors)
}

fn store_error<R: Entity>(err: DbError, op: Op, id: impl Display) -> ApiError {
    match err {
        DbError::NotFound => not_found::<R>(op, id),
        DbError::Invalid(errors) => invalid::<R>(op, errors),
        DbError::Sqlx(e) => ApiError::Internal(format!("{} {:?} failed: {}", R::NOUN, op, e)),
    }
}

/// Ids are taken from the path as text; one that is not an `i64` names no row.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

/// The request body as a JSON object; anything else is a non-field error.
fn read_body(body: Result<Json<Value>, JsonRejection>) -> Result<Object, FieldErrors> {
    match body {
        Ok(Json(value)) => body_object(value),
        Err(rejection) => Err(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text())),
    }
}

async fn create_from<R: Resource>(state: &AppState, body: Object) -> Result<R, ApiError> {
    let input = R::parse_new(&body).map_err(|e| invalid::<R>(Op::Create, e))?;
    R::repo(state.store.as_ref())
        .create(input)
        .await
        .map_err(|e| store_error::<R>(e, Op::Create, 0))
}

fn created<R: Resource>(item: R) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(Envelope::new(format!("{} created successfully.", R::LABEL), item)),
    )
}

pub async fn list<R: Resource>(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<R>>>, ApiError> {
    let items = R::repo(state.store.as_ref())
        .list(ListFilter::default())
        .await
        .map_err(|e| store_error::<R>(e, Op::Retrieve, 0))?;
    let detail = format!("Successfully retrieved {} {}.", items.len(), R::PLURAL);
    Ok(Json(Envelope::new(detail, items)))
}

pub async fn create<R: Resource>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = read_body(body).map_err(|e| invalid::<R>(Op::Create, e))?;
    let item = create_from::<R>(&state, body).await?;
    Ok(created(item))
}

pub async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Envelope<R>>, ApiError> {
    let id = parse_id(&raw_id).ok_or_else(|| not_found::<R>(Op::Retrieve, &raw_id))?;
    let item = R::repo(state.store.as_ref())
        .get(id)
        .await
        .map_err(|e| store_error::<R>(e, Op::Retrieve, id))?;
    Ok(Json(Envelope::new(
        format!("Successfully retrieved {} details.", R::NOUN),
        item,
    )))
}

/// PUT replaces (required fields must be present), PATCH merges.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    method: Method,
    Path(raw_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Envelope<R>>, ApiError> {
    let id = parse_id(&raw_id).ok_or_else(|| not_found::<R>(Op::Update, &raw_id))?;
    let repo = R::repo(state.store.as_ref());
    repo.get(id)
        .await
        .map_err(|e| store_error::<R>(e, Op::Update, id))?;

    let partial = method == Method::PATCH;
    let patch = read_body(body)
        .and_then(|body| R::parse_patch(&body, partial))
        .map_err(|e| invalid::<R>(Op::Update, e))?;

    let item = repo
        .update(id, patch)
        .await
        .map_err(|e| store_error::<R>(e, Op::Update, id))?;
    Ok(Json(Envelope::new(
        format!("{} updated successfully.", R::LABEL),
        item,
    )))
}

pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id).ok_or_else(|| not_found::<R>(Op::Delete, &raw_id))?;
    R::repo(state.store.as_ref())
        .delete(id)
        .await
        .map_err(|e| store_error::<R>(e, Op::Delete, id))?;
    tracing::info!("{} with id {} has been deleted successfully.", R::LABEL, id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Records nested under a place
// ============================================================================

pub async fn list_for_place<R: Resource>(
    State(state): State<AppState>,
    Path(raw_place_id): Path<String>,
) -> Result<Json<Envelope<Vec<R>>>, ApiError> {
    let items = match parse_id(&raw_place_id) {
        Some(place_id) => R::repo(state.store.as_ref())
            .list(ListFilter::for_place(place_id))
            .await
            .map_err(|e| store_error::<R>(e, Op::Retrieve, place_id))?,
        None => Vec::new(),
    };
    let detail = format!(
        "Successfully retrieved {} {} for Place id {}.",
        items.len(),
        R::PLURAL,
        raw_place_id
    );
    Ok(Json(Envelope::new(detail, items)))
}

/// Creates a record owned by the place in the path; a `place` in the body is overridden.
pub async fn create_for_place<R: Resource>(
    State(state): State<AppState>,
    Path(raw_place_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut body = read_body(body).map_err(|e| invalid::<R>(Op::Create, e))?;
    let place_id = parse_id(&raw_place_id).ok_or_else(|| {
        let message = format!("Invalid pk \"{raw_place_id}\" - object does not exist.");
        invalid::<R>(Op::Create, FieldErrors::single("place", message))
    })?;
    body.insert("place".to_string(), Value::from(place_id));
    let item = create_from::<R>(&state, body).await?;
    Ok(created(item))
}
