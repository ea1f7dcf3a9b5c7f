//! Admin endpoints over the registrant tables.
//!
//! All of these sit behind [`crate::auth::require_user`].

use axum::{
    extract::{Query, State},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};

use super::MessageResponse;
use crate::db::models::{CurrentUser, Event};
use crate::db::FieldMap;
use crate::error::{AppError, AppResult};
use crate::services::admin::TableListing;
use crate::services::AdminService;

#[derive(Debug, Deserialize, Default)]
pub struct TableQuery {
    pub table: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub table: String,
    pub fields: Vec<&'static str>,
}

fn required<'a>(form: &'a FieldMap, name: &str) -> AppResult<&'a str> {
    form.get(name)
        .map(String::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("{} is required!", name)))
}

/// Primary key value named by a form.
///
/// `key` names the key column and the value is read from that field. When
/// the form has no such field, `key` is the value itself.
pub fn key_value(form: &FieldMap) -> AppResult<&str> {
    let key = required(form, "key")?;
    Ok(form.get(key).map(String::as_str).unwrap_or(key))
}

/// Tables the user may view.
///
/// `GET /events`
pub async fn events(
    State(admin): State<AdminService>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<Event>>> {
    Ok(Json(admin.accessible_tables(&user).await?))
}

/// Every row of a table.
///
/// `POST /events` with `table`
pub async fn list(
    State(admin): State<AdminService>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<TableQuery>,
) -> AppResult<Json<TableListing>> {
    let table = form.table.ok_or_else(|| {
        AppError::BadRequest("Please specify the table you want to access!".to_string())
    })?;
    Ok(Json(admin.list(&user, &table).await?))
}

/// Editable fields of a table.
///
/// `GET /update?table=coursera_2020`
pub async fn fields(
    State(admin): State<AdminService>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TableQuery>,
) -> AppResult<Json<FieldsResponse>> {
    let table = query
        .table
        .ok_or_else(|| AppError::BadRequest("Table not chosen?".to_string()))?;
    let fields = admin.editable_fields(&user, &table).await?;
    Ok(Json(FieldsResponse { table, fields }))
}

/// Update one field of a row.
///
/// `POST /update` with `table`, `key`, `field` and `value`. Without
/// `field` this answers like `GET /update`.
pub async fn update(
    State(admin): State<AdminService>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<FieldMap>,
) -> AppResult<Json<serde_json::Value>> {
    let table = form
        .get("table")
        .ok_or_else(|| AppError::BadRequest("Table not chosen?".to_string()))?;

    let Some(field) = form.get("field") else {
        let fields = admin.editable_fields(&user, table).await?;
        return Ok(Json(serde_json::to_value(FieldsResponse {
            table: table.clone(),
            fields,
        })?));
    };

    let value = required(&form, "value")?;
    let key = key_value(&form)?;
    let changes = FieldMap::from([(field.clone(), value.to_string())]);

    let message = admin.update(&user, table, key, &changes).await?;
    Ok(Json(serde_json::to_value(MessageResponse::new(message))?))
}

/// Delete a row.
///
/// `POST /delete` with `table` and `key`
pub async fn delete(
    State(admin): State<AdminService>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<FieldMap>,
) -> AppResult<Json<MessageResponse>> {
    let table = required(&form, "table")?;
    let key = key_value(&form)?;
    let message = admin.delete(&user, table, key).await?;
    Ok(Json(MessageResponse::new(message)))
}
