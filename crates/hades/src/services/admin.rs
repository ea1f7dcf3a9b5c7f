//! Admin views over the registrant tables.
//!
//! Every operation checks the caller's access grant for the table first.

use serde::Serialize;
use serde_json::Value;

use crate::db::models::{CurrentUser, Event};
use crate::db::queries::{account as account_queries, record as queries};
use crate::db::{DbPool, FieldMap, Record, TableKind, TableLookup};
use crate::error::{AppError, AppResult};
use crate::notify::Notifier;
use crate::result_ext::{OptionResultExt, ResultExt};
use crate::with_record;

const INTEGRITY_VIOLATED: &str = "Integrity constraint violated, please re-check your data!";

/// Rows of a table, with enough metadata to render them.
#[derive(Debug, Clone, Serialize)]
pub struct TableListing {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Value>,
}

/// Service for the admin views.
#[derive(Clone)]
pub struct AdminService {
    pool: DbPool,
    notifier: Notifier,
}

impl AdminService {
    pub fn new(pool: DbPool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Events the user holds a grant on.
    pub async fn accessible_tables(&self, user: &CurrentUser) -> AppResult<Vec<Event>> {
        account_queries::accessible_events(&self.pool, &user.username).await
    }

    async fn authorize(&self, user: &CurrentUser, table: &str) -> AppResult<TableKind> {
        let kind = resolve(table)?;
        if !account_queries::has_access(&self.pool, &user.username, kind.name()).await? {
            tracing::warn!(username = %user.username, table = %kind, "Access denied");
            return Err(AppError::Forbidden(format!(
                "You do not have access to {}!",
                kind
            )));
        }
        Ok(kind)
    }

    /// Every row of a table.
    pub async fn list(&self, user: &CurrentUser, table: &str) -> AppResult<TableListing> {
        let kind = self.authorize(user, table).await?;
        self.notifier
            .log(&format!(
                "User <code>{}</code> is accessing <code>{}</code>!",
                user.name, kind
            ))
            .await;

        let rows = with_record!(kind, |R| {
            let records = queries::list_records::<R, _>(&self.pool).await?;
            records
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?
        });
        let full_name = account_queries::event_full_name(&self.pool, kind.name()).await?;

        Ok(TableListing {
            table: kind.name().to_string(),
            full_name,
            columns: kind.columns().iter().map(|c| c.name).collect(),
            rows,
        })
    }

    /// Columns that may be edited through [`AdminService::update`].
    pub async fn editable_fields(
        &self,
        user: &CurrentUser,
        table: &str,
    ) -> AppResult<Vec<&'static str>> {
        let kind = self.authorize(user, table).await?;
        Ok(editable_fields(kind))
    }

    /// Assign `changes` to the row with primary key `key`.
    pub async fn update(
        &self,
        user: &CurrentUser,
        table: &str,
        key: &str,
        changes: &FieldMap,
    ) -> AppResult<String> {
        let kind = self.authorize(user, table).await?;
        check_changes(kind, changes)?;

        let mut tx = self.pool.begin().await?;
        let found = with_record!(kind, |R| {
            match queries::fetch_by_key::<R, _>(&mut *tx, key)
                .await?
                .log_none(format!("updating {} in {}", key, kind))
            {
                Some(mut row) => {
                    for (column, value) in changes {
                        row.set_field(column, value)?;
                    }
                    queries::update_record(&mut *tx, &row)
                        .await
                        .map_err(report_integrity)?
                }
                None => false,
            }
        });
        if !found {
            return Err(missing_row(kind, key));
        }
        tx.commit()
            .await
            .map_err(AppError::from)
            .log(format!("committing update of {}", kind))
            .map_err(report_integrity)?;

        for (column, value) in changes {
            self.notifier
                .log(&format!(
                    "<code>{}</code> has updated <code>{}</code> of <code>{}</code> in <code>{}</code> to <code>{}</code>",
                    user.name, column, key, kind, value
                ))
                .await;
        }
        Ok("User has been updated!".to_string())
    }

    /// Remove the row with primary key `key`.
    pub async fn delete(&self, user: &CurrentUser, table: &str, key: &str) -> AppResult<String> {
        let kind = self.authorize(user, table).await?;

        let deleted = with_record!(kind, |R| {
            queries::delete_by_key::<R, _>(&self.pool, key).await?
        });
        if !deleted {
            return Err(missing_row(kind, key));
        }

        self.notifier
            .log(&format!(
                "User <code>{}</code> has deleted <code>{}</code> from <code>{}</code>!",
                user.name, key, kind
            ))
            .await;
        Ok(format!("{} deleted successfully!", key))
    }
}

/// Map a requested table name to a registered table.
pub fn resolve(table: &str) -> AppResult<TableKind> {
    match TableKind::lookup(table) {
        TableLookup::Known(kind) => Ok(kind),
        TableLookup::Unknown => Err(AppError::NotFound(format!(
            "Table {} does not seem to exist!",
            table
        ))),
    }
}

/// Columns that are neither the primary key nor unique.
pub fn editable_fields(kind: TableKind) -> Vec<&'static str> {
    kind.columns()
        .iter()
        .filter(|c| c.is_editable())
        .map(|c| c.name)
        .collect()
}

/// Reject empty updates and changes to anything but an editable column.
pub fn check_changes(kind: TableKind, changes: &FieldMap) -> AppResult<()> {
    if changes.is_empty() {
        return Err(AppError::BadRequest("Nothing to update!".to_string()));
    }
    for column in changes.keys() {
        match kind.columns().iter().find(|c| c.name == column.as_str()) {
            Some(c) if c.is_primary_key() => {
                return Err(AppError::Validation(format!(
                    "{} is the key of {} and cannot be changed!",
                    column, kind
                )))
            }
            Some(c) if !c.is_editable() => {
                return Err(AppError::Validation(format!(
                    "{} of {} cannot be changed!",
                    column, kind
                )))
            }
            Some(_) => {}
            None => {
                return Err(AppError::Validation(format!(
                    "{} has no field {}!",
                    kind, column
                )))
            }
        }
    }
    Ok(())
}

fn missing_row(kind: TableKind, key: &str) -> AppError {
    AppError::NotFound(format!(
        "Table {} does not have a user with ID {}",
        kind, key
    ))
}

fn report_integrity(err: AppError) -> AppError {
    match err {
        AppError::Integrity(detail) => {
            tracing::warn!(error = %detail, "Update rejected by the database");
            AppError::Integrity(INTEGRITY_VIOLATED.to_string())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("bov_2020").unwrap(), TableKind::Bov2020);
        let err = resolve("sqlite_master").unwrap_err();
        assert!(
            matches!(err, AppError::NotFound(ref m) if m == "Table sqlite_master does not seem to exist!")
        );
    }

    #[test]
    fn test_editable_fields_skip_key_and_unique() {
        assert_eq!(
            editable_fields(TableKind::Coursera2020),
            vec!["name", "phone", "department", "year", "roll_number"]
        );
        assert_eq!(editable_fields(TableKind::Events), vec!["full_name"]);
    }

    #[test]
    fn test_check_changes() {
        assert!(check_changes(TableKind::CodexDecember2019, &changes(&[("paid", "true")])).is_ok());
        assert!(check_changes(TableKind::CodexDecember2019, &changes(&[])).is_err());

        let err = check_changes(TableKind::CodexDecember2019, &changes(&[("id", "4")])).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("cannot be changed")));

        let err =
            check_changes(TableKind::CodexDecember2019, &changes(&[("state", "x")])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_check_changes_rejects_unique_and_secret_columns() {
        let err = check_changes(TableKind::Coursera2020, &changes(&[("email", "b@x.in")]))
            .unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ref m) if m == "email of coursera_2020 cannot be changed!")
        );

        assert_eq!(editable_fields(TableKind::Users), vec!["name"]);
        for column in ["password_hash", "api_key_hash"] {
            let err = check_changes(TableKind::Users, &changes(&[(column, "$argon2id$v=19$x")]))
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m.contains("cannot be changed")));
        }
        assert!(check_changes(TableKind::Users, &changes(&[("name", "Alice")])).is_ok());
    }

    #[test]
    fn test_report_integrity_hides_detail() {
        let err = report_integrity(AppError::Integrity("duplicate key value".to_string()));
        assert!(matches!(err, AppError::Integrity(ref m) if m == INTEGRITY_VIOLATED));
        assert!(matches!(
            report_integrity(AppError::NotFound("x".to_string())),
            AppError::NotFound(_)
        ));
    }
}
