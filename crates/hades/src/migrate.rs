//! Copy every registered table from one database into another.
//!
//! Tables present in the source but absent from the registry are skipped.
//! Registered tables are copied in foreign key order, one destination
//! transaction per table. A failure stops the run; tables committed before
//! it stay populated.

use anyhow::Context;

use crate::db::queries::record as queries;
use crate::db::{DbPool, Record, TableKind, TableLookup};
use crate::with_record;

/// What a clone run will copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClonePlan {
    /// Registered tables, in copy order.
    pub tables: Vec<TableKind>,
    /// Source tables with no registered schema.
    pub skipped: Vec<String>,
}

impl ClonePlan {
    /// Console lines announcing the skipped tables.
    pub fn skip_messages(&self) -> Vec<String> {
        self.skipped
            .iter()
            .map(|name| format!("Skipping {}: no registered schema", name))
            .collect()
    }
}

/// Base tables of the `public` schema.
pub async fn list_tables(pool: &DbPool) -> anyhow::Result<Vec<String>> {
    let tables = queries::list_tables(pool)
        .await
        .context("listing tables")?;
    Ok(tables)
}

/// Create every registered table that does not exist yet.
pub async fn create_schema(pool: &DbPool) -> anyhow::Result<()> {
    for kind in TableKind::dependency_order(TableKind::ALL) {
        with_record!(kind, |R| queries::create_table::<R, _>(pool).await)
            .with_context(|| format!("creating table {}", kind))?;
        tracing::debug!(table = %kind, "Table ensured");
    }
    Ok(())
}

/// Split source tables into registered kinds, in copy order, and skips.
pub fn plan(source_tables: &[String]) -> ClonePlan {
    let mut kinds = Vec::new();
    let mut skipped = Vec::new();

    for name in source_tables {
        match TableKind::lookup(name) {
            TableLookup::Known(kind) if !kinds.contains(&kind) => kinds.push(kind),
            TableLookup::Known(_) => {}
            TableLookup::Unknown => skipped.push(name.clone()),
        }
    }

    // Registry order first so the copy order does not depend on how the
    // source catalog happens to list its tables.
    kinds.sort_by_key(|kind| TableKind::ALL.iter().position(|k| k == kind));

    ClonePlan {
        tables: TableKind::dependency_order(&kinds),
        skipped,
    }
}

/// Copy every row of one table. Returns the number of rows copied.
pub async fn copy_table(
    kind: TableKind,
    source: &DbPool,
    destination: &DbPool,
) -> anyhow::Result<u64> {
    with_record!(kind, |R| copy_rows::<R>(source, destination).await)
        .with_context(|| format!("copying table {}", kind))
}

async fn copy_rows<R: Record>(source: &DbPool, destination: &DbPool) -> anyhow::Result<u64> {
    let rows = queries::list_records::<R, _>(source).await?;

    let mut tx = destination.begin().await?;
    for row in &rows {
        queries::insert_record(&mut *tx, &row.copy_row()).await?;
    }
    tx.commit().await?;

    tracing::info!(table = R::TABLE, rows = rows.len(), "Table copied");
    Ok(rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TestTable;
    use crate::db::{FieldMap, RowState};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_plan_copies_registered_and_skips_the_rest() {
        let source = names(&[
            "alembic_version",
            "test_users",
            "access",
            "users",
            "scratch",
            "events",
        ]);
        let plan = plan(&source);

        assert_eq!(plan.tables.len(), 4);
        assert_eq!(plan.skipped, names(&["alembic_version", "scratch"]));
        assert_eq!(plan.tables.len() + plan.skipped.len(), source.len());
        assert_eq!(
            plan.skip_messages(),
            vec![
                "Skipping alembic_version: no registered schema".to_string(),
                "Skipping scratch: no registered schema".to_string(),
            ]
        );
    }

    #[test]
    fn test_plan_orders_users_before_access() {
        let plan = plan(&names(&["access", "test_users", "users"]));
        assert_eq!(
            plan.tables,
            vec![TableKind::TestUsers, TableKind::Users, TableKind::Access]
        );
    }

    #[test]
    fn test_plan_is_independent_of_source_order() {
        let forward = plan(&names(&["users", "access", "tsg", "bov_2020"]));
        let reverse = plan(&names(&["bov_2020", "tsg", "access", "users"]));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_plan_ignores_duplicates() {
        let plan = plan(&names(&["tsg", "tsg"]));
        assert_eq!(plan.tables, vec![TableKind::Tsg]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(plan(&[]), ClonePlan::default());
    }

    #[test]
    fn test_copied_rows_match_their_source() {
        let source: Vec<TestTable> = [(1, "A"), (2, "B")]
            .iter()
            .map(|(id, name)| TestTable {
                id: *id,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                phone: format!("98765432{:02}", id),
                department: "IT".to_string(),
                state: RowState::Persisted,
            })
            .collect();

        for row in &source {
            let copy = row.copy_row();
            assert_eq!(copy.values(), row.values());
            assert_eq!(copy.state(), RowState::Transient);

            let json = serde_json::to_value(&copy).unwrap();
            let object = json.as_object().unwrap();
            assert_eq!(object.len(), TestTable::COLUMNS.len());
            assert!(!object.contains_key("state"));
            assert_eq!(object["id"], row.id);
            assert_eq!(object["name"], row.name.as_str());
        }
    }

    #[test]
    fn test_form_with_extra_field_builds_exact_row() {
        let form: FieldMap = [
            ("id", "1"),
            ("name", "A"),
            ("email", "a@example.com"),
            ("phone", "9876543210"),
            ("department", "IT"),
            ("extra_unlisted_field", "x"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let filtered = crate::db::schema::filter_columns(&form, TestTable::COLUMNS);
        let row = TestTable::from_fields(&filtered).unwrap();
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("extra_unlisted_field").is_none());
        assert_eq!(json.as_object().unwrap().len(), TestTable::COLUMNS.len());
    }
}
