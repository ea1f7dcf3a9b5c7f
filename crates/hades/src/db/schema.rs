//! Record schemas: declared columns, typed values and the generated
//! per-table record implementations.
//!
//! Every table is a plain struct declared through [`record_schema!`]. The
//! macro derives `FromRow`/`Serialize` and implements [`Record`], which gives
//! the rest of the crate column metadata, safelisted construction from form
//! fields, typed values for binding and an explicit row copy.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres};
use thiserror::Error;

/// Submitted form fields, keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

/// Errors raised while building or mutating a record from raw strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{column} is required but has not been submitted")]
    MissingField { column: String },

    #[error("{value:?} is not a valid value for {column}: {reason}")]
    InvalidValue {
        column: String,
        value: String,
        reason: String,
    },

    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

/// Key constraint carried by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKey {
    Plain,
    Primary,
    Unique,
    /// Hashed credential, written only by the account service.
    Secret,
}

/// A declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub key: ColumnKey,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        self.key == ColumnKey::Primary
    }

    /// Only plain columns are editable from the admin views.
    pub fn is_editable(&self) -> bool {
        self.key == ColumnKey::Plain
    }

    /// Parse a raw string into a value of this column's type.
    pub fn parse(&self, raw: &str) -> Result<ColumnValue, RecordError> {
        let value = match self.ty {
            ColumnType::Integer => ColumnValue::Integer(Some(parse_integer(self.name, raw)?)),
            ColumnType::Text => ColumnValue::Text(Some(raw.to_string())),
            ColumnType::Boolean => ColumnValue::Boolean(Some(parse_boolean(self.name, raw)?)),
        };
        Ok(value)
    }

    fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", quote_ident(self.name), self.ty.sql());
        if !self.nullable {
            ddl.push_str(" NOT NULL");
            if self.ty == ColumnType::Boolean {
                ddl.push_str(" DEFAULT FALSE");
            }
        }
        match self.key {
            ColumnKey::Primary => ddl.push_str(" PRIMARY KEY"),
            ColumnKey::Unique => ddl.push_str(" UNIQUE"),
            ColumnKey::Plain | ColumnKey::Secret => {}
        }
        ddl
    }
}

/// A foreign key from one of a record's columns to another table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
    pub target: &'static str,
}

/// A typed column value ready to be bound to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Integer(Option<i32>),
    Text(Option<String>),
    Boolean(Option<bool>),
}

impl ColumnValue {
    pub fn null(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Integer => ColumnValue::Integer(None),
            ColumnType::Text => ColumnValue::Text(None),
            ColumnType::Boolean => ColumnValue::Boolean(None),
        }
    }

    pub fn bind<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            ColumnValue::Integer(v) => query.bind(v),
            ColumnValue::Text(v) => query.bind(v),
            ColumnValue::Boolean(v) => query.bind(v),
        }
    }
}

/// Load state of a record. Bookkeeping only: never serialized, stored or copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    /// Loaded from a database.
    #[default]
    Persisted,
    /// Built in memory and not yet inserted.
    Transient,
}

/// A Rust type that can back a column.
pub trait ColumnField: Sized {
    const TYPE: ColumnType;
    const NULLABLE: bool = false;

    /// Parse a submitted value; `None` means the field was not submitted.
    fn parse(column: &str, raw: Option<&str>) -> Result<Self, RecordError>;

    fn to_value(&self) -> ColumnValue;
}

impl ColumnField for String {
    const TYPE: ColumnType = ColumnType::Text;

    fn parse(column: &str, raw: Option<&str>) -> Result<Self, RecordError> {
        raw.map(str::to_string).ok_or_else(|| RecordError::MissingField {
            column: column.to_string(),
        })
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Text(Some(self.clone()))
    }
}

impl ColumnField for i32 {
    const TYPE: ColumnType = ColumnType::Integer;

    fn parse(column: &str, raw: Option<&str>) -> Result<Self, RecordError> {
        let raw = raw.ok_or_else(|| RecordError::MissingField {
            column: column.to_string(),
        })?;
        parse_integer(column, raw)
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Integer(Some(*self))
    }
}

impl ColumnField for bool {
    const TYPE: ColumnType = ColumnType::Boolean;

    // An absent checkbox is a false one.
    fn parse(column: &str, raw: Option<&str>) -> Result<Self, RecordError> {
        match raw {
            None => Ok(false),
            Some(raw) => parse_boolean(column, raw),
        }
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Boolean(Some(*self))
    }
}

impl<T: ColumnField> ColumnField for Option<T> {
    const TYPE: ColumnType = T::TYPE;
    const NULLABLE: bool = true;

    fn parse(column: &str, raw: Option<&str>) -> Result<Self, RecordError> {
        match raw {
            None => Ok(None),
            Some(raw) => T::parse(column, Some(raw)).map(Some),
        }
    }

    fn to_value(&self) -> ColumnValue {
        match self {
            Some(value) => value.to_value(),
            None => ColumnValue::null(T::TYPE),
        }
    }
}

fn parse_integer(column: &str, raw: &str) -> Result<i32, RecordError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|e| RecordError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_boolean(column: &str, raw: &str) -> Result<bool, RecordError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(RecordError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// A table schema backed by a concrete struct.
pub trait Record:
    for<'r> FromRow<'r, PgRow> + Serialize + Clone + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];
    const FOREIGN_KEYS: &'static [ForeignKey];

    /// Build a transient record from already safelisted fields.
    fn from_fields(fields: &FieldMap) -> Result<Self, RecordError>;

    /// Assign one column from its raw string form.
    fn set_field(&mut self, column: &str, raw: &str) -> Result<(), RecordError>;

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<ColumnValue>;

    /// A fresh transient record with every column copied from `self`.
    fn copy_row(&self) -> Self;

    fn state(&self) -> RowState;

    fn primary_key() -> &'static Column {
        Self::COLUMNS
            .iter()
            .find(|c| c.is_primary_key())
            .unwrap_or(&Self::COLUMNS[0])
    }

    /// Value of the primary key column.
    fn key_value(&self) -> ColumnValue {
        let pk = Self::primary_key();
        let idx = Self::COLUMNS
            .iter()
            .position(|c| c.name == pk.name)
            .unwrap_or(0);
        self.values().swap_remove(idx)
    }

    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }
}

/// Keep only the submitted fields that are declared columns.
pub fn filter_columns(fields: &FieldMap, columns: &[Column]) -> FieldMap {
    fields
        .iter()
        .filter(|(name, _)| columns.iter().any(|c| c.name == name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE IF NOT EXISTS` statement for a record.
pub fn create_table_sql<R: Record>() -> String {
    let mut parts: Vec<String> = R::COLUMNS.iter().map(Column::ddl).collect();
    for fk in R::FOREIGN_KEYS {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(fk.column),
            quote_ident(fk.table),
            quote_ident(fk.target)
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(R::TABLE),
        parts.join(",\n    ")
    )
}

pub fn select_sql<R: Record>() -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        column_list(R::COLUMNS),
        quote_ident(R::TABLE),
        quote_ident(R::primary_key().name)
    )
}

pub fn select_by_key_sql<R: Record>() -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        column_list(R::COLUMNS),
        quote_ident(R::TABLE),
        quote_ident(R::primary_key().name)
    )
}

pub fn insert_sql<R: Record>() -> String {
    let placeholders = (1..=R::COLUMNS.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(R::TABLE),
        column_list(R::COLUMNS),
        placeholders
    )
}

/// `UPDATE` of every non-key column; the key is the last parameter.
pub fn update_sql<R: Record>() -> String {
    let pk = R::primary_key();
    let assignments = R::COLUMNS
        .iter()
        .filter(|c| c.name != pk.name)
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c.name), i + 1))
        .collect::<Vec<_>>();
    format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        quote_ident(R::TABLE),
        assignments.join(", "),
        quote_ident(pk.name),
        assignments.len() + 1
    )
}

pub fn delete_sql<R: Record>() -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        quote_ident(R::TABLE),
        quote_ident(R::primary_key().name)
    )
}

/// Declare a table-backed record.
///
/// ```ignore
/// record_schema! {
///     /// Access grants.
///     pub struct Access {
///         table: "access",
///         references: [user => ("users", "username")],
///         columns: {
///             id: i32 [Primary],
///             event: String,
///             user: String,
///         }
///     }
/// }
/// ```
macro_rules! record_schema {
    (@key) => {
        $crate::db::schema::ColumnKey::Plain
    };
    (@key $key:ident) => {
        $crate::db::schema::ColumnKey::$key
    };
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            table: $table:literal,
            $(references: [$($fk_col:ident => ($fk_table:literal, $fk_target:literal)),* $(,)?],)?
            columns: {
                $(
                    $(#[$field_meta:meta])*
                    $field:ident : $ty:ty $([$key:ident])?
                ),+ $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )+
            #[serde(skip)]
            #[sqlx(skip)]
            pub state: $crate::db::schema::RowState,
        }

        impl $crate::db::schema::Record for $name {
            const TABLE: &'static str = $table;

            const COLUMNS: &'static [$crate::db::schema::Column] = &[
                $(
                    $crate::db::schema::Column {
                        name: stringify!($field),
                        ty: <$ty as $crate::db::schema::ColumnField>::TYPE,
                        nullable: <$ty as $crate::db::schema::ColumnField>::NULLABLE,
                        key: $crate::db::schema::record_schema!(@key $($key)?),
                    },
                )+
            ];

            const FOREIGN_KEYS: &'static [$crate::db::schema::ForeignKey] = &[
                $($(
                    $crate::db::schema::ForeignKey {
                        column: stringify!($fk_col),
                        table: $fk_table,
                        target: $fk_target,
                    },
                )*)?
            ];

            fn from_fields(
                fields: &$crate::db::schema::FieldMap,
            ) -> Result<Self, $crate::db::schema::RecordError> {
                Ok(Self {
                    $(
                        $field: <$ty as $crate::db::schema::ColumnField>::parse(
                            stringify!($field),
                            fields.get(stringify!($field)).map(String::as_str),
                        )?,
                    )+
                    state: $crate::db::schema::RowState::Transient,
                })
            }

            fn set_field(
                &mut self,
                column: &str,
                raw: &str,
            ) -> Result<(), $crate::db::schema::RecordError> {
                match column {
                    $(
                        stringify!($field) => {
                            self.$field =
                                <$ty as $crate::db::schema::ColumnField>::parse(column, Some(raw))?;
                        }
                    )+
                    _ => {
                        return Err($crate::db::schema::RecordError::UnknownColumn {
                            table: $table.to_string(),
                            column: column.to_string(),
                        })
                    }
                }
                Ok(())
            }

            fn values(&self) -> Vec<$crate::db::schema::ColumnValue> {
                vec![$($crate::db::schema::ColumnField::to_value(&self.$field),)+]
            }

            fn copy_row(&self) -> Self {
                Self {
                    $($field: self.$field.clone(),)+
                    state: $crate::db::schema::RowState::Transient,
                }
            }

            fn state(&self) -> $crate::db::schema::RowState {
                self.state
            }
        }
    };
}

pub(crate) use record_schema;

#[cfg(test)]
mod tests {
    use super::*;

    record_schema! {
        /// Minimal schema for exercising the macro.
        pub struct Sample {
            table: "sample",
            references: [owner => ("owners", "username")],
            columns: {
                id: i32 [Primary],
                name: String,
                email: String [Unique],
                owner: Option<String>,
                paid: bool,
            }
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_columns_declared_in_order() {
        let names: Vec<_> = Sample::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "name", "email", "owner", "paid"]);
        assert_eq!(Sample::primary_key().name, "id");
        assert!(Sample::column("owner").unwrap().nullable);
        assert!(!Sample::column("email").unwrap().is_editable());
        assert!(Sample::column("name").unwrap().is_editable());
    }

    #[test]
    fn test_filter_keeps_only_declared_columns() {
        let submitted = fields(&[
            ("name", "A"),
            ("email", "a@example.com"),
            ("extra_unlisted_field", "x"),
            ("state", "Persisted"),
        ]);
        let filtered = filter_columns(&submitted, Sample::COLUMNS);
        let keys: Vec<_> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["email", "name"]);
    }

    #[test]
    fn test_from_fields_builds_transient_record() {
        let record =
            Sample::from_fields(&fields(&[("id", "3"), ("name", "A"), ("email", "a@x.in")]))
                .unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.owner, None);
        assert!(!record.paid);
        assert_eq!(record.state(), RowState::Transient);

        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert!(!keys.contains(&"state".to_string()));
        assert_eq!(keys.len(), Sample::COLUMNS.len());
    }

    #[test]
    fn test_from_fields_missing_required() {
        let err = Sample::from_fields(&fields(&[("id", "1"), ("name", "A")])).unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingField {
                column: "email".to_string()
            }
        );
    }

    #[test]
    fn test_from_fields_invalid_integer() {
        let err = Sample::from_fields(&fields(&[("id", "one"), ("name", "A"), ("email", "e")]))
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_set_field() {
        let mut record =
            Sample::from_fields(&fields(&[("id", "1"), ("name", "A"), ("email", "e")])).unwrap();
        record.set_field("paid", "on").unwrap();
        record.set_field("owner", "root").unwrap();
        assert!(record.paid);
        assert_eq!(record.owner.as_deref(), Some("root"));

        let err = record.set_field("missing", "x").unwrap_err();
        assert!(matches!(err, RecordError::UnknownColumn { .. }));
    }

    #[test]
    fn test_copy_row_matches_every_column() {
        let mut source =
            Sample::from_fields(&fields(&[("id", "7"), ("name", "B"), ("email", "b@x.in")]))
                .unwrap();
        source.state = RowState::Persisted;

        let copy = source.copy_row();
        assert_eq!(copy.values(), source.values());
        assert_eq!(copy.state(), RowState::Transient);
        assert_eq!(source.state(), RowState::Persisted);
    }

    #[test]
    fn test_key_value() {
        let record =
            Sample::from_fields(&fields(&[("id", "9"), ("name", "C"), ("email", "c")])).unwrap();
        assert_eq!(record.key_value(), ColumnValue::Integer(Some(9)));
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql::<Sample>();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"sample\""));
        assert!(sql.contains("\"id\" INTEGER NOT NULL PRIMARY KEY"));
        assert!(sql.contains("\"email\" TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("\"owner\" TEXT,"));
        assert!(sql.contains("\"paid\" BOOLEAN NOT NULL DEFAULT FALSE"));
        assert!(sql.contains("FOREIGN KEY (\"owner\") REFERENCES \"owners\" (\"username\")"));
    }

    #[test]
    fn test_dml_sql() {
        assert_eq!(
            insert_sql::<Sample>(),
            "INSERT INTO \"sample\" (\"id\", \"name\", \"email\", \"owner\", \"paid\") VALUES ($1, $2, $3, $4, $5)"
        );
        assert_eq!(
            update_sql::<Sample>(),
            "UPDATE \"sample\" SET \"name\" = $1, \"email\" = $2, \"owner\" = $3, \"paid\" = $4 WHERE \"id\" = $5"
        );
        assert_eq!(
            delete_sql::<Sample>(),
            "DELETE FROM \"sample\" WHERE \"id\" = $1"
        );
        assert!(select_sql::<Sample>().ends_with("FROM \"sample\" ORDER BY \"id\""));
    }

    #[test]
    fn test_column_parse() {
        let id = Sample::column("id").unwrap();
        assert_eq!(id.parse(" 12 ").unwrap(), ColumnValue::Integer(Some(12)));
        assert!(id.parse("abc").is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
