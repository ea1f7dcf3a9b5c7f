//! Registry of every known table.
//!
//! Table names arrive as strings (form fields, admin requests, the source
//! catalog during a clone). [`TableKind::lookup`] turns them into a closed
//! set of kinds, and [`with_record!`] runs code generic over [`Record`]
//! for a kind.

use std::collections::HashSet;
use std::fmt;

use crate::db::models::REGISTRANT_COLUMNS;
use crate::db::schema::{Column, ColumnType, ForeignKey, Record};

/// Every table the application knows how to read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    CodexApril2019,
    EhJuly2019,
    CppWorkshopMay2019,
    Rsc2019,
    CCppWorkshopAugust2019,
    Hacktoberfest2019,
    CsiNovember2019,
    CsiNovemberNonMember2019,
    P5November2019,
    CNovember2019,
    BitgritDecember2019,
    TestUsers,
    Access,
    Users,
    Events,
    CodexDecember2019,
    Bov2020,
    Coursera2020,
    Tsg,
}

/// Result of looking a table name up in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLookup {
    Known(TableKind),
    Unknown,
}

#[cfg(test)]
impl TableLookup {
    pub fn known(self) -> Option<TableKind> {
        match self {
            TableLookup::Known(kind) => Some(kind),
            TableLookup::Unknown => None,
        }
    }
}

/// Run `$body` with `$r` aliased to the record type of `$kind`.
///
/// ```ignore
/// let rows = with_record!(kind, |R| queries::list_records::<R>(&pool).await?);
/// ```
#[macro_export]
macro_rules! with_record {
    ($kind:expr, |$r:ident| $body:expr) => {{
        use $crate::db::models as __models;
        match $kind {
            $crate::db::TableKind::CodexApril2019 => { type $r = __models::CodexApril2019; $body }
            $crate::db::TableKind::EhJuly2019 => { type $r = __models::EhJuly2019; $body }
            $crate::db::TableKind::CppWorkshopMay2019 => { type $r = __models::CppWorkshopMay2019; $body }
            $crate::db::TableKind::Rsc2019 => { type $r = __models::Rsc2019; $body }
            $crate::db::TableKind::CCppWorkshopAugust2019 => { type $r = __models::CCppWorkshopAugust2019; $body }
            $crate::db::TableKind::Hacktoberfest2019 => { type $r = __models::Hacktoberfest2019; $body }
            $crate::db::TableKind::CsiNovember2019 => { type $r = __models::CsiNovember2019; $body }
            $crate::db::TableKind::CsiNovemberNonMember2019 => { type $r = __models::CsiNovemberNonMember2019; $body }
            $crate::db::TableKind::P5November2019 => { type $r = __models::P5November2019; $body }
            $crate::db::TableKind::CNovember2019 => { type $r = __models::CNovember2019; $body }
            $crate::db::TableKind::BitgritDecember2019 => { type $r = __models::BitgritDecember2019; $body }
            $crate::db::TableKind::TestUsers => { type $r = __models::TestTable; $body }
            $crate::db::TableKind::Access => { type $r = __models::Access; $body }
            $crate::db::TableKind::Users => { type $r = __models::User; $body }
            $crate::db::TableKind::Events => { type $r = __models::Event; $body }
            $crate::db::TableKind::CodexDecember2019 => { type $r = __models::CodexDecember2019; $body }
            $crate::db::TableKind::Bov2020 => { type $r = __models::Bov2020; $body }
            $crate::db::TableKind::Coursera2020 => { type $r = __models::Coursera2020; $body }
            $crate::db::TableKind::Tsg => { type $r = __models::Tsg; $body }
        }
    }};
}

impl TableKind {
    /// All kinds, in registry order.
    pub const ALL: &'static [TableKind] = &[
        TableKind::CodexApril2019,
        TableKind::EhJuly2019,
        TableKind::CppWorkshopMay2019,
        TableKind::Rsc2019,
        TableKind::CCppWorkshopAugust2019,
        TableKind::Hacktoberfest2019,
        TableKind::CsiNovember2019,
        TableKind::CsiNovemberNonMember2019,
        TableKind::P5November2019,
        TableKind::CNovember2019,
        TableKind::BitgritDecember2019,
        TableKind::TestUsers,
        TableKind::Access,
        TableKind::Users,
        TableKind::Events,
        TableKind::CodexDecember2019,
        TableKind::Bov2020,
        TableKind::Coursera2020,
        TableKind::Tsg,
    ];

    /// Look a table name up. Never fails; absent names are `Unknown`.
    pub fn lookup(name: &str) -> TableLookup {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .map_or(TableLookup::Unknown, TableLookup::Known)
    }

    pub fn name(self) -> &'static str {
        with_record!(self, |R| R::TABLE)
    }

    pub fn columns(self) -> &'static [Column] {
        with_record!(self, |R| R::COLUMNS)
    }

    pub fn foreign_keys(self) -> &'static [ForeignKey] {
        with_record!(self, |R| R::FOREIGN_KEYS)
    }

    /// Whether the table can take registration form submissions.
    pub fn is_registrant(self) -> bool {
        let columns = self.columns();
        let has_integer_id = columns
            .iter()
            .any(|c| c.name == "id" && c.is_primary_key() && c.ty == ColumnType::Integer);
        has_integer_id
            && REGISTRANT_COLUMNS
                .iter()
                .all(|name| columns.iter().any(|c| c.name == *name))
    }

    /// Order `kinds` so that every table comes after the tables it references.
    ///
    /// Stable on the input order; references to tables outside `kinds` are ignored.
    pub fn dependency_order(kinds: &[TableKind]) -> Vec<TableKind> {
        let present: HashSet<&str> = kinds.iter().map(|k| k.name()).collect();
        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(kinds.len());
        let mut pending: Vec<TableKind> = kinds.to_vec();

        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|kind| {
                let ready = kind
                    .foreign_keys()
                    .iter()
                    .filter(|fk| fk.table != kind.name() && present.contains(fk.table))
                    .all(|fk| placed.contains(fk.table));
                if ready {
                    placed.insert(kind.name());
                    ordered.push(*kind);
                }
                !ready
            });
            if pending.len() == before {
                // Reference cycle: keep the remaining tables in input order.
                tracing::warn!(
                    tables = ?pending.iter().map(|k| k.name()).collect::<Vec<_>>(),
                    "Foreign key cycle between tables"
                );
                ordered.append(&mut pending);
            }
        }

        ordered
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
