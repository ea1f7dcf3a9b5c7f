//! Per-event registrant tables.
//!
//! Every event gets its own table. All of them share the identity key and
//! the `name`/`email`/`phone`/`department` columns; some carry extra fields.

use crate::db::schema::record_schema;

/// Columns every registrant table must declare.
pub const REGISTRANT_COLUMNS: &[&str] = &["id", "name", "email", "phone", "department"];

record_schema! {
    /// Codex, April 2019.
    pub struct CodexApril2019 {
        table: "codex_april_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
            paid: bool,
        }
    }
}

record_schema! {
    /// Ethical hacking workshop, July 2019.
    pub struct EhJuly2019 {
        table: "eh_july_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
        }
    }
}

record_schema! {
    /// C++ workshop, May 2019.
    pub struct CppWorkshopMay2019 {
        table: "cpp_workshop_may_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
            paid: bool,
        }
    }
}

record_schema! {
    pub struct Rsc2019 {
        table: "rsc_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
        }
    }
}

record_schema! {
    /// C/C++ workshop, August 2019.
    pub struct CCppWorkshopAugust2019 {
        table: "c_cpp_workshop_august_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            section: Option<String>,
        }
    }
}

record_schema! {
    /// Hacktoberfest 2019.
    pub struct Hacktoberfest2019 {
        table: "do_hacktoberfest_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            github: Option<String>,
        }
    }
}

record_schema! {
    /// CSI members, November 2019.
    pub struct CsiNovember2019 {
        table: "csi_november_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            csi_id: Option<String>,
        }
    }
}

record_schema! {
    /// CSI non-members, November 2019.
    pub struct CsiNovemberNonMember2019 {
        table: "csi_november_non_member_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
        }
    }
}

record_schema! {
    pub struct P5November2019 {
        table: "p5_november_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
        }
    }
}

record_schema! {
    pub struct CNovember2019 {
        table: "c_november_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            section: Option<String>,
        }
    }
}

record_schema! {
    pub struct BitgritDecember2019 {
        table: "bitgrit_december_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
        }
    }
}

record_schema! {
    /// Scratch table used to try out forms.
    pub struct TestTable {
        table: "test_users",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
        }
    }
}

record_schema! {
    pub struct CodexDecember2019 {
        table: "codex_december_2019",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
            paid: bool,
        }
    }
}

record_schema! {
    /// Battle of Villains 2020. Team registrations.
    pub struct Bov2020 {
        table: "bov_2020",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            team_name: Option<String>,
        }
    }
}

record_schema! {
    /// Coursera licence giveaway, 2020.
    pub struct Coursera2020 {
        table: "coursera_2020",
        columns: {
            id: i32 [Primary],
            name: String,
            email: String [Unique],
            phone: String,
            department: String,
            year: Option<String>,
            roll_number: Option<String>,
        }
    }
}
