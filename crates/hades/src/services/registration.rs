//! Registration service: turns a submitted form into a registrant row and
//! sends the confirmation side effects.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::db::queries::record as queries;
use crate::db::schema::filter_columns;
use crate::db::{DbPool, FieldMap, Record, TableKind, TableLookup};
use crate::error::{AppError, AppResult};
use crate::notify::{qr, Address, Mail, Notifier};
use crate::with_record;

/// Fields every submission must carry.
pub const REQUIRED_FIELDS: &[&str] = &["name", "phone", "email"];

/// Shortest phone number accepted.
pub const MIN_PHONE_LEN: usize = 10;

const SECOND_PERSON_FIELDS: [(&str, &str); 3] = [
    ("name", "name_second_person"),
    ("email", "email_second_person"),
    ("department", "department_second_person"),
];

const INSERT_FAILED: &str = "It appears there was an error while trying to enter your data into our database. Kindly contact someone from the team and we will have this resolved ASAP";

/// What the registrant gets back.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReceipt {
    pub id: i32,
    pub name: String,
    pub table: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    pub mail_sent: bool,
    pub message: String,
}

/// Service for registration form submissions.
#[derive(Clone)]
pub struct RegistrationService {
    pool: DbPool,
    notifier: Notifier,
    active_tables: Arc<Vec<TableKind>>,
    active_events: Arc<Vec<String>>,
}

impl RegistrationService {
    pub fn new(
        pool: DbPool,
        notifier: Notifier,
        active_tables: Vec<TableKind>,
        active_events: Vec<String>,
    ) -> Self {
        Self {
            pool,
            notifier,
            active_tables: Arc::new(active_tables),
            active_events: Arc::new(active_events),
        }
    }

    /// Register the submitter of `form`.
    pub async fn submit(&self, form: FieldMap) -> AppResult<RegistrationReceipt> {
        let kind = match resolve_table(&self.active_tables, &form) {
            Ok(kind) => kind,
            Err(e) => {
                if let Some(db) = form.get("db") {
                    self.notifier
                        .log(&format!(
                            "Someone just tried to register to table <code>{}</code>",
                            db
                        ))
                        .await;
                    self.notifier
                        .log(&format!("Full form:\n{}", dump_form(&form)))
                        .await;
                }
                return Err(e);
            }
        };
        let event = resolve_event(&self.active_events, &form)?;
        check_required(&form)?;

        let mut fields = match prepare_fields(kind, &form) {
            Ok(fields) => fields,
            Err(e) => {
                self.notifier
                    .log(&format!(
                        "Exception on WhatsApp Number:\n{}",
                        dump_form(&form)
                    ))
                    .await;
                return Err(e);
            }
        };
        let no_qr = form.contains_key("no_qr");

        let mut tx = self.pool.begin().await?;
        queries::lock_for_insert(&mut *tx, kind.name()).await?;
        let id = queries::next_id(&mut *tx, kind.name()).await?;
        fields.insert("id".to_string(), id.to_string());

        let email = field(&fields, "email");
        if queries::email_exists(&mut *tx, kind.name(), email).await? {
            return Err(AppError::Conflict(format!(
                "Email address {} already found in database! Please re-enter the form correctly!",
                email
            )));
        }
        for number in field(&fields, "phone").split('|') {
            check_phone_length(number)?;
            if queries::phone_exists(&mut *tx, kind.name(), number).await? {
                return Err(AppError::Conflict(format!(
                    "Phone number {} already found in database! Please re-enter the form correctly!",
                    number
                )));
            }
        }

        let qr = with_record!(kind, |R| {
            let record = R::from_fields(&fields)?;
            queries::insert_record(&mut *tx, &record)
                .await
                .map_err(hide_integrity_detail)?;
            if no_qr {
                None
            } else {
                Some(qr::payload(&record)?)
            }
        });
        tx.commit().await.map_err(AppError::from).map_err(hide_integrity_detail)?;

        let name = field(&fields, "name").to_string();
        tracing::info!(table = %kind, id, event = %event, "Registration stored");

        let mail_sent = self
            .send_confirmation(&form, &event, id, &name, qr.as_deref())
            .await;
        self.announce(&form, &event, id, &name).await;

        Ok(RegistrationReceipt {
            id,
            message: receipt_message(&name, qr.is_some(), mail_sent),
            name,
            table: kind.name().to_string(),
            event,
            qr,
            mail_sent,
        })
    }

    async fn send_confirmation(
        &self,
        form: &FieldMap,
        event: &str,
        id: i32,
        name: &str,
        qr: Option<&str>,
    ) -> bool {
        if !self.notifier.can_mail() {
            return false;
        }
        let date = form
            .get("date")
            .cloned()
            .unwrap_or_else(|| chrono::Local::now().format("%B,%Y").to_string());

        let mail = Mail {
            from: self.notifier.sender(),
            to: recipients(form),
            subject: subject(event, &date, id),
            html: mail_body(form, name, qr),
        };
        self.notifier.send_mail(&mail).await
    }

    async fn announce(&self, form: &FieldMap, event: &str, id: i32, name: &str) {
        let chat = form
            .get("chat_id")
            .map(String::as_str)
            .or(self.notifier.group_chat());
        let Some(chat) = chat else {
            return;
        };

        self.notifier.send_chat_action(chat, "typing").await;
        self.notifier
            .send_message(chat, &format!("New registration for {}!", event))
            .await;
        self.notifier
            .send_message(chat, &caption(form, name, id))
            .await;
    }
}

fn field<'a>(fields: &'a FieldMap, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or_default()
}

fn hide_integrity_detail(err: AppError) -> AppError {
    match err {
        AppError::Integrity(detail) => {
            tracing::warn!(error = %detail, "Registration rejected by the database");
            AppError::Integrity(INSERT_FAILED.to_string())
        }
        other => other,
    }
}

/// Pick the table a submission goes to.
pub fn resolve_table(active: &[TableKind], form: &FieldMap) -> AppResult<TableKind> {
    if let [only] = active {
        return Ok(*only);
    }
    let Some(db) = form.get("db") else {
        return Err(AppError::BadRequest(
            "You need to specify a database!".to_string(),
        ));
    };
    match TableKind::lookup(db) {
        TableLookup::Known(kind) if active.contains(&kind) => Ok(kind),
        _ => Err(AppError::BadRequest("That wasn't a valid db...".to_string())),
    }
}

/// Pick the event name a submission is for.
pub fn resolve_event(active: &[String], form: &FieldMap) -> AppResult<String> {
    if let [only] = active {
        return Ok(only.clone());
    }
    form.get("event").cloned().ok_or_else(|| {
        AppError::BadRequest("Hades does require the event name, you know?".to_string())
    })
}

pub fn check_required(form: &FieldMap) -> AppResult<()> {
    match REQUIRED_FIELDS.iter().find(|f| !form.contains_key(**f)) {
        Some(field) => Err(AppError::Validation(format!(
            "`{}` is required but has not been submitted!",
            field
        ))),
        None => Ok(()),
    }
}

/// Reduce a form to the table's columns and apply the WhatsApp and
/// second person adjustments.
pub fn prepare_fields(kind: TableKind, form: &FieldMap) -> AppResult<FieldMap> {
    let mut fields = filter_columns(form, kind.columns());

    if let Some(whatsapp) = form.get("whatsapp_number") {
        let phone = fields.get("phone").cloned().unwrap_or_default();
        match (phone.trim().parse::<i64>(), whatsapp.trim().parse::<i64>()) {
            (Ok(p), Ok(w)) if p != w => {
                fields.insert("phone".to_string(), format!("{}|{}", phone, whatsapp));
            }
            (Ok(_), Ok(_)) => {}
            _ => {
                return Err(AppError::Validation(
                    "That wasn't a WhatsApp number...".to_string(),
                ))
            }
        }
    }

    if SECOND_PERSON_FIELDS
        .iter()
        .all(|(_, extra)| form.contains_key(*extra))
    {
        for (column, extra) in SECOND_PERSON_FIELDS {
            if let (Some(value), Some(second)) = (fields.get_mut(column), form.get(extra)) {
                value.push_str(", ");
                value.push_str(second);
            }
        }
    }

    Ok(fields)
}

pub fn check_phone_length(number: &str) -> AppResult<()> {
    if number.chars().count() < MIN_PHONE_LEN {
        return Err(AppError::Validation(format!(
            "Phone number {} is too short! Please re-enter the form correctly!",
            number
        )));
    }
    Ok(())
}

pub fn subject(event: &str, date: &str, id: i32) -> String {
    format!("Registration for {} - {} - ID {}", event, date, id)
}

/// The registrant, plus the second person when their email differs.
fn recipients(form: &FieldMap) -> Vec<Address> {
    let mut to = vec![Address::new(
        form.get("email").cloned().unwrap_or_default(),
        form.get("name").cloned(),
    )];
    if let (Some(email), Some(name)) = (
        form.get("email_second_person"),
        form.get("name_second_person"),
    ) {
        if form.get("email") != Some(email) {
            to.push(Address::new(email.clone(), Some(name.clone())));
        }
    }
    to
}

/// `{{`, `}}` or a `{field}` placeholder.
static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{(\w+)\}"));

/// Replace `{field}` placeholders for each listed field in one pass over
/// the template. Substituted values are never scanned again, and `{{`/`}}`
/// stand for literal braces.
///
/// Placeholders naming an unlisted field, or a field absent from the form,
/// are left as they are.
pub fn fill_placeholders(template: &str, field_names: &str, form: &FieldMap) -> String {
    let pattern = match &*PLACEHOLDER {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::error!(error = %e, "Placeholder pattern failed to compile");
            return template.to_string();
        }
    };
    let listed: Vec<&str> = field_names
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    pattern
        .replace_all(template, |caps: &Captures| {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                return caps[0][..1].to_string();
            };
            match form.get(name) {
                Some(value) if listed.contains(&name) => value.clone(),
                Some(_) => caps[0].to_string(),
                None => {
                    tracing::warn!(field = name, "Email placeholder has no form value");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

pub fn mail_body(form: &FieldMap, name: &str, qr: Option<&str>) -> String {
    let mut body = match (
        form.get("email_formattable_content"),
        form.get("email_content_fields"),
    ) {
        (Some(template), Some(names)) => {
            let mut body = form.get("email_content").cloned().unwrap_or_default();
            body.push_str(&fill_placeholders(template, names, form));
            body
        }
        _ => {
            let mut body = format!("<hr>\n{}, your registration is done!\n<br/>\n", name);
            if let Some(qr) = qr {
                body.push_str(&format!(
                    "Your QR code data is below.\n<br/>\nYou're <b>required</b> to present this on the day of the event.\n<br/>\n<code>{}</code>",
                    qr
                ));
            }
            body
        }
    };

    if let Some(extra) = form.get("extra_message") {
        body.push_str("<br/>");
        body.push_str(extra);
    }
    body
}

pub fn caption(form: &FieldMap, name: &str, id: i32) -> String {
    let mut caption = format!("Name: {} | ID: {}", name, id);
    if let Some(extra) = form.get("extra_field_telegram") {
        let value = form.get(extra).map(String::as_str).unwrap_or_default();
        caption.push_str(&format!(" | {} - {}", extra, value));
    }
    caption
}

pub fn receipt_message(name: &str, has_qr: bool, mail_sent: bool) -> String {
    let mut message = format!("Thank you for registering, {}!", name);
    if has_qr {
        message.push_str(" Please save this QR Code.");
        if mail_sent {
            message.push_str(" It has also been emailed to you.");
        }
    } else {
        message.push_str(" Please check your email for confirmation.");
    }
    message
}

fn dump_form(form: &FieldMap) -> String {
    form.iter()
        .map(|(k, v)| format!("<code>{}</code> - <code>{}</code>", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fill_placeholders_is_single_pass() {
        let submitted = form(&[("team_name", "{slot}"), ("slot", "3")]);
        assert_eq!(
            fill_placeholders("Team {team_name}, slot {slot}", "team_name,slot", &submitted),
            "Team {slot}, slot 3"
        );
        assert_eq!(
            fill_placeholders("Team {team_name}, slot {slot}", "slot, team_name", &submitted),
            "Team {slot}, slot 3"
        );
    }

    #[test]
    fn test_fill_placeholders_keeps_unknown_and_escaped_braces() {
        let submitted = form(&[("name", "A"), ("secret", "x")]);
        assert_eq!(
            fill_placeholders("{{name}} is {name}, {secret} {missing}", "name,missing", &submitted),
            "{name} is A, {secret} {missing}"
        );
    }

    #[test]
    fn test_single_active_table_ignores_db() {
        let kind = resolve_table(&[TableKind::Coursera2020], &form(&[("db", "users")])).unwrap();
        assert_eq!(kind, TableKind::Coursera2020);
    }

    #[test]
    fn test_resolve_table_from_db_field() {
        let active = [TableKind::TestUsers, TableKind::Bov2020];
        assert_eq!(
            resolve_table(&active, &form(&[("db", "bov_2020")])).unwrap(),
            TableKind::Bov2020
        );

        let err = resolve_table(&active, &form(&[("db", "coursera_2020")])).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "That wasn't a valid db..."));

        let err = resolve_table(&active, &form(&[("db", "no_such_table")])).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "That wasn't a valid db..."));

        let err = resolve_table(&active, &form(&[])).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "You need to specify a database!"));
    }

    #[test]
    fn test_resolve_event() {
        let single = vec!["Coursera 2020".to_string()];
        assert_eq!(
            resolve_event(&single, &form(&[("event", "Other")])).unwrap(),
            "Coursera 2020"
        );

        let many = vec!["A".to_string(), "B".to_string()];
        assert_eq!(resolve_event(&many, &form(&[("event", "B")])).unwrap(), "B");
        assert!(resolve_event(&many, &form(&[])).is_err());
    }

    #[test]
    fn test_check_required() {
        let err = check_required(&form(&[("name", "A"), ("email", "a@x.in")])).unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ref m) if m == "`phone` is required but has not been submitted!")
        );
        assert!(check_required(&form(&[("name", "A"), ("email", "e"), ("phone", "p")])).is_ok());
    }

    #[test]
    fn test_prepare_drops_unlisted_fields() {
        let fields = prepare_fields(
            TableKind::TestUsers,
            &form(&[
                ("name", "A"),
                ("email", "a@x.in"),
                ("phone", "9876543210"),
                ("extra_unlisted_field", "x"),
                ("db", "test_users"),
            ]),
        )
        .unwrap();
        assert!(!fields.contains_key("extra_unlisted_field"));
        assert!(!fields.contains_key("db"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_prepare_whatsapp_number() {
        let base = [("name", "A"), ("email", "a@x.in"), ("phone", "9876543210")];

        let mut submitted = form(&base);
        submitted.insert("whatsapp_number".to_string(), "9123456789".to_string());
        let fields = prepare_fields(TableKind::TestUsers, &submitted).unwrap();
        assert_eq!(fields["phone"], "9876543210|9123456789");

        submitted.insert("whatsapp_number".to_string(), "9876543210".to_string());
        let fields = prepare_fields(TableKind::TestUsers, &submitted).unwrap();
        assert_eq!(fields["phone"], "9876543210");

        submitted.insert("whatsapp_number".to_string(), "not a number".to_string());
        let err = prepare_fields(TableKind::TestUsers, &submitted).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "That wasn't a WhatsApp number..."));
    }

    #[test]
    fn test_prepare_second_person() {
        let mut submitted = form(&[
            ("name", "A"),
            ("email", "a@x.in"),
            ("phone", "9876543210"),
            ("department", "IT"),
            ("name_second_person", "B"),
            ("email_second_person", "b@x.in"),
        ]);
        let fields = prepare_fields(TableKind::TestUsers, &submitted).unwrap();
        assert_eq!(fields["name"], "A");

        submitted.insert("department_second_person".to_string(), "CSE".to_string());
        let fields = prepare_fields(TableKind::TestUsers, &submitted).unwrap();
        assert_eq!(fields["name"], "A, B");
        assert_eq!(fields["email"], "a@x.in, b@x.in");
        assert_eq!(fields["department"], "IT, CSE");
    }

    #[test]
    fn test_phone_length() {
        assert!(check_phone_length("9876543210").is_ok());
        let err = check_phone_length("12345").unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("Phone number 12345 is too short!")));
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            subject("Coursera 2020", "April,2020", 42),
            "Registration for Coursera 2020 - April,2020 - ID 42"
        );
    }

    #[test]
    fn test_recipients() {
        let to = recipients(&form(&[
            ("name", "A"),
            ("email", "a@x.in"),
            ("name_second_person", "B"),
            ("email_second_person", "b@x.in"),
        ]));
        assert_eq!(to.len(), 2);
        assert_eq!(to[1].email, "b@x.in");

        let to = recipients(&form(&[
            ("name", "A"),
            ("email", "a@x.in"),
            ("name_second_person", "B"),
            ("email_second_person", "a@x.in"),
        ]));
        assert_eq!(to.len(), 1);
    }

    #[test]
    fn test_custom_mail_body() {
        let submitted = form(&[
            ("email_content", "<h1>Hi</h1>"),
            ("email_formattable_content", "Team {team_name}, slot {slot} {missing}"),
            ("email_content_fields", "team_name, slot,missing"),
            ("team_name", "Rustaceans"),
            ("slot", "3"),
            ("extra_message", "See you!"),
        ]);
        assert_eq!(
            mail_body(&submitted, "A", Some("payload")),
            "<h1>Hi</h1>Team Rustaceans, slot 3 {missing}<br/>See you!"
        );
    }

    #[test]
    fn test_default_mail_body() {
        let body = mail_body(&form(&[]), "A", Some("cGF5bG9hZA=="));
        assert!(body.contains("A, your registration is done!"));
        assert!(body.contains("<code>cGF5bG9hZA==</code>"));

        let body = mail_body(&form(&[]), "A", None);
        assert!(!body.contains("QR"));
    }

    #[test]
    fn test_caption() {
        assert_eq!(caption(&form(&[]), "A", 7), "Name: A | ID: 7");
        let submitted = form(&[("extra_field_telegram", "team_name"), ("team_name", "Crabs")]);
        assert_eq!(
            caption(&submitted, "A", 7),
            "Name: A | ID: 7 | team_name - Crabs"
        );
    }

    #[test]
    fn test_receipt_message() {
        assert_eq!(
            receipt_message("A", true, true),
            "Thank you for registering, A! Please save this QR Code. It has also been emailed to you."
        );
        assert_eq!(
            receipt_message("A", false, false),
            "Thank you for registering, A! Please check your email for confirmation."
        );
    }
}
