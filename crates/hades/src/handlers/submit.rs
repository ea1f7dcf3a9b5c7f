//! Registration form endpoint.

use axum::{extract::State, http::StatusCode, Form, Json};

use crate::db::FieldMap;
use crate::error::AppResult;
use crate::services::registration::RegistrationReceipt;
use crate::services::RegistrationService;

/// Accept a registration form.
///
/// `POST /submit`
///
/// The form carries the registrant's columns for the target table plus the
/// optional controls (`db`, `event`, `whatsapp_number`, second person
/// fields, `no_qr`, `chat_id`, email content fields, `extra_message`,
/// `extra_field_telegram`, `date`). Unknown fields are dropped.
///
/// # Response
///
/// ```json
/// {
///   "id": 12,
///   "name": "Ravi",
///   "table": "coursera_2020",
///   "event": "Coursera 2020",
///   "qr": "eyJpZCI6MTIsLi4ufQ==",
///   "mail_sent": true,
///   "message": "Thank you for registering, Ravi! Please save this QR Code. It has also been emailed to you."
/// }
/// ```
pub async fn submit(
    State(service): State<RegistrationService>,
    Form(form): Form<FieldMap>,
) -> AppResult<(StatusCode, Json<RegistrationReceipt>)> {
    let receipt = service.submit(form).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
