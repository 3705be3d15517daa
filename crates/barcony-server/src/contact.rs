//! Contact form endpoint.

use std::sync::{Arc, OnceLock};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

const MISSING_FIELDS: &str = "Naam, e-mail en bericht zijn verplicht";
const INVALID_EMAIL: &str = "Ongeldig e-mailadres";
const INVALID_REQUEST: &str = "Ongeldig verzoek";
const THANK_YOU: &str = "Bedankt voor je bericht! We nemen binnen 24 uur contact met je op.";
const FAILURE: &str =
    "Er is iets misgegaan. Probeer het later opnieuw of neem direct contact met ons op.";
const NOT_PROVIDED: &str = "Niet opgegeven";

/// Submitted form fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub model: Option<String>,
    pub message: Option<String>,
    /// Hidden field only bots fill in
    pub honeypot: Option<String>,
}

/// Successful response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A validated submission.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub model: Option<String>,
    pub message: String,
    pub client_ip: Option<String>,
    pub received_at: chrono::DateTime<chrono::Local>,
}

impl ContactMessage {
    /// Plain-text notification for the business inbox.
    pub fn email_body(&self) -> String {
        format!(
            "Nieuw contactformulier bericht van Barcony.nl\n\n\
             Naam: {}\n\
             E-mail: {}\n\
             Telefoon: {}\n\
             Woonplaats: {}\n\
             Model interesse: {}\n\n\
             Bericht:\n{}\n\n\
             ---\n\
             Verzonden op: {}\n\
             IP-adres: {}",
            self.name,
            self.email,
            self.phone.as_deref().unwrap_or(NOT_PROVIDED),
            self.city.as_deref().unwrap_or(NOT_PROVIDED),
            self.model.as_deref().unwrap_or(NOT_PROVIDED),
            self.message,
            self.received_at.format("%d-%m-%Y %H:%M:%S"),
            self.client_ip.as_deref().unwrap_or("onbekend"),
        )
    }
}

/// Errors delivering a submission.
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Failed to deliver contact message: {0}")]
    Delivery(String),
}

/// Hands validated submissions to the business.
pub trait ContactNotifier: Send + Sync {
    fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError>;
}

/// Notifier that only logs the submission.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl ContactNotifier for LogNotifier {
    fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError> {
        let preview: String = message.message.chars().take(100).collect();
        tracing::info!(
            name = %message.name,
            email = %message.email,
            phone = message.phone.as_deref().unwrap_or(""),
            timestamp = %message.received_at.to_rfc3339(),
            "Contact form submission: {}...",
            preview
        );
        Ok(())
    }
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in pattern"))
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Validate a request into a message.
pub fn validate(
    request: ContactRequest,
    client_ip: Option<String>,
) -> Result<ContactMessage, &'static str> {
    let (Some(name), Some(email), Some(message)) = (
        present(request.name),
        present(request.email),
        present(request.message),
    ) else {
        return Err(MISSING_FIELDS);
    };

    if !email_pattern().is_match(&email) {
        return Err(INVALID_EMAIL);
    }

    Ok(ContactMessage {
        name,
        email,
        phone: present(request.phone),
        city: present(request.city),
        model: present(request.model),
        message,
        client_ip,
        received_at: chrono::Local::now(),
    })
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// `POST /api/contact`
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Rejected contact request: {}", e);
            return error(StatusCode::BAD_REQUEST, INVALID_REQUEST);
        }
    };

    if present(request.honeypot.clone()).is_some() {
        tracing::debug!("Honeypot filled, dropping submission");
        return Json(ContactResponse {
            success: true,
            message: None,
        })
        .into_response();
    }

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let message = match validate(request, client_ip) {
        Ok(message) => message,
        Err(reason) => return error(StatusCode::BAD_REQUEST, reason),
    };

    match state.notifier.deliver(&message) {
        Ok(()) => Json(ContactResponse {
            success: true,
            message: Some(THANK_YOU.to_string()),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Contact form error: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, FAILURE)
        }
    }
}

/// Any method other than POST.
pub async fn method_not_allowed() -> Response {
    error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<ContactMessage>>,
        fail: bool,
    }

    impl ContactNotifier for RecordingNotifier {
        fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError> {
            if self.fail {
                return Err(ContactError::Delivery("smtp down".to_string()));
            }
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn app(notifier: Arc<RecordingNotifier>) -> axum::Router {
        router(PathBuf::from("site"), notifier)
    }

    async fn post(app: axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/contact")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn valid_form() -> serde_json::Value {
        serde_json::json!({
            "name": "Sanne",
            "email": "sanne@example.nl",
            "city": "Amsterdam",
            "model": "Barcony Classic",
            "message": "Graag een offerte voor een balkonbar."
        })
    }

    #[tokio::test]
    async fn accepts_valid_submission() {
        let notifier = Arc::new(RecordingNotifier::default());

        let (status, body) = post(app(notifier.clone()), valid_form()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], THANK_YOU);

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].client_ip.as_deref(), Some("203.0.113.7"));
        assert!(messages[0].email_body().contains("Telefoon: Niet opgegeven"));
        assert!(messages[0].email_body().contains("Woonplaats: Amsterdam"));
    }

    #[tokio::test]
    async fn honeypot_is_silently_accepted() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut form = valid_form();
        form["honeypot"] = "http://spam.example".into();

        let (status, body) = post(app(notifier.clone()), form).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "success": true }));
        assert!(notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_missing_fields() {
        let notifier = Arc::new(RecordingNotifier::default());

        let (status, body) =
            post(app(notifier), serde_json::json!({ "name": "Sanne", "email": "a@b.nl" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MISSING_FIELDS);
    }

    #[tokio::test]
    async fn rejects_invalid_email() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut form = valid_form();
        form["email"] = "sanne@example".into();

        let (status, body) = post(app(notifier), form).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], INVALID_EMAIL);
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let notifier = Arc::new(RecordingNotifier::default());
        let resp = app(notifier)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/contact")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delivery_failure_is_a_server_error() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });

        let (status, body) = post(app(notifier), valid_form()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], FAILURE);
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let resp = app(notifier)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/contact")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Method not allowed");
    }

    #[test]
    fn validation_trims_optional_fields() {
        let request = ContactRequest {
            name: Some("Sanne".to_string()),
            email: Some("sanne@example.nl".to_string()),
            phone: Some("  ".to_string()),
            message: Some("Hallo".to_string()),
            ..Default::default()
        };

        let message = validate(request, None).unwrap();

        assert_eq!(message.phone, None);
        assert!(message.email_body().contains("IP-adres: onbekend"));
    }
}
