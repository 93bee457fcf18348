//! Webhook handler for repository push notifications

use axum::{
    Form,
    body::Bytes,
    extract::{FromRequest, Request, State as AxumState},
    http::{StatusCode, header},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::SharedState;
use crate::payload::RawRequest;

/// Form-encoded hook body: the JSON push lives in the `payload` field
#[derive(Debug, Deserialize)]
pub struct PayloadForm {
    pub payload: Option<String>,
}

/// Turn an HTTP request into the transport-neutral `RawRequest`.
pub async fn extract_raw_request(request: Request) -> RawRequest {
    let headers = request.headers();
    let source = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let mut metadata = vec![
        ("method".to_string(), request.method().to_string()),
        ("uri".to_string(), request.uri().to_string()),
    ];
    metadata.extend(headers.iter().map(|(name, value)| {
        (
            name.to_string(),
            String::from_utf8_lossy(value.as_bytes()).to_string(),
        )
    }));

    let payload = if is_form {
        match Form::<PayloadForm>::from_request(request, &()).await {
            Ok(Form(form)) => form.payload,
            Err(e) => {
                warn!("Could not parse form body: {}", e);
                None
            }
        }
    } else {
        match Bytes::from_request(request, &()).await {
            Ok(body) if !body.is_empty() => Some(String::from_utf8_lossy(&body).to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not read request body: {}", e);
                None
            }
        }
    };

    RawRequest::new(source, payload).with_metadata(metadata)
}

/// Handles the push webhook POST request.
///
/// Only a foreign source or a missing payload is answered with 403; every
/// other outcome is reported through the log and answered with 200.
pub async fn handle_webhook(AxumState(state): AxumState<SharedState>, request: Request) -> StatusCode {
    let raw = extract_raw_request(request).await;
    debug!("Webhook received from {:?}", raw.source);

    match state.dispatcher.handle(&raw).await {
        Err(e) if e.is_rejection() => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    }
}
