use anyhow::{Context, Result, ensure};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

/// Create an HTTP client for talking to the feeder backend
///
/// # Arguments
/// * `timeout` - Upper bound for a single request, including reading the body
/// * `user_agent` - Value of the `User-Agent` header sent with every request
pub fn http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("failed to create HTTP client")
}

#[derive(Deserialize)]
struct MessageBody {
    message: Option<String>,
    error: Option<String>,
}

/// Extract a user-facing error text from a failed response body
///
/// The backend answers failures with `{"success": false, "message": "..."}`.
/// Falls back to the raw body, or to a generic text if the body is empty.
pub fn error_message(context_msg: &str, status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(MessageBody { message, error }) = serde_json::from_str::<MessageBody>(body) {
        if let Some(msg) = message.or(error).filter(|m| !m.trim().is_empty()) {
            return msg;
        }
    }

    let body = body.trim();
    if body.is_empty() || body.starts_with('{') {
        format!("{context_msg} failed with status {status}")
    } else {
        body.to_string()
    }
}

/// Handle HTTP response by checking status and extracting body
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `context_msg` - Context message describing the request (e.g., "POST /api/config")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is successful
/// * `Err` - If the status is not successful or reading the body fails. The
///   error text is the backend's message when one is provided.
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.context("failed to read response body")?;

    ensure!(
        status.is_success(),
        "{}",
        error_message(context_msg, status, &body)
    );

    Ok(body)
}
