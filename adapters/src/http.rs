use errors::CollaboratorError;
use std::time::Duration;

/// Sends a request and maps transport failures and non-success statuses
/// into `CollaboratorError`.
pub(crate) async fn send(
    service: &str,
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, CollaboratorError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(service, timeout, e))?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(CollaboratorError::RateLimited {
            service: service.to_string(),
            retry_after,
        });
    }
    if !status.is_success() {
        return Err(CollaboratorError::Status {
            service: service.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

pub(crate) fn transport_error(
    service: &str,
    timeout: Duration,
    e: reqwest::Error,
) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout {
            service: service.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        CollaboratorError::Transport {
            service: service.to_string(),
            reason: e.to_string(),
        }
    }
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    service: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(service, timeout, e))?;
    serde_json::from_str(&body).map_err(|e| CollaboratorError::Rejected {
        service: service.to_string(),
        reason: format!("unexpected response body: {}", e),
    })
}
