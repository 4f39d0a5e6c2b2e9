//! Error classification for Discord API calls.
//!
//! Maps serenity errors onto log levels so permanent failures stand out from
//! transient noise. Nothing here retries; failures are surfaced to the user
//! as a plain message by the caller when appropriate.

use serenity::http::HttpError;
use tracing::{error, warn};

/// High-level category of a failed Discord call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 429. We log and move on; there is no retry queue.
    RateLimited,
    /// 4xx. The call will not succeed if repeated.
    Permanent,
    /// Network errors, 5xx, gateway hiccups.
    Transient,
}

/// Classify a serenity error.
pub fn classify(err: &serenity::Error) -> ErrorKind {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            let status = resp.status_code.as_u16();
            if status == 429 {
                ErrorKind::RateLimited
            } else if (400..500).contains(&status) {
                ErrorKind::Permanent
            } else {
                ErrorKind::Transient
            }
        }
        _ => ErrorKind::Transient,
    }
}

/// Log a failed Discord call at the level its classification warrants.
///
/// - Permanent → `error!`
/// - Rate-limited / transient → `warn!`
pub fn log_error(operation: &str, context: &str, err: &serenity::Error) {
    match classify(err) {
        ErrorKind::Permanent => error!("{} ({}): {}", context, operation, err),
        ErrorKind::RateLimited => warn!("{} ({}): rate limited: {}", context, operation, err),
        ErrorKind::Transient => warn!("{} ({}): {}", context, operation, err),
    }
}
