//! Response classification
//!
//! `classify` turns whatever one attempt produced into exactly one `Outcome`.
//! Checks run in priority order, first match wins:
//! timed out, no response (status 0), server error (>= 500), client error
//! (400-499), unclassifiable code (1-99), and finally the success path where
//! the body is decoded.

use serde_json::Value;

use crate::core::TransportOutcome;

pub const SERVER_SIDE_ERRORS_START: u16 = 500;
pub const CLIENT_SIDE_ERRORS_START: u16 = 400;

/// Classification of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 1xx-3xx with a JSON body
    Success(Value),

    /// 1xx-3xx with an empty or whitespace-only body
    EmptyBody,

    /// 1xx-3xx whose body is not valid JSON, or does not fit the requested type
    DecodeFailure { raw: String, cause: String },

    /// The attempt hit its deadline
    Timeout,

    /// No HTTP response was received
    HttpError { reason: String },

    /// Status >= 500
    ServerError { status: u16 },

    /// Status 400-499
    ClientError { status: u16 },

    /// Status outside every known range
    BadReturnCode { status: u16 },
}

impl Outcome {
    /// Name used in log lines and reports
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "Success",
            Outcome::EmptyBody => "EmptyBody",
            Outcome::DecodeFailure { .. } => "DecodeFailure",
            Outcome::Timeout => "TimeoutOccured",
            Outcome::HttpError { .. } => "HttpError",
            Outcome::ServerError { .. } => "BadReturnCode",
            Outcome::ClientError { .. } => "ClientError",
            Outcome::BadReturnCode { .. } => "BadReturnCode",
        }
    }

    /// Whether the Reporter hears about this outcome
    pub fn is_reported(&self) -> bool {
        !matches!(
            self,
            Outcome::Success(_) | Outcome::EmptyBody | Outcome::ClientError { .. }
        )
    }
}

/// Classify one transport outcome
pub fn classify(outcome: &TransportOutcome) -> Outcome {
    if outcome.timed_out {
        return Outcome::Timeout;
    }

    match outcome.status_code {
        0 => Outcome::HttpError {
            reason: outcome.return_code().to_string(),
        },
        status if status >= SERVER_SIDE_ERRORS_START => Outcome::ServerError { status },
        status if status >= CLIENT_SIDE_ERRORS_START => Outcome::ClientError { status },
        status @ 1..=99 => Outcome::BadReturnCode { status },
        _ => decode_body(&outcome.body),
    }
}

fn decode_body(body: &[u8]) -> Outcome {
    let text = String::from_utf8_lossy(body);

    if text.trim().is_empty() {
        return Outcome::EmptyBody;
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(value) => Outcome::Success(value),
        Err(e) => Outcome::DecodeFailure {
            raw: text.into_owned(),
            cause: e.to_string(),
        },
    }
}
