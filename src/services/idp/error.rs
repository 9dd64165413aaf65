use thiserror::Error;

/// Upper bound for IdP response bodies carried inside errors.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Errors raised by the identity provider client.
///
/// Every variant names the operation that failed so log lines and denial
/// reasons stay readable without carrying request details.
#[derive(Debug, Error)]
pub enum IdpError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} returned an unreadable body: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned an invalid response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl IdpError {
    pub fn status(operation: &'static str, status: u16, body: &str) -> Self {
        Self::Status {
            operation,
            status,
            body: truncate_body(body),
        }
    }

    pub fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// Transport failures and 5xx responses are worth another attempt;
    /// 4xx answers are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The request never reached the IdP, so replaying it cannot duplicate
    /// a side effect.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_connect())
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_bodies_are_truncated_on_a_char_boundary() {
        let body = "é".repeat(400);
        let err = IdpError::status("get userinfo", 502, &body);

        let IdpError::Status { body: kept, .. } = &err else {
            panic!("expected status error");
        };
        assert!(kept.len() <= MAX_ERROR_BODY_BYTES + 3);
        assert!(kept.ends_with("..."));
    }

    #[test]
    fn classifies_status_codes() {
        assert!(IdpError::status("x", 404, "").is_not_found());
        assert!(IdpError::status("x", 409, "").is_conflict());
        assert!(IdpError::status("x", 503, "").is_retryable());
        assert!(!IdpError::status("x", 401, "").is_retryable());
        assert!(!IdpError::invalid_response("x", "empty id").is_retryable());
    }
}
