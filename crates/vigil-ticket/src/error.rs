use jsonwebtoken::Algorithm;
use serde::Serialize;
use std::fmt;

/// Stable machine-readable codes for ticket rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketErrorCode {
    InvalidSignature,
    InvalidFormat,
    Expired,
    KillSwitch,
    ConstraintViolation,
}

impl TicketErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::Expired => "EXPIRED",
            Self::KillSwitch => "KILL_SWITCH",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
        }
    }
}

impl fmt::Display for TicketErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("invalid ticket signature: {0}")]
    InvalidSignature(String),

    #[error("invalid ticket format: {0}")]
    InvalidFormat(String),

    #[error("ticket expired at {expires_at} (now {now})")]
    Expired { expires_at: i64, now: i64 },

    #[error("ticket kill switch is active")]
    KillSwitch,

    #[error("{0}")]
    ConstraintViolation(String),
}

impl TicketError {
    pub fn code(&self) -> TicketErrorCode {
        match self {
            Self::InvalidSignature(_) => TicketErrorCode::InvalidSignature,
            Self::InvalidFormat(_) => TicketErrorCode::InvalidFormat,
            Self::Expired { .. } => TicketErrorCode::Expired,
            Self::KillSwitch => TicketErrorCode::KillSwitch,
            Self::ConstraintViolation(_) => TicketErrorCode::ConstraintViolation,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("invalid ticket options: {0}")]
    InvalidOptions(String),

    #[error("no signing key configured for {0:?}")]
    MissingSigningKey(Algorithm),

    #[error("failed to sign ticket: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("algorithm {0:?} requires a shared secret")]
    MissingSecret(Algorithm),

    #[error("algorithm {0:?} requires PEM key material")]
    MissingPem(Algorithm),

    #[error("invalid key material: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            TicketError::InvalidSignature("x".into()).code().as_str(),
            "INVALID_SIGNATURE"
        );
        assert_eq!(
            TicketError::Expired {
                expires_at: 1,
                now: 2
            }
            .code()
            .to_string(),
            "EXPIRED"
        );
        assert_eq!(
            serde_json::to_string(&TicketErrorCode::ConstraintViolation).unwrap(),
            "\"CONSTRAINT_VIOLATION\""
        );
    }
}
