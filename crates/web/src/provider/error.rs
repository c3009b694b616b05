//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] waggle_core::EmailError),

    /// The provider rejected the email address without giving a reason.
    #[error("email rejected by provider")]
    EmailRejected,

    /// Wrong password or unknown account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account already exists for this email.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password rejected by the provider's policy.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The account has been disabled by an administrator.
    #[error("user disabled")]
    UserDisabled,

    /// The provider is throttling this account or client.
    #[error("too many attempts")]
    TooManyAttempts,

    /// The id or refresh token is no longer valid.
    #[error("session expired")]
    SessionExpired,

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Provider returned an error code we do not map.
    #[error("provider error: {0}")]
    Provider(String),

    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Map an Identity Toolkit / Secure Token error message to an `AuthError`.
    ///
    /// Messages look like `EMAIL_NOT_FOUND` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let (code, detail) = message
            .split_once(" : ")
            .map_or((message.trim(), None), |(code, detail)| {
                (code.trim(), Some(detail.trim()))
            });

        match code {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                Self::InvalidCredentials
            }
            "EMAIL_EXISTS" => Self::UserAlreadyExists,
            "WEAK_PASSWORD" => Self::WeakPassword(
                detail.unwrap_or("Password should be at least 6 characters").to_string(),
            ),
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND"
            | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => Self::SessionExpired,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::EmailRejected,
            other => Self::Provider(other.to_string()),
        }
    }

    /// Human-readable message for inline display on forms.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(e) => format!("Please enter a valid email address ({e})."),
            Self::EmailRejected => "Please enter a valid email address.".to_string(),
            Self::InvalidCredentials => "Invalid email or password.".to_string(),
            Self::UserAlreadyExists => "An account with this email already exists.".to_string(),
            Self::WeakPassword(detail) => format!("Password is too weak: {detail}."),
            Self::UserDisabled => "This account has been disabled.".to_string(),
            Self::TooManyAttempts => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            Self::SessionExpired | Self::NotSignedIn => {
                "Your session has expired. Please log in again.".to_string()
            }
            Self::Provider(_) | Self::Http(_) | Self::PasswordHash => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_codes_collapse() {
        for code in ["EMAIL_NOT_FOUND", "INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"] {
            assert!(matches!(
                AuthError::from_provider_message(code),
                AuthError::InvalidCredentials
            ));
        }
    }

    #[test]
    fn test_weak_password_keeps_detail() {
        let err = AuthError::from_provider_message(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        );
        match err {
            AuthError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_token_codes_mean_expired() {
        assert!(matches!(
            AuthError::from_provider_message("TOKEN_EXPIRED"),
            AuthError::SessionExpired
        ));
        assert!(matches!(
            AuthError::from_provider_message("INVALID_REFRESH_TOKEN"),
            AuthError::SessionExpired
        ));
    }

    #[test]
    fn test_invalid_email_codes_add_no_detail() {
        for code in ["INVALID_EMAIL", "MISSING_EMAIL"] {
            let err = AuthError::from_provider_message(code);
            assert!(matches!(err, AuthError::EmailRejected));
            assert_eq!(err.user_message(), "Please enter a valid email address.");
        }
    }

    #[test]
    fn test_unknown_code() {
        match AuthError::from_provider_message("OPERATION_NOT_ALLOWED") {
            AuthError::Provider(code) => assert_eq!(code, "OPERATION_NOT_ALLOWED"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = AuthError::Provider("INTERNAL_BACKEND_FAILURE".to_string());
        assert!(!err.user_message().contains("INTERNAL"));
        assert_eq!(
            AuthError::InvalidCredentials.user_message(),
            "Invalid email or password."
        );
    }
}
