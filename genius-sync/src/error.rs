use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Échec d'un fetch de ressource.
///
/// `Api` : le serveur a répondu mais avec un statut non-2xx.
/// `Transport` : l'appel n'a pas abouti (DNS, connexion, timeout, décodage).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{message}")]
    Transport { message: String },
}

impl FetchError {
    pub fn is_http(&self) -> bool {
        matches!(self, FetchError::Api { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Api { status, .. } => Some(*status),
            FetchError::Transport { .. } => None,
        }
    }
}

// Les statuts non-2xx sont construits à la main dans les fetchers, tout
// reqwest::Error restant est donc un échec de transport ou de décodage.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport {
            message: err.to_string(),
        }
    }
}

/// Forme uniforme consommée par le store et la présentation : aucun code
/// aval ne branche sur la variante d'origine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub is_http: bool,
    pub status: Option<u16>,
    pub message: String,
}

impl From<&FetchError> for ErrorInfo {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Api { status, message } => ErrorInfo {
                is_http: true,
                status: Some(*status),
                message: message.clone(),
            },
            FetchError::Transport { message } => ErrorInfo {
                is_http: false,
                status: None,
                message: message.clone(),
            },
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_renders_status_and_message() {
        let err = FetchError::Api {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        let info = ErrorInfo::from(&err);
        assert!(info.is_http);
        assert_eq!(info.status, Some(503));
        assert_eq!(info.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_transport_error_renders_raw_message() {
        let err = FetchError::Transport {
            message: "connection refused".to_string(),
        };
        let info = ErrorInfo::from(&err);
        assert!(!info.is_http);
        assert_eq!(info.status, None);
        assert_eq!(info.to_string(), "connection refused");
    }
}
