use std::path::PathBuf;

/// Unified error type for the harvest pipeline.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error(transparent)]
    Client(#[from] typebot_client::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that must stop a batch instead of skipping the current item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Client(e) => e.is_auth() || matches!(e, typebot_client::Error::Config(_)),
            Self::Config(_) | Self::Toml(_) => true,
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_auth())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_and_config_are_fatal() {
        let auth = HarvestError::from(typebot_client::Error::Auth {
            message: "expired".into(),
        });
        assert!(auth.is_fatal());
        assert!(auth.is_auth());

        assert!(HarvestError::Config("AUTH_TOKEN is not set".into()).is_fatal());
        assert!(HarvestError::from(typebot_client::Error::Config("bad url".into())).is_fatal());
    }

    #[test]
    fn test_not_found_is_skippable() {
        let err = HarvestError::from(typebot_client::Error::not_found("bot b9"));
        assert!(err.is_not_found());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Not found: bot b9");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = HarvestError::io(
            "DB/out.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("DB/out.csv"));
        assert!(!err.is_fatal());
    }
}
