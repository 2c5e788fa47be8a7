use thiserror::Error;

#[derive(Debug, Error)]
pub enum DealerError {
    #[error("no dealership data in {0}: run 'dealer generate'")]
    NotInitialized(String),

    #[error("vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("inquiry not found: {0}")]
    InquiryNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A write to the state store, the action log, or the outbox failed.
    /// Fatal for the current cycle.
    #[error("persistence failure writing {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DealerError {
    pub fn persistence(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

pub type Result<T> = std::result::Result<T, DealerError>;
