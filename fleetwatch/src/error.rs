//! Error taxonomy shared by the pipeline stages.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Network or HTTP failure talking to the inventory service or notifier.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The inventory answered, but not with the JSON shape we expect.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("inventory returned no records for {alias}")]
    EmptyData { alias: String },

    #[error("malformed collection timestamp {raw:?}: {source}")]
    MalformedTimestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Read/write failure on local state. JSON encode/decode errors of the
    /// state files land here too.
    #[error("state file {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FleetError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        FleetError::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_names_the_file() {
        let err = FleetError::persistence(
            "state/ocorrencias.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("ocorrencias.json"), "{text}");
        assert!(text.contains("denied"), "{text}");
    }

    #[test]
    fn serde_errors_convert_into_persistence() {
        let bad = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err = FleetError::persistence("x.json", bad);
        assert!(matches!(err, FleetError::Persistence { .. }));
    }
}
