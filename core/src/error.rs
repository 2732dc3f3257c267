use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Malformed document {source_name}: {reason}")]
    MalformedSource { source_name: String, reason: String },

    #[error("Required column '{column}' missing from {source_name}")]
    MissingColumn {
        column: &'static str,
        source_name: String,
    },

    #[error("Backend '{kind}' is configured but not supported by this build")]
    UnsupportedBackend { kind: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EtlError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        EtlError::MalformedSource {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
