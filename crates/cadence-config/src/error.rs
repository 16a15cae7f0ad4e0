//! Error types for configuration operations.

use std::path::PathBuf;

use cadence_core::GraphError;
use cadence_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while loading or applying a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Unknown processor type
    #[error("unknown processor type '{kind}' for '{id}'")]
    UnknownProcessor {
        /// Processor id in the pipeline.
        id: String,
        /// The unregistered type tag.
        kind: String,
    },

    /// Two processors share an id
    #[error("duplicate processor id '{0}'")]
    DuplicateId(String),

    /// A processor names a parent that is not declared before it
    #[error("processor '{id}' has unknown parent '{parent}'")]
    UnknownParent {
        /// Processor id.
        id: String,
        /// The missing parent id.
        parent: String,
    },

    /// Invalid processor parameters
    #[error("invalid configuration for '{id}': {source}")]
    Processor {
        /// Processor id.
        id: String,
        /// What the registry rejected.
        #[source]
        source: RegistryError,
    },

    /// Malformed processor spec string
    #[error("invalid processor spec '{spec}': {reason}")]
    InvalidSpec {
        /// The spec as given.
        spec: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The resulting graph was rejected
    #[error("invalid pipeline graph: {0}")]
    Graph(#[from] GraphError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid spec error.
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;
    use std::path::Path;

    fn denied() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn file_errors_keep_path_and_cause() {
        let read = ConfigError::read_file("pipelines/scan.toml", denied());
        assert!(matches!(&read, ConfigError::ReadFile { path, .. } if path == Path::new("pipelines/scan.toml")));
        assert!(read.to_string().contains("pipelines/scan.toml"));
        assert_eq!(read.source().map(ToString::to_string).as_deref(), Some("denied"));

        let write = ConfigError::write_file("out.toml", denied());
        assert!(matches!(&write, ConfigError::WriteFile { path, .. } if path == Path::new("out.toml")));
        assert!(write.source().is_some());
    }

    #[test]
    fn unknown_parent_display() {
        let err = ConfigError::UnknownParent {
            id: "level".to_string(),
            parent: "mixdown".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "processor 'level' has unknown parent 'mixdown'"
        );
    }

    #[test]
    fn invalid_spec_display() {
        let err = ConfigError::invalid_spec("level:block_size", "expected key=value");
        assert_eq!(
            err.to_string(),
            "invalid processor spec 'level:block_size': expected key=value"
        );
    }

    #[test]
    fn processor_error_chains_to_registry() {
        let err = ConfigError::Processor {
            id: "copy".to_string(),
            source: RegistryError::MissingParameter("path".to_string()),
        };
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("missing required parameter 'path'"));
        assert!(ConfigError::DuplicateId("a".to_string()).source().is_none());
    }
}
