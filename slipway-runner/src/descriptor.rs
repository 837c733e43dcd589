//! Descriptor reader
//!
//! Reads the image name and version from the rock descriptor and the
//! application name from the charm descriptor.

use serde_yaml_ng::Value as YamlValue;
use slipway_core::domain::DeploymentDescriptor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("descriptor {} is not valid YAML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("descriptor {} has no '{field}' field", .path.display())]
    MissingField { path: PathBuf, field: String },

    #[error("descriptor {} field '{field}' must be a scalar", .path.display())]
    InvalidField { path: PathBuf, field: String },
}

/// Reads descriptor files from a checkout
#[derive(Debug, Clone)]
pub struct DescriptorReader {
    rock_descriptor: PathBuf,
    charm_descriptor: PathBuf,
}

impl DescriptorReader {
    pub fn new(config: &Config) -> Self {
        Self {
            rock_descriptor: config.rock_descriptor.clone(),
            charm_descriptor: config.charm_dir.join(&config.charm_descriptor),
        }
    }

    pub async fn read(&self, checkout: &Path) -> Result<DeploymentDescriptor, DescriptorError> {
        let rock = Descriptor::load(checkout.join(&self.rock_descriptor)).await?;
        let charm = Descriptor::load(checkout.join(&self.charm_descriptor)).await?;

        let descriptor = DeploymentDescriptor {
            image_name: rock.field("name")?,
            image_version: rock.field("version")?,
            application_name: charm.field("name")?,
        };

        debug!("Read descriptor: {:?}", descriptor);
        Ok(descriptor)
    }
}

/// A parsed descriptor file
struct Descriptor {
    path: PathBuf,
    document: YamlValue,
}

impl Descriptor {
    async fn load(path: PathBuf) -> Result<Self, DescriptorError> {
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(source) => return Err(DescriptorError::Read { path, source }),
        };

        match serde_yaml_ng::from_str(&text) {
            Ok(document) => Ok(Self { path, document }),
            Err(source) => Err(DescriptorError::Parse { path, source }),
        }
    }

    /// Returns a top-level scalar field as text
    ///
    /// YAML types unquoted versions such as `1.0` as numbers; they are kept in
    /// their textual form.
    fn field(&self, name: &str) -> Result<String, DescriptorError> {
        let value = self
            .document
            .get(name)
            .ok_or_else(|| DescriptorError::MissingField {
                path: self.path.clone(),
                field: name.to_string(),
            })?;

        let text = match value {
            YamlValue::String(s) => s.clone(),
            YamlValue::Number(n) => n.to_string(),
            YamlValue::Bool(b) => b.to_string(),
            YamlValue::Null => {
                return Err(DescriptorError::MissingField {
                    path: self.path.clone(),
                    field: name.to_string(),
                });
            }
            _ => {
                return Err(DescriptorError::InvalidField {
                    path: self.path.clone(),
                    field: name.to_string(),
                });
            }
        };

        if text.trim().is_empty() {
            return Err(DescriptorError::MissingField {
                path: self.path.clone(),
                field: name.to_string(),
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout(rockcraft: Option<&str>, charmcraft: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("charm")).unwrap();
        if let Some(text) = rockcraft {
            std::fs::write(dir.path().join("rockcraft.yaml"), text).unwrap();
        }
        if let Some(text) = charmcraft {
            std::fs::write(dir.path().join("charm/charmcraft.yaml"), text).unwrap();
        }
        dir
    }

    fn reader() -> DescriptorReader {
        DescriptorReader::new(&Config::default())
    }

    #[tokio::test]
    async fn test_read_descriptor() {
        let dir = checkout(
            Some("name: myapp\nversion: '1.0'\nbase: ubuntu@22.04\nparts: {}\n"),
            Some("name: myapp-svc\ntype: charm\n"),
        );

        let descriptor = reader().read(dir.path()).await.unwrap();
        assert_eq!(
            descriptor,
            DeploymentDescriptor {
                image_name: "myapp".to_string(),
                image_version: "1.0".to_string(),
                application_name: "myapp-svc".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_numeric_versions_keep_their_text() {
        let dir = checkout(Some("name: myapp\nversion: 1.5\n"), Some("name: svc\n"));
        let descriptor = reader().read(dir.path()).await.unwrap();
        assert_eq!(descriptor.image_version, "1.5");

        let dir = checkout(Some("name: myapp\nversion: 3\n"), Some("name: svc\n"));
        let descriptor = reader().read(dir.path()).await.unwrap();
        assert_eq!(descriptor.image_version, "3");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = checkout(Some("name: myapp\nversion: '1.0'\n"), None);

        let err = reader().read(dir.path()).await.unwrap_err();
        match err {
            DescriptorError::Read { path, .. } => {
                assert_eq!(path, dir.path().join("charm/charmcraft.yaml"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_field() {
        let dir = checkout(Some("name: myapp\n"), Some("name: svc\n"));

        let err = reader().read(dir.path()).await.unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField { ref field, .. } if field == "version"));
    }

    #[tokio::test]
    async fn test_null_field_is_missing() {
        let dir = checkout(Some("name: myapp\nversion: '1.0'\n"), Some("name:\n"));

        let err = reader().read(dir.path()).await.unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_non_scalar_field() {
        let dir = checkout(Some("name: [a, b]\nversion: '1.0'\n"), Some("name: svc\n"));

        let err = reader().read(dir.path()).await.unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidField { .. }));
    }

    #[tokio::test]
    async fn test_invalid_yaml() {
        let dir = checkout(Some("name: [unclosed\n"), Some("name: svc\n"));

        let err = reader().read(dir.path()).await.unwrap_err();
        assert!(matches!(err, DescriptorError::Parse { .. }));
    }
}
