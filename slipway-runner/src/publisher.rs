//! Registry publisher
//!
//! Copies the built image archive into the container registry with skopeo.

use slipway_core::domain::DeploymentDescriptor;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::process::{ProcessError, describe, run_command};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to publish {reference}: `{command}` exited with code {exit_code}:\n{output}")]
    CopyFailed {
        reference: String,
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("failed to publish {reference}: {source}")]
    Process {
        reference: String,
        #[source]
        source: ProcessError,
    },
}

/// Publishes image archives to the configured registry
#[derive(Debug, Clone)]
pub struct RegistryPublisher {
    skopeo_bin: String,
    registry_host: String,
    timeout: Duration,
}

impl RegistryPublisher {
    pub fn new(config: &Config) -> Self {
        Self {
            skopeo_bin: config.skopeo_bin.clone(),
            registry_host: config.registry_host.clone(),
            timeout: config.publish_timeout,
        }
    }

    /// Fully qualified reference the image is published under
    pub fn image_reference(&self, descriptor: &DeploymentDescriptor) -> String {
        format!(
            "{}/{}:{}",
            self.registry_host, descriptor.image_name, descriptor.image_version
        )
    }

    /// Copies the archive into the registry and returns its reference
    ///
    /// TLS verification is disabled for the destination: the registry is the
    /// node-local one.
    pub async fn publish(
        &self,
        archive: &Path,
        descriptor: &DeploymentDescriptor,
    ) -> Result<String, PublishError> {
        let reference = self.image_reference(descriptor);
        info!("Publishing {} as {}", archive.display(), reference);

        let mut cmd = Command::new(&self.skopeo_bin);
        cmd.arg("--insecure-policy")
            .arg("copy")
            .arg("--dest-tls-verify=false")
            .arg(format!("oci-archive:{}", archive.display()))
            .arg(format!("docker://{}", reference));
        let command = describe(&cmd);

        let output = run_command(&mut cmd, self.timeout)
            .await
            .map_err(|source| PublishError::Process {
                reference: reference.clone(),
                source,
            })?;

        if !output.success {
            return Err(PublishError::CopyFailed {
                reference,
                command,
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        debug!("skopeo output:\n{}", output.combined());
        info!("Published {}", reference);
        Ok(reference)
    }
}
