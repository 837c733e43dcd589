//! Juju controller backend
//!
//! Drives the `juju` CLI, which must already be logged in to the target
//! controller:
//! - Listing, creating and inspecting models
//! - Reading the applications of a model from `juju status`
//! - Deploying and refreshing applications with local charms

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ControllerBackend, ControllerError, DeployRequest, ModelHandle, RefreshRequest};
use crate::config::Config;
use crate::process::{CommandOutput, describe, run_command};

/// `juju` CLI implementation of [`ControllerBackend`]
#[derive(Debug, Clone)]
pub struct JujuCli {
    juju_bin: String,
    controller: Option<String>,
    timeout: Duration,
}

impl JujuCli {
    pub fn new(config: &Config) -> Self {
        Self {
            juju_bin: config.juju_bin.clone(),
            controller: config.juju_controller.clone(),
            timeout: config.controller_timeout,
        }
    }

    /// Qualifies a model name with the configured controller
    fn model_ref(&self, model: &str) -> String {
        match &self.controller {
            Some(controller) => format!("{}:{}", controller, model),
            None => model.to_string(),
        }
    }

    fn controller_args(&self) -> Vec<String> {
        match &self.controller {
            Some(controller) => vec!["--controller".to_string(), controller.clone()],
            None => Vec::new(),
        }
    }

    /// Runs a juju subcommand, returning the rendered command line and output
    async fn juju(&self, args: &[String]) -> Result<(String, CommandOutput), ControllerError> {
        let mut cmd = Command::new(&self.juju_bin);
        cmd.args(args);
        let command = describe(&cmd);

        let output = run_command(&mut cmd, self.timeout).await?;
        Ok((command, output))
    }

    fn parse<T: DeserializeOwned>(
        command: &str,
        output: &CommandOutput,
    ) -> Result<T, ControllerError> {
        serde_json::from_str(&output.stdout).map_err(|e| ControllerError::InvalidResponse {
            command: command.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ControllerBackend for JujuCli {
    async fn list_models(&self) -> Result<Vec<String>, ControllerError> {
        let mut args = strings(&["models", "--format", "json"]);
        args.extend(self.controller_args());

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            return Err(command_failed(command, &output));
        }

        let response: ModelsResponse = Self::parse(&command, &output)?;
        Ok(response.models.iter().map(ModelEntry::short_name).collect())
    }

    async fn create_model(&self, name: &str) -> Result<(), ControllerError> {
        info!("Creating model {}", name);

        let mut args = strings(&["add-model", name, "--no-switch"]);
        args.extend(self.controller_args());

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            if already_exists(&output) {
                return Err(ControllerError::AlreadyExists(format!("model {}", name)));
            }
            return Err(command_failed(command, &output));
        }

        Ok(())
    }

    async fn connect_model(&self, name: &str) -> Result<ModelHandle, ControllerError> {
        let model_ref = self.model_ref(name);
        let args = strings(&["show-model", &model_ref, "--format", "json"]);

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            if output.combined().contains("not found") {
                return Err(ControllerError::ModelNotFound(name.to_string()));
            }
            return Err(command_failed(command, &output));
        }

        let response: HashMap<String, ModelEntry> = Self::parse(&command, &output)?;
        let entry = response
            .into_values()
            .next()
            .ok_or_else(|| ControllerError::InvalidResponse {
                command: command.clone(),
                reason: "no model in response".to_string(),
            })?;

        debug!("Connected to model {} ({:?})", name, entry.model_uuid);
        Ok(ModelHandle {
            name: name.to_string(),
            uuid: entry.model_uuid,
        })
    }

    async fn list_applications(&self, model: &ModelHandle) -> Result<Vec<String>, ControllerError> {
        let model_ref = self.model_ref(&model.name);
        let args = strings(&["status", "--model", &model_ref, "--format", "json"]);

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            return Err(command_failed(command, &output));
        }

        let response: StatusResponse = Self::parse(&command, &output)?;
        Ok(response.applications.into_keys().collect())
    }

    async fn deploy(
        &self,
        model: &ModelHandle,
        request: &DeployRequest,
    ) -> Result<(), ControllerError> {
        let args = deploy_args(&self.model_ref(&model.name), request);

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            if already_exists(&output) {
                return Err(ControllerError::AlreadyExists(format!(
                    "application {}",
                    request.application
                )));
            }
            return Err(command_failed(command, &output));
        }

        debug!("juju deploy output:\n{}", output.combined());
        Ok(())
    }

    async fn refresh(
        &self,
        model: &ModelHandle,
        request: &RefreshRequest,
    ) -> Result<(), ControllerError> {
        let args = refresh_args(&self.model_ref(&model.name), request);

        let (command, output) = self.juju(&args).await?;
        if !output.success {
            return Err(command_failed(command, &output));
        }

        debug!("juju refresh output:\n{}", output.combined());
        Ok(())
    }
}

/// `juju models --format json`
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    /// Owner-qualified name, e.g. `admin/my-model`
    name: String,
    #[serde(rename = "short-name", default)]
    short_name: Option<String>,
    #[serde(rename = "model-uuid", default)]
    model_uuid: Option<String>,
}

impl ModelEntry {
    fn short_name(&self) -> String {
        match &self.short_name {
            Some(short) => short.clone(),
            None => self
                .name
                .rsplit('/')
                .next()
                .unwrap_or(&self.name)
                .to_string(),
        }
    }
}

/// `juju status --format json`, applications only
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    applications: BTreeMap<String, serde_json::Value>,
}

fn deploy_args(model_ref: &str, request: &DeployRequest) -> Vec<String> {
    let mut args = vec![
        "deploy".to_string(),
        "--model".to_string(),
        model_ref.to_string(),
        request.charm.display().to_string(),
        request.application.clone(),
        "--constraints".to_string(),
        request.constraints.clone(),
    ];
    args.extend(resource_args(&request.resources));
    args
}

fn refresh_args(model_ref: &str, request: &RefreshRequest) -> Vec<String> {
    let mut args = vec![
        "refresh".to_string(),
        "--model".to_string(),
        model_ref.to_string(),
        request.application.clone(),
        "--path".to_string(),
        request.charm.display().to_string(),
    ];
    args.extend(resource_args(&request.resources));
    args
}

fn resource_args(resources: &BTreeMap<String, String>) -> Vec<String> {
    resources
        .iter()
        .flat_map(|(name, value)| ["--resource".to_string(), format!("{}={}", name, value)])
        .collect()
}

fn already_exists(output: &CommandOutput) -> bool {
    output.combined().contains("already exists")
}

fn command_failed(command: String, output: &CommandOutput) -> ControllerError {
    ControllerError::CommandFailed {
        command,
        exit_code: output.exit_code,
        output: output.combined(),
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn output(success: bool, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            success,
            exit_code: if success { 0 } else { 1 },
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn resources() -> BTreeMap<String, String> {
        BTreeMap::from([(
            "flask-app-image".to_string(),
            "localhost:32000/myapp:1.0".to_string(),
        )])
    }

    #[test]
    fn test_parse_models() {
        let stdout = r#"{
            "models": [
                {"name": "admin/controller", "short-name": "controller", "model-uuid": "u1"},
                {"name": "admin/https-example-com-repo-main-1a2b3c4d", "model-uuid": "u2"}
            ],
            "current-model": "controller"
        }"#;

        let response: ModelsResponse = JujuCli::parse("juju models", &output(true, stdout, "")).unwrap();
        let names: Vec<String> = response.models.iter().map(ModelEntry::short_name).collect();
        assert_eq!(
            names,
            vec!["controller", "https-example-com-repo-main-1a2b3c4d"]
        );
    }

    #[test]
    fn test_parse_status_applications() {
        let stdout = r#"{
            "model": {"name": "m"},
            "machines": {},
            "applications": {"myapp-svc": {"charm": "local:myapp-svc-0"}, "db": {}}
        }"#;

        let response: StatusResponse =
            JujuCli::parse("juju status", &output(true, stdout, "")).unwrap();
        let apps: Vec<String> = response.applications.into_keys().collect();
        assert_eq!(apps, vec!["db", "myapp-svc"]);
    }

    #[test]
    fn test_parse_status_without_applications() {
        let response: StatusResponse =
            JujuCli::parse("juju status", &output(true, r#"{"model": {}}"#, "")).unwrap();
        assert!(response.applications.is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = JujuCli::parse::<ModelsResponse>("juju models", &output(true, "not json", ""))
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidResponse { .. }));
    }

    #[test]
    fn test_deploy_args() {
        let request = DeployRequest {
            application: "myapp-svc".to_string(),
            charm: PathBuf::from("/tmp/src/charm/myapp-svc_amd64.charm"),
            resources: resources(),
            constraints: "arch=amd64".to_string(),
        };

        assert_eq!(
            deploy_args("prod:my-model", &request),
            strings(&[
                "deploy",
                "--model",
                "prod:my-model",
                "/tmp/src/charm/myapp-svc_amd64.charm",
                "myapp-svc",
                "--constraints",
                "arch=amd64",
                "--resource",
                "flask-app-image=localhost:32000/myapp:1.0",
            ])
        );
    }

    #[test]
    fn test_refresh_args() {
        let request = RefreshRequest {
            application: "myapp-svc".to_string(),
            charm: PathBuf::from("/tmp/src/charm/myapp-svc_amd64.charm"),
            resources: resources(),
        };

        assert_eq!(
            refresh_args("my-model", &request),
            strings(&[
                "refresh",
                "--model",
                "my-model",
                "myapp-svc",
                "--path",
                "/tmp/src/charm/myapp-svc_amd64.charm",
                "--resource",
                "flask-app-image=localhost:32000/myapp:1.0",
            ])
        );
    }

    #[test]
    fn test_model_ref_with_controller() {
        let juju = JujuCli::new(&Config {
            juju_controller: Some("microk8s".to_string()),
            ..Config::default()
        });
        assert_eq!(juju.model_ref("m"), "microk8s:m");
        assert_eq!(juju.controller_args(), strings(&["--controller", "microk8s"]));

        let juju = JujuCli::new(&Config::default());
        assert_eq!(juju.model_ref("m"), "m");
        assert!(juju.controller_args().is_empty());
    }

    #[test]
    fn test_already_exists_detection() {
        let out = output(
            false,
            "",
            "ERROR failed to create new model: model \"m\" for admin already exists (already exists)\n",
        );
        assert!(already_exists(&out));
        assert!(!already_exists(&output(false, "", "ERROR connection refused\n")));
    }

    #[tokio::test]
    async fn test_missing_juju_binary() {
        let juju = JujuCli::new(&Config {
            juju_bin: "/nonexistent/juju".to_string(),
            ..Config::default()
        });

        let err = juju.list_models().await.unwrap_err();
        assert!(matches!(err, ControllerError::Process(_)));
    }

    #[tokio::test]
    async fn test_failed_command_reports_output() {
        // `false` ignores its arguments and exits 1
        let juju = JujuCli::new(&Config {
            juju_bin: "false".to_string(),
            ..Config::default()
        });

        let err = juju.create_model("m").await.unwrap_err();
        match err {
            ControllerError::CommandFailed { command, exit_code, .. } => {
                assert_eq!(command, "false add-model m --no-switch");
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
