//! Runner configuration
//!
//! Defines the build commands, tool locations, registry and controller
//! settings and timeouts used by every pipeline run.

use std::path::PathBuf;
use std::time::Duration;

use crate::queue::DEFAULT_RETAINED_RUNS;

/// Pipeline configuration
///
/// Defaults match a single-node setup with a local registry on
/// `localhost:32000` and the `juju` CLI logged in to a controller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry host (and port) images are published to
    pub registry_host: String,

    /// Shell command building the image archive, run in the checkout root
    pub rock_build_command: String,

    /// Shell command building the charm, run in `charm_dir`
    pub charm_build_command: String,

    /// Charm subdirectory of the checkout
    pub charm_dir: PathBuf,

    /// Image descriptor file, relative to the checkout root
    pub rock_descriptor: PathBuf,

    /// Charm descriptor file, relative to `charm_dir`
    pub charm_descriptor: PathBuf,

    /// Charm resource the published image is attached to
    pub image_resource_name: String,

    pub skopeo_bin: String,
    pub juju_bin: String,
    pub git_bin: String,

    /// Controller to target, or the CLI's current controller when unset
    pub juju_controller: Option<String>,

    /// Processor identifier override; the host architecture is used when unset
    pub host_arch: Option<String>,

    /// Directory checkouts are created in; the system temp dir when unset
    pub workspace_base: Option<PathBuf>,

    pub clone_timeout: Duration,
    pub build_timeout: Duration,
    pub publish_timeout: Duration,
    pub controller_timeout: Duration,

    /// Max pipeline runs executing at the same time
    pub max_parallel_runs: usize,

    /// Runs kept for status queries before the oldest finished ones are dropped
    pub max_retained_runs: usize,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - REGISTRY_HOST (default: localhost:32000)
    /// - ROCK_BUILD_COMMAND / CHARM_BUILD_COMMAND
    /// - CHARM_DIR (default: charm)
    /// - ROCK_DESCRIPTOR / CHARM_DESCRIPTOR (default: rockcraft.yaml / charmcraft.yaml)
    /// - IMAGE_RESOURCE_NAME (default: flask-app-image)
    /// - SKOPEO_BIN / JUJU_BIN / GIT_BIN
    /// - JUJU_CONTROLLER, SLIPWAY_HOST_ARCH, WORKSPACE_BASE
    /// - CLONE_TIMEOUT / BUILD_TIMEOUT / PUBLISH_TIMEOUT / CONTROLLER_TIMEOUT (seconds)
    /// - MAX_PARALLEL_RUNS (default: 2)
    /// - MAX_RETAINED_RUNS (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            registry_host: env_or("REGISTRY_HOST", defaults.registry_host),
            rock_build_command: env_or("ROCK_BUILD_COMMAND", defaults.rock_build_command),
            charm_build_command: env_or("CHARM_BUILD_COMMAND", defaults.charm_build_command),
            charm_dir: env_or("CHARM_DIR", defaults.charm_dir),
            rock_descriptor: env_or("ROCK_DESCRIPTOR", defaults.rock_descriptor),
            charm_descriptor: env_or("CHARM_DESCRIPTOR", defaults.charm_descriptor),
            image_resource_name: env_or("IMAGE_RESOURCE_NAME", defaults.image_resource_name),
            skopeo_bin: env_or("SKOPEO_BIN", defaults.skopeo_bin),
            juju_bin: env_or("JUJU_BIN", defaults.juju_bin),
            git_bin: env_or("GIT_BIN", defaults.git_bin),
            juju_controller: env_opt("JUJU_CONTROLLER"),
            host_arch: env_opt("SLIPWAY_HOST_ARCH"),
            workspace_base: env_opt("WORKSPACE_BASE").map(PathBuf::from),
            clone_timeout: env_secs("CLONE_TIMEOUT", defaults.clone_timeout),
            build_timeout: env_secs("BUILD_TIMEOUT", defaults.build_timeout),
            publish_timeout: env_secs("PUBLISH_TIMEOUT", defaults.publish_timeout),
            controller_timeout: env_secs("CONTROLLER_TIMEOUT", defaults.controller_timeout),
            max_parallel_runs: env_count("MAX_PARALLEL_RUNS", defaults.max_parallel_runs),
            max_retained_runs: env_count("MAX_RETAINED_RUNS", defaults.max_retained_runs),
        }
    }

    /// Processor identifier the placement constraint is derived from
    pub fn processor(&self) -> String {
        self.host_arch
            .clone()
            .unwrap_or_else(|| std::env::consts::ARCH.to_string())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("registry_host", &self.registry_host),
            ("rock_build_command", &self.rock_build_command),
            ("charm_build_command", &self.charm_build_command),
            ("image_resource_name", &self.image_resource_name),
            ("skopeo_bin", &self.skopeo_bin),
            ("juju_bin", &self.juju_bin),
            ("git_bin", &self.git_bin),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", name));
            }
        }

        if self.registry_host.contains("://") {
            return Err("registry_host must be a host[:port] without a scheme".to_string());
        }

        let timeouts = [
            ("clone_timeout", self.clone_timeout),
            ("build_timeout", self.build_timeout),
            ("publish_timeout", self.publish_timeout),
            ("controller_timeout", self.controller_timeout),
        ];
        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(format!("{} must be greater than 0", name));
            }
        }

        if self.max_parallel_runs == 0 {
            return Err("max_parallel_runs must be greater than 0".to_string());
        }

        if self.max_retained_runs == 0 {
            return Err("max_retained_runs must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_host: "localhost:32000".to_string(),
            rock_build_command: "rockcraft clean && rockcraft pack".to_string(),
            charm_build_command: "charmcraft clean && charmcraft pack".to_string(),
            charm_dir: PathBuf::from("charm"),
            rock_descriptor: PathBuf::from("rockcraft.yaml"),
            charm_descriptor: PathBuf::from("charmcraft.yaml"),
            image_resource_name: "flask-app-image".to_string(),
            skopeo_bin: "skopeo".to_string(),
            juju_bin: "juju".to_string(),
            git_bin: "git".to_string(),
            juju_controller: None,
            host_arch: None,
            workspace_base: None,
            clone_timeout: Duration::from_secs(600),
            build_timeout: Duration::from_secs(3600),
            publish_timeout: Duration::from_secs(600),
            controller_timeout: Duration::from_secs(600),
            max_parallel_runs: 2,
            max_retained_runs: DEFAULT_RETAINED_RUNS,
        }
    }
}

fn env_or<T: From<String>>(key: &str, default: T) -> T {
    env_opt(key).map(T::from).unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_count(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry_host, "localhost:32000");
        assert_eq!(config.charm_dir, PathBuf::from("charm"));
        assert_eq!(config.image_resource_name, "flask-app-image");
        assert_eq!(config.max_parallel_runs, 2);
        assert_eq!(config.max_retained_runs, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.registry_host = String::new();
        assert!(config.validate().is_err());

        config.registry_host = "https://registry.local".to_string();
        assert!(config.validate().is_err());

        config.registry_host = "registry.local:5000".to_string();
        assert!(config.validate().is_ok());

        config.build_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.build_timeout = Duration::from_secs(1);

        config.max_parallel_runs = 0;
        assert!(config.validate().is_err());
        config.max_parallel_runs = 1;

        config.max_retained_runs = 0;
        assert!(config.validate().is_err());
        config.max_retained_runs = 10;

        config.charm_build_command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_processor_override() {
        let config = Config {
            host_arch: Some("aarch64".to_string()),
            ..Config::default()
        };
        assert_eq!(config.processor(), "aarch64");

        let config = Config::default();
        assert_eq!(config.processor(), std::env::consts::ARCH);
    }
}
