//! Placement architecture
//!
//! Maps the host processor identifier onto the architecture tag used in
//! placement constraints. There is no fallback: an identifier missing from
//! the table is a configuration error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors detected before any remote mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The host processor has no entry in the architecture table
    #[error("unsupported processor architecture '{0}'")]
    UnsupportedArchitecture(String),
}

/// Architecture tags accepted in placement constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
    Ppc64el,
    S390x,
    Riscv64,
}

impl Architecture {
    /// Looks up a processor identifier (as reported by the host) in the table
    pub fn from_processor(processor: &str) -> Result<Self, ConfigError> {
        match processor.trim().to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Architecture::Amd64),
            "aarch64" | "arm64" => Ok(Architecture::Arm64),
            "ppc64le" | "ppc64el" => Ok(Architecture::Ppc64el),
            "s390x" => Ok(Architecture::S390x),
            "riscv64" => Ok(Architecture::Riscv64),
            _ => Err(ConfigError::UnsupportedArchitecture(processor.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
            Architecture::Ppc64el => "ppc64el",
            Architecture::S390x => "s390x",
            Architecture::Riscv64 => "riscv64",
        }
    }

    /// Renders the placement constraint, e.g. `arch=amd64`
    pub fn constraint(&self) -> String {
        format!("arch={}", self.as_str())
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
