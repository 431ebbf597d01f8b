use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::ConfigFile};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "inference-gateway.toml",
    "inference-gateway.yaml",
    "inference-gateway.yml",
    "inference-gateway.json",
];

/// Load config from the given path (any supported format), with
/// `${ENV_VAR}` substitution applied before parsing.
pub fn load_config(path: &Path) -> anyhow::Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./inference-gateway.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/inference-gateway/inference-gateway.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ConfigFile::default()` if no config file is found.
pub fn discover_and_load() -> ConfigFile {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ConfigFile::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "inference-gateway") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "inference-gateway").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ConfigFile> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn loads_minimal_toml() {
        let mut f = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            f,
            r#"
            [InferenceGateway]

            [InferenceGateway.Providers.openai]
            Key = "openai"
            Kind = "openai"
            SecretRef = "OPENAI_API_KEY"
            "#
        )
        .unwrap();
        let cfg = load_config(f.path()).unwrap();
        assert!(cfg.inference_gateway.providers.contains_key("openai"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_config(Path::new("/nonexistent/inference-gateway.toml"));
        assert!(result.is_err());
    }
}
