use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG: &str = ".tally/config.toml";
pub const DEFAULT_STORE: &str = ".tally/store.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    /// Ask before trashing a task.
    #[serde(default = "default_true")]
    pub confirm_trash: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            confirm_trash: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
    /// Store file, resolved against the project root.
    pub store_path: PathBuf,
}

/// Load `.tally/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    read_toml_or_default(&project_root.join(PROJECT_CONFIG))
}

/// Load `<config_dir>/tally/config.toml`, or defaults when absent.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    match dirs::config_dir() {
        Some(config_dir) => read_toml_or_default(&config_dir.join("tally/config.toml")),
        None => Ok(UserConfig::default()),
    }
}

fn read_toml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Merge project config, user config and environment.
///
/// # Errors
///
/// Propagates config load failures.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());
    let store_path = resolve_store_path(project_root, &project.store.path);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
        store_path,
    })
}

impl EffectiveConfig {
    /// First of: `--user`, `TALLY_USER`, project session, user config.
    #[must_use]
    pub fn user_id(&self, cli_user: Option<&str>) -> Option<String> {
        let env_user = env::var("TALLY_USER").ok();
        resolve_user_id(
            cli_user,
            env_user.as_deref(),
            self.project.session.user_id.as_deref(),
            self.user.user_id.as_deref(),
        )
    }
}

fn resolve_user_id(
    cli: Option<&str>,
    env: Option<&str>,
    project: Option<&str>,
    user: Option<&str>,
) -> Option<String> {
    [cli, env, project, user]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
}

fn resolve_store_path(project_root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        project_root.join(configured)
    }
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.path, PathBuf::from(DEFAULT_STORE));
        assert!(cfg.session.confirm_trash);
        assert!(cfg.session.user_id.is_none());
    }

    #[test]
    fn project_config_overrides_fields() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".tally")).expect("create .tally");
        std::fs::write(
            root.path().join(PROJECT_CONFIG),
            "[store]\npath = \"data/reports.json\"\n\n[session]\nuser_id = \"u42\"\nconfirm_trash = false\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.path, PathBuf::from("data/reports.json"));
        assert_eq!(cfg.session.user_id.as_deref(), Some("u42"));
        assert!(!cfg.session.confirm_trash);
        assert_eq!(
            resolve_store_path(root.path(), &cfg.store.path),
            root.path().join("data/reports.json")
        );
    }

    #[test]
    fn malformed_project_config_names_the_file() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".tally")).expect("create .tally");
        std::fs::write(root.path().join(PROJECT_CONFIG), "[store\npath=").expect("write");
        let err = load_project_config(root.path()).unwrap_err();
        assert!(format!("{err}").starts_with("parsing "));
        assert!(format!("{err}").ends_with("config.toml"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        assert_eq!(resolve_output(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table")), "text");
        assert_eq!(resolve_output(false, Some("table"), Some("bogus")), "text");
    }

    #[test]
    fn user_id_precedence() {
        assert_eq!(
            resolve_user_id(Some("cli"), Some("env"), Some("proj"), Some("user")).as_deref(),
            Some("cli")
        );
        assert_eq!(
            resolve_user_id(None, Some(" "), Some("proj"), Some("user")).as_deref(),
            Some("proj")
        );
        assert_eq!(resolve_user_id(None, None, None, Some("user")).as_deref(), Some("user"));
        assert_eq!(resolve_user_id(None, None, None, None), None);
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let abs = std::env::temp_dir().join("tally-store.json");
        assert_eq!(resolve_store_path(Path::new("/work"), &abs), abs);
    }
}
