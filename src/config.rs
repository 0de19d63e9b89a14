use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::hook::{RedirectionRequest, DEFAULT_BAIT_NAME};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// driver substitution inputs
    pub hook: Option<HookConfig>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct HookConfig {
    pub temp_lib_dir: Option<String>,
    pub hook_lib_dir: Option<String>,
    pub custom_driver_dir: Option<String>,
    pub driver_file_name: Option<String>,
    pub bait_name: Option<String>,          // defaults to libvulkan_freedreno.so
    pub file_redirect_dir: Option<String>,
    pub primitive_library: Option<String>,  // None: look in the process image
}

impl HookConfig {
    /// Borrow the merged, validated settings as a request
    pub fn request(&self) -> Result<RedirectionRequest<'_>, ConfigError> {
        let required = |name: &str, v: &Option<String>| -> Result<(), ConfigError> {
            match v.as_deref() {
                Some(s) if !s.is_empty() => Ok(()),
                _ => Err(ConfigError::Validation(format!("hook.{name} is required"))),
            }
        };
        required("temp_lib_dir", &self.temp_lib_dir)?;
        required("hook_lib_dir", &self.hook_lib_dir)?;
        required("custom_driver_dir", &self.custom_driver_dir)?;
        required("driver_file_name", &self.driver_file_name)?;

        fn field(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or_default()
        }

        Ok(RedirectionRequest::new(
            field(&self.temp_lib_dir),
            field(&self.hook_lib_dir),
            field(&self.custom_driver_dir),
            field(&self.driver_file_name),
        )
        .with_bait_name(self.bait_name.as_deref().unwrap_or(DEFAULT_BAIT_NAME))
        .with_file_redirect_dir(self.file_redirect_dir.as_deref()))
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "vkredirect", about = "Redirect the Vulkan driver load to a custom driver", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// writable staging directory for patched libraries
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub temp_lib_dir: Option<String>,
    /// directory holding the bait and hook libraries
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub hook_lib_dir: Option<String>,
    /// directory holding the replacement driver
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub custom_driver_dir: Option<String>,
    #[arg(long)]
    pub driver_file_name: Option<String>,
    #[arg(long)]
    pub bait_name: Option<String>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub file_redirect_dir: Option<String>,
    /// shared library exporting adrenotools_open_libvulkan
    #[arg(long)]
    pub primitive_library: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and `cli`, then validate.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/vkredirect/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/vkredirect/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/vkredirect.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["vkredirect.yaml", "config/vkredirect.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    // hook
    match (&mut dst.hook, src.hook) {
        (None, Some(c)) => dst.hook = Some(c),
        (Some(d), Some(s)) => merge_hook(d, s),
        _ => {}
    }
}

fn merge_hook(dst: &mut HookConfig, src: HookConfig) {
    if src.temp_lib_dir.is_some()       { dst.temp_lib_dir = src.temp_lib_dir; }
    if src.hook_lib_dir.is_some()       { dst.hook_lib_dir = src.hook_lib_dir; }
    if src.custom_driver_dir.is_some()  { dst.custom_driver_dir = src.custom_driver_dir; }
    if src.driver_file_name.is_some()   { dst.driver_file_name = src.driver_file_name; }
    if src.bait_name.is_some()          { dst.bait_name = src.bait_name; }
    if src.file_redirect_dir.is_some()  { dst.file_redirect_dir = src.file_redirect_dir; }
    if src.primitive_library.is_some()  { dst.primitive_library = src.primitive_library; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    let overrides = HookConfig {
        temp_lib_dir: cli.temp_lib_dir.clone(),
        hook_lib_dir: cli.hook_lib_dir.clone(),
        custom_driver_dir: cli.custom_driver_dir.clone(),
        driver_file_name: cli.driver_file_name.clone(),
        bait_name: cli.bait_name.clone(),
        file_redirect_dir: cli.file_redirect_dir.clone(),
        primitive_library: cli.primitive_library.clone(),
    };
    merge_hook(cfg.hook.get_or_insert_with(HookConfig::default), overrides);
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(level) = cfg.log_level.as_deref() {
        match level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(ConfigError::Validation(format!(
                "log_level must be off|error|warn|info|debug|trace, got {level}"
            ))),
        }
    }
    let hook = cfg.hook.as_ref()
        .ok_or_else(|| ConfigError::Validation("hook section is required".into()))?;
    hook.request()?;
    if let Some(lib) = hook.primitive_library.as_deref() {
        if lib.is_empty() {
            return Err(ConfigError::Validation("hook.primitive_library must not be empty".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = r#"
log_level: debug
hook:
  temp_lib_dir: /data/tmp
  hook_lib_dir: /data/app/lib
  custom_driver_dir: /data/drivers/turnip
  driver_file_name: libturnip.so
"#;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("vkredirect.yaml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_yaml_only() {
        let dir = TempDir::new().unwrap();
        let cli = Cli { config: Some(write_config(&dir, YAML)), ..Cli::default() };

        let cfg = load_from(&cli).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));

        let hook = cfg.hook.unwrap();
        let req = hook.request().unwrap();
        assert_eq!(req.driver_file_name, "libturnip.so");
        assert_eq!(req.bait_name, DEFAULT_BAIT_NAME);
        assert!(req.file_redirect_dir.is_none());
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let dir = TempDir::new().unwrap();
        let cli = Cli {
            config: Some(write_config(&dir, YAML)),
            custom_driver_dir: Some("/sdcard/drivers/v24".into()),
            bait_name: Some("libvulkan_adreno.so".into()),
            ..Cli::default()
        };

        let cfg = load_from(&cli).unwrap();
        let hook = cfg.hook.unwrap();
        assert_eq!(hook.custom_driver_dir.as_deref(), Some("/sdcard/drivers/v24"));
        assert_eq!(hook.hook_lib_dir.as_deref(), Some("/data/app/lib"));
        assert_eq!(hook.request().unwrap().bait_name, "libvulkan_adreno.so");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli { config: Some(PathBuf::from("/nonexistent/vkredirect.yaml")), ..Cli::default() };
        assert!(matches!(load_from(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let mut hook = HookConfig {
            temp_lib_dir: Some("/data/tmp".into()),
            hook_lib_dir: Some("/data/app/lib".into()),
            custom_driver_dir: Some("/data/drivers/turnip".into()),
            driver_file_name: None,
            ..HookConfig::default()
        };
        let err = hook.request().unwrap_err();
        assert!(err.to_string().contains("hook.driver_file_name"));

        hook.driver_file_name = Some(String::new());
        assert!(hook.request().is_err());
    }

    #[test]
    fn test_bad_log_level() {
        let dir = TempDir::new().unwrap();
        let cli = Cli {
            config: Some(write_config(&dir, YAML)),
            log_level: Some("chatty".into()),
            ..Cli::default()
        };
        assert!(matches!(load_from(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bad_yaml() {
        let dir = TempDir::new().unwrap();
        let cli = Cli { config: Some(write_config(&dir, "hook: [unterminated")), ..Cli::default() };
        assert!(matches!(load_from(&cli), Err(ConfigError::Yaml(_))));
    }
}
