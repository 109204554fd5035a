use std::path::{Path, PathBuf};

use super::types::{AppConfig, ModelConfig};

/// Get the default loadpilot data directory: ~/.loadpilot
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".loadpilot"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.loadpilot/config.toml
    let user_config = get_data_dir()?.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let cfg = if user_config.exists() {
        load_from_path(&user_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    Ok(apply_env_overrides(cfg, |key| std::env::var(key).ok()))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority). Blank values are ignored.
pub fn apply_env_overrides<F>(mut cfg: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let ModelConfig::Gemini(ref mut gemini) = cfg.model;
    if let Some(v) = get("LOADPILOT_GEMINI_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
        gemini.api_key = v;
    }
    if let Some(v) = get("LOADPILOT_STORE_ROOT") {
        cfg.store.root = v;
    }
    if let Some(v) = get("LOADPILOT_JMETER_IMAGE") {
        cfg.sandbox.image = v;
    }
    if let Some(v) = get("LOADPILOT_DOCKER_BIN") {
        cfg.sandbox.docker_bin = v;
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "fallback"),
            ("LOADPILOT_GEMINI_API_KEY", "primary"),
            ("LOADPILOT_STORE_ROOT", "   "),
            ("LOADPILOT_JMETER_IMAGE", "jmeter:5.6.3-ci"),
        ]);
        let cfg = apply_env_overrides(AppConfig::default(), |k| {
            env.get(k).map(|v| v.to_string())
        });

        let ModelConfig::Gemini(gemini) = &cfg.model;
        assert_eq!(gemini.api_key, "primary");
        assert_eq!(cfg.store.root, "~/.loadpilot/store");
        assert_eq!(cfg.sandbox.image, "jmeter:5.6.3-ci");
    }

    #[test]
    fn gemini_key_falls_back_to_plain_variable() {
        let cfg = apply_env_overrides(AppConfig::default(), |k| {
            (k == "GEMINI_API_KEY").then(|| "fallback".to_string())
        });
        let ModelConfig::Gemini(gemini) = &cfg.model;
        assert_eq!(gemini.api_key, "fallback");
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sandbox\nimage = 1").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
