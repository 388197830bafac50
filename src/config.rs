use anyhow::{Context, Result};
use notedeck_codec::Placement;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "notedeck.json";

/// Top-level notedeck.json schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotedeckConfig {
    /// Asset root, relative to the data directory.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Trash directory, relative to the data directory.
    #[serde(default = "default_trash_dir")]
    pub trash_dir: String,

    /// Where `attach` puts new blocks relative to the last block.
    #[serde(default)]
    pub placement: Placement,
}

impl Default for NotedeckConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            trash_dir: default_trash_dir(),
            placement: Placement::default(),
        }
    }
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_trash_dir() -> String {
    ".trash".to_string()
}

/// Load config from `<data_dir>/notedeck.json`, or return defaults if missing.
pub fn load_config(data_dir: &Path) -> Result<NotedeckConfig> {
    let config_path = data_dir.join(CONFIG_FILE);

    if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: NotedeckConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        Ok(NotedeckConfig::default())
    }
}

/// Data directory precedence: `--data-dir`, then `NOTEDECK_DATA` (clap fills
/// both into the same flag), then `./data`.
pub fn resolve_data_dir(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "assetsDir": "media",
            "trashDir": "bin",
            "placement": "before"
        }"#;

        let config: NotedeckConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.assets_dir, "media");
        assert_eq!(config.trash_dir, "bin");
        assert_eq!(config.placement, Placement::Before);
    }

    #[test]
    fn test_defaults() {
        let config: NotedeckConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.assets_dir, "assets");
        assert_eq!(config.trash_dir, ".trash");
        assert_eq!(config.placement, Placement::ReplaceIfEmpty);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.assets_dir, "assets");
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_data_dir_fallback() {
        assert_eq!(resolve_data_dir(None), PathBuf::from("data"));
        assert_eq!(resolve_data_dir(Some(Path::new("/x"))), PathBuf::from("/x"));
    }
}
