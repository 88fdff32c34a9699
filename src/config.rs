use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::CoreError;
use crate::llm::GenerationConfig;
use crate::rag::ChunkerConfig;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        let log_dir = user_data_dir.join("logs");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("LANTERN_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("lantern.toml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("LANTERN_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Lantern");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Lantern");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("lantern")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Retrieval tunables for the chat loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Maximum number of chunks injected into a prompt.
    pub top_k: usize,
    /// Chunks scoring at or below this are dropped.
    pub min_score: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.1,
        }
    }
}

/// User settings, read from `lantern.toml`. Every field has a default, so an
/// absent file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the GGUF model file.
    pub model_path: Option<PathBuf>,
    /// Explicit path to the inference executable; otherwise resolved from
    /// `bin/` and PATH.
    pub executable: Option<PathBuf>,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkerConfig,
}

impl Settings {
    /// Load settings from the first existing candidate path:
    /// `LANTERN_CONFIG_PATH`, then the user data dir, then the project root.
    pub fn load(paths: &AppPaths) -> Result<Self, CoreError> {
        let path = match Self::config_path(paths) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        let raw = fs::read_to_string(&path)?;
        toml::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
    }

    fn config_path(paths: &AppPaths) -> Option<PathBuf> {
        if let Ok(path) = env::var("LANTERN_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        let candidates = [
            paths.user_data_dir.join("lantern.toml"),
            paths.project_root.join("lantern.toml"),
        ];
        candidates.into_iter().find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_with_partial_file() {
        let settings: Settings = toml::from_str(
            r#"
            model_path = "/models/qwen2.5-3b-instruct-q4_k_m.gguf"

            [generation]
            temperature = 0.2

            [retrieval]
            top_k = 2
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.model_path.as_deref(),
            Some(Path::new("/models/qwen2.5-3b-instruct-q4_k_m.gguf"))
        );
        assert_eq!(settings.generation.temperature, 0.2);
        // Untouched sections keep their defaults.
        assert_eq!(settings.retrieval.top_k, 2);
        assert_eq!(settings.retrieval.min_score, 0.1);
        assert_eq!(settings.chunking.chunk_size, 500);
    }

    #[test]
    fn empty_settings_are_valid() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.model_path.is_none());
        assert_eq!(settings.generation.max_tokens, 512);
    }
}
