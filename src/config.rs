use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::framework::Framework;

/// Environment variable overriding the default output directory.
pub const WORKDIR_ENV: &str = "CNVRG_WORKDIR";
pub const DEFAULT_WORKDIR: &str = "/cnvrg";

/// Config file looked up next to the executable when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "yolokit.yaml";

/// Output directory used when a tool is not given `--output_dir`.
pub fn default_output_dir() -> PathBuf {
    std::env::var_os(WORKDIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKDIR))
}

/// `yolokit.yaml` beside the running executable, or in the current directory
/// if the executable path is unknown.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Process-wide settings, loaded once at startup and passed to every tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub framework: Framework,
    #[serde(default)]
    pub prepare: PrepareConfig,
    pub finetune: Option<FinetuneConfig>,
    pub batch_predict: Option<BatchPredictConfig>,
    pub inference: Option<InferenceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Directory created under the output directory for the split dataset.
    pub dataset_dir_name: String,
    /// File name of the generated dataset description.
    pub dataset_config_name: String,
    /// Where the training framework will see the dataset. Defaults to the
    /// directory it is written to.
    pub dataset_root: Option<PathBuf>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            dataset_dir_name: "dataset".to_string(),
            dataset_config_name: "dataset.yaml".to_string(),
            dataset_root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinetuneConfig {
    pub images_loc: PathBuf,
    pub labels_loc: PathBuf,
    pub config_loc: PathBuf,
    pub move_dest: PathBuf,
    /// Dataset config path as seen by the framework after the move.
    pub config_loc_new: PathBuf,
    pub project_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchPredictConfig {
    pub model_loc: PathBuf,
    pub project_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub trained_model_path: PathBuf,
    pub standalone_model_name: String,
    pub test_file_name: String,
    #[serde(default = "InferenceConfig::default_library_dir")]
    pub library_dir: PathBuf,
    #[serde(default = "InferenceConfig::default_dev_library_dir")]
    pub dev_library_dir: PathBuf,
    /// Where uploaded media is written. Defaults to the system temp dir.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl InferenceConfig {
    fn default_library_dir() -> PathBuf {
        PathBuf::from("/cnvrg_libraries/gse-inference")
    }

    fn default_dev_library_dir() -> PathBuf {
        PathBuf::from("/cnvrg_libraries/dev-gse-inference")
    }

    /// The production library directory if it exists, otherwise the
    /// development one.
    pub fn resolve_library_dir(&self) -> &Path {
        if self.library_dir.exists() {
            &self.library_dir
        } else {
            &self.dev_library_dir
        }
    }

    /// The trained model when one has been produced, otherwise the standalone
    /// model shipped in the library directory.
    pub fn resolve_model_path(&self) -> PathBuf {
        let standalone = self.resolve_library_dir().join(&self.standalone_model_name);
        find_model(&self.trained_model_path, &standalone)
    }

    pub fn resolve_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Prefer `trained` when it exists on disk.
pub fn find_model(trained: &Path, standalone: &Path) -> PathBuf {
    if trained.exists() {
        trained.to_path_buf()
    } else {
        standalone.to_path_buf()
    }
}

impl ToolConfig {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_yaml_str(&yaml)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load `explicit` if given. Otherwise load the default file, falling back
    /// to built-in defaults when it does not exist.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = default_config_path();
        if path.is_file() {
            Self::load(&path)
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn finetune(&self) -> anyhow::Result<&FinetuneConfig> {
        self.finetune
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Config is missing the `finetune` section"))
    }

    pub fn batch_predict(&self) -> anyhow::Result<&BatchPredictConfig> {
        self.batch_predict
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Config is missing the `batch_predict` section"))
    }

    pub fn inference(&self) -> anyhow::Result<&InferenceConfig> {
        self.inference
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Config is missing the `inference` section"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_when_absent() -> anyhow::Result<()> {
        let config = ToolConfig::from_yaml_str("framework:\n  python: python3\n")?;
        assert_eq!(config.framework.python, "python3");
        assert_eq!(config.prepare.dataset_config_name, "dataset.yaml");
        assert!(config.finetune().is_err());
        Ok(())
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let yaml = "batch_predict:\n  project_name: runs\n";
        assert!(ToolConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn trained_model_wins_when_present() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let trained = dir.path().join("best.pt");
        let standalone = dir.path().join("yolov5s.pt");
        assert_eq!(find_model(&trained, &standalone), standalone);

        fs::write(&trained, b"weights")?;
        assert_eq!(find_model(&trained, &standalone), trained);
        Ok(())
    }
}
