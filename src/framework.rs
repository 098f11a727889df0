use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::FinetuneConfig;
use crate::error::ToolError;

const TRAIN_SCRIPT: &str = "train.py";
const DETECT_SCRIPT: &str = "detect.py";

/// Location of the external detection framework and the interpreter that
/// runs it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Framework {
    pub python: String,
    /// Framework checkout; scripts run with this as working directory.
    pub yolo_dir: PathBuf,
}

impl Default for Framework {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            yolo_dir: PathBuf::from("."),
        }
    }
}

/// Arguments of the framework's training entry point.
#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub weights: String,
    pub img_size: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub data: PathBuf,
    pub project: PathBuf,
}

impl TrainArgs {
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "--weights".into(),
            self.weights.clone().into(),
            "--img".into(),
            self.img_size.to_string().into(),
            "--batch".into(),
            self.batch_size.to_string().into(),
            "--epochs".into(),
            self.epochs.to_string().into(),
            "--data".into(),
            self.data.clone().into(),
            "--project".into(),
            self.project.clone().into(),
        ]
    }
}

/// Arguments of the framework's detection entry point. Label and confidence
/// files are always saved.
#[derive(Debug, Clone)]
pub struct DetectArgs {
    pub weights: PathBuf,
    pub source: PathBuf,
    pub project: Option<PathBuf>,
    pub conf_threshold: Option<f64>,
    pub hide_conf: bool,
    /// File the per-file detection summary is written to as JSON.
    pub result_json: Option<PathBuf>,
}

impl DetectArgs {
    pub fn new<P: Into<PathBuf>, S: Into<PathBuf>>(weights: P, source: S) -> Self {
        Self {
            weights: weights.into(),
            source: source.into(),
            project: None,
            conf_threshold: None,
            hide_conf: false,
            result_json: None,
        }
    }

    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--weights".into(),
            self.weights.clone().into(),
            "--source".into(),
            self.source.clone().into(),
        ];
        if let Some(project) = &self.project {
            args.push("--project".into());
            args.push(project.clone().into());
        }
        if let Some(conf) = self.conf_threshold {
            args.push("--conf-thres".into());
            args.push(conf.to_string().into());
        }
        args.push("--save-txt".into());
        args.push("--save-conf".into());
        if self.hide_conf {
            args.push("--hide-conf".into());
        }
        if let Some(result_json) = &self.result_json {
            args.push("--result-json".into());
            args.push(result_json.clone().into());
        }
        args
    }
}

impl Framework {
    fn script_command(&self, script: &str, args: Vec<OsString>) -> Command {
        let mut command = Command::new(&self.python);
        command.arg(script).args(args).current_dir(&self.yolo_dir);
        command
    }

    pub fn train_command(&self, args: &TrainArgs) -> Command {
        self.script_command(TRAIN_SCRIPT, args.to_args())
    }

    pub fn detect_command(&self, args: &DetectArgs) -> Command {
        self.script_command(DETECT_SCRIPT, args.to_args())
    }
}

/// Run `command` to completion. A non-zero exit becomes
/// [`ToolError::CommandFailed`]; a signal exit reports code `-1`.
pub fn run(mut command: Command) -> anyhow::Result<()> {
    tracing::info!("Running {:?}", command);
    let status = command
        .status()
        .with_context(|| format!("Failed to start {:?}", command.get_program()))?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolError::CommandFailed(status.code().unwrap_or(-1)).into())
    }
}

/// Move the prepared images, labels and dataset config into `move_dest`.
pub fn move_data_files(config: &FinetuneConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.move_dest)
        .with_context(|| format!("Failed to create directory {:?}", config.move_dest))?;

    for source in [&config.images_loc, &config.labels_loc, &config.config_loc] {
        let moved = move_into(source, &config.move_dest)?;
        tracing::info!("Moved {:?} to {:?}", source, moved);
    }
    Ok(())
}

/// Move `source` inside `dest_dir`, keeping its name. An existing target is
/// an error. Moves across filesystems fall back to copy and delete.
pub fn move_into(source: &Path, dest_dir: &Path) -> anyhow::Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Cannot move {:?}: path has no file name", source))?;
    let target = dest_dir.join(name);

    if target.exists() {
        anyhow::bail!("Cannot move {:?}: {:?} already exists", source, target);
    }

    match fs::rename(source, &target) {
        Ok(()) => return Ok(target),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!("{:?} is on another filesystem, copying instead", source);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to move {:?} to {:?}", source, target));
        }
    }

    copy_recursive(source, &target)?;
    let removed = if source.is_dir() {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    };
    removed.with_context(|| format!("Failed to remove {:?} after copying", source))?;

    Ok(target)
}

fn copy_recursive(source: &Path, target: &Path) -> anyhow::Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed while traversing {:?}", source))?;
        let relative = entry.path().strip_prefix(source)?;
        let to = if relative.as_os_str().is_empty() {
            target.to_path_buf()
        } else {
            target.join(relative)
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory {:?}", to))?;
        } else {
            fs::copy(entry.path(), &to)
                .with_context(|| format!("Failed to copy {:?} to {:?}", entry.path(), to))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_command_line() {
        let framework = Framework {
            python: "python3".to_string(),
            yolo_dir: PathBuf::from("/opt/yolov5"),
        };
        let command = framework.train_command(&TrainArgs {
            weights: "yolov5s.pt".to_string(),
            img_size: 640,
            batch_size: 16,
            epochs: 5,
            data: PathBuf::from("data/dataset.yaml"),
            project: PathBuf::from("/cnvrg/finetune"),
        });

        assert_eq!(command.get_program(), "python3");
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "train.py", "--weights", "yolov5s.pt", "--img", "640", "--batch", "16",
                "--epochs", "5", "--data", "data/dataset.yaml", "--project", "/cnvrg/finetune",
            ]
        );
        assert_eq!(command.get_current_dir(), Some(Path::new("/opt/yolov5")));
    }

    #[test]
    fn detect_args_flags() {
        let mut args = DetectArgs::new("best.pt", "/data/test");
        args.project = Some(PathBuf::from("/out/batch_predict"));
        args.conf_threshold = Some(0.25);
        args.hide_conf = true;

        let rendered: Vec<_> = args.to_args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            rendered,
            [
                "--weights", "best.pt", "--source", "/data/test", "--project", "/out/batch_predict",
                "--conf-thres", "0.25", "--save-txt", "--save-conf", "--hide-conf",
            ]
        );
    }

    #[test]
    fn move_into_keeps_names() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let images = dir.path().join("images");
        fs::create_dir_all(images.join("train"))?;
        fs::write(images.join("train").join("1.jpg"), b"x")?;
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest)?;

        let moved = move_into(&images, &dest)?;
        assert_eq!(moved, dest.join("images"));
        assert!(dest.join("images/train/1.jpg").is_file());
        assert!(!images.exists());
        Ok(())
    }

    #[test]
    fn move_into_refuses_existing_target() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let images = dir.path().join("src").join("images");
        fs::create_dir_all(images.join("train"))?;
        fs::write(images.join("train").join("new.jpg"), b"x")?;
        let dest = dir.path().join("dest");
        fs::create_dir_all(dest.join("images").join("train"))?;
        fs::write(dest.join("images/train/stale.jpg"), b"old")?;

        assert!(move_into(&images, &dest).is_err());
        assert!(images.join("train/new.jpg").is_file(), "source is left in place");
        assert!(!dest.join("images/train/new.jpg").exists(), "nothing is merged");
        Ok(())
    }

    #[test]
    fn move_into_missing_source_fails() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let err = move_into(&dir.path().join("nope"), dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to move"));
        Ok(())
    }

    #[test]
    fn copy_recursive_copies_tree_and_files() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let labels = dir.path().join("labels");
        fs::create_dir_all(labels.join("train"))?;
        fs::create_dir_all(labels.join("valid"))?;
        fs::write(labels.join("train/1.txt"), b"0 0.5 0.5 0.1 0.1")?;
        fs::write(labels.join("valid/2.txt"), b"1 0.5 0.5 0.2 0.2")?;

        let copied = dir.path().join("copy");
        copy_recursive(&labels, &copied)?;
        assert_eq!(fs::read(copied.join("train/1.txt"))?, b"0 0.5 0.5 0.1 0.1");
        assert_eq!(fs::read(copied.join("valid/2.txt"))?, b"1 0.5 0.5 0.2 0.2");

        let config = dir.path().join("dataset.yaml");
        fs::write(&config, "nc: 1\n")?;
        copy_recursive(&config, &dir.path().join("dataset-copy.yaml"))?;
        assert_eq!(fs::read_to_string(dir.path().join("dataset-copy.yaml"))?, "nc: 1\n");
        Ok(())
    }
}
