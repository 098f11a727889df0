use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

/// Raw file names of a dataset before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetListing {
    /// Images and labels live side by side in one directory.
    Combined(Vec<String>),
    /// Images and labels come from separate directories.
    Separate { images: Vec<String>, labels: Vec<String> },
}

impl DatasetListing {
    /// Directory holding the images of this listing.
    pub fn image_dir<'a>(data_dir: Option<&'a Path>, image_dir: Option<&'a Path>) -> Option<&'a Path> {
        data_dir.or(image_dir)
    }

    /// Directory holding the labels of this listing.
    pub fn label_dir<'a>(data_dir: Option<&'a Path>, label_dir: Option<&'a Path>) -> Option<&'a Path> {
        data_dir.or(label_dir)
    }
}

/// Read the file names of a dataset from disk.
///
/// `data_dir` wins when set; otherwise both `image_dir` and `label_dir` are
/// required.
pub fn list_dataset(
    data_dir: Option<&Path>,
    image_dir: Option<&Path>,
    label_dir: Option<&Path>,
) -> anyhow::Result<DatasetListing> {
    if let Some(data_dir) = data_dir {
        return Ok(DatasetListing::Combined(list_file_names(data_dir)?));
    }

    let (Some(image_dir), Some(label_dir)) = (image_dir, label_dir) else {
        anyhow::bail!("Both the image and label directories are required when no data directory is given");
    };

    Ok(DatasetListing::Separate {
        images: list_file_names(image_dir)?,
        labels: list_file_names(label_dir)?,
    })
}

/// Names of the regular files directly inside `dir`. Symlinks are followed;
/// broken ones are skipped with a warning.
fn list_file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    if !dir.is_dir() {
        anyhow::bail!("Failed to read directory {:?}: not a directory", dir);
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => {
                tracing::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read directory {:?}", dir)),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_os_string().into_string() {
            Ok(name) => names.push(name),
            Err(name) => tracing::warn!("Skipping non UTF-8 file name {:?} in {:?}", name, dir),
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn combined_directory_is_listed_once() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        fs::write(dir.path().join("1.jpg"), b"x")?;
        fs::write(dir.path().join("1.txt"), b"0 0.5 0.5 0.1 0.1")?;
        fs::create_dir(dir.path().join("nested"))?;

        let listing = list_dataset(Some(dir.path()), None, None)?;
        let DatasetListing::Combined(mut names) = listing else {
            panic!("expected a combined listing");
        };
        names.sort();
        assert_eq!(names, vec!["1.jpg".to_string(), "1.txt".to_string()]);
        Ok(())
    }

    #[test]
    fn separate_directories_need_both_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(list_dataset(None, Some(dir.path()), None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_listed() -> anyhow::Result<()> {
        let staging = tempfile::TempDir::new()?;
        fs::write(staging.path().join("a.jpg"), b"x")?;
        fs::write(staging.path().join("a.txt"), b"0 0.5 0.5 0.1 0.1")?;

        let dir = tempfile::TempDir::new()?;
        std::os::unix::fs::symlink(staging.path().join("a.jpg"), dir.path().join("1.jpg"))?;
        std::os::unix::fs::symlink(staging.path().join("a.txt"), dir.path().join("1.txt"))?;
        std::os::unix::fs::symlink(staging.path().join("gone.jpg"), dir.path().join("2.jpg"))?;

        let DatasetListing::Combined(mut names) = list_dataset(Some(dir.path()), None, None)? else {
            panic!("expected a combined listing");
        };
        names.sort();
        assert_eq!(names, vec!["1.jpg".to_string(), "1.txt".to_string()]);
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(list_dataset(Some(Path::new("/definitely/not/here")), None, None).is_err());
    }
}
