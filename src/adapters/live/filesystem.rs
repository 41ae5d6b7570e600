//! Live filesystem adapter using `std::fs`.

use std::path::Path;

use crate::ports::filesystem::FileSystem;

/// Live filesystem adapter backed by real disk I/O.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(
        &self,
        path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(
        &self,
        path: &Path,
        contents: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, contents)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(
        &self,
        path: &Path,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::create_dir_all(path)?)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::remove_dir_all(path)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::rename(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_rename_moves_tree() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let file = dir.path().join("a/b/requirements.md");

        fs.write(&file, "# Requirements").unwrap();
        assert_eq!(fs.read_to_string(&file).unwrap(), "# Requirements");
        assert_eq!(fs.list_dir(&dir.path().join("a/b")).unwrap(), vec!["requirements.md"]);

        fs.rename(&dir.path().join("a"), &dir.path().join("c")).unwrap();
        assert!(fs.exists(&dir.path().join("c/b/requirements.md")));

        fs.remove_dir_all(&dir.path().join("c")).unwrap();
        assert!(!fs.exists(&dir.path().join("c")));
    }
}
