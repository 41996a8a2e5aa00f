use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

pub const UPLOADS_ROOT: &str = "uploads";
pub const CONTENTS_ROOT: &str = "contents";
pub const AVATARS_DIR: &str = "uploads/avatars";
pub const INPUTS_DIR: &str = "uploads/inputs";
pub const GENERATED_DIR: &str = "contents/generated";
pub const PRINTS_DIR: &str = "contents/prints";

/// File persistence behind a trait so handlers never touch paths directly
/// and tests can root everything in a throwaway directory.
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Write `bytes` at `relative_path` under the store root, creating
    /// intermediate directories.
    async fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<()>;

    async fn read(&self, relative_path: &str) -> Result<Vec<u8>>;

    /// Delete the file if it exists. Removing a missing file is not an error.
    async fn remove(&self, relative_path: &str) -> Result<()>;
}

pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout the application serves from.
    pub async fn ensure_layout(&self) -> Result<()> {
        for dir in [AVATARS_DIR, INPUTS_DIR, GENERATED_DIR, PRINTS_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir))
                .await
                .with_context(|| format!("failed to create {dir}"))?;
        }
        Ok(())
    }

    fn resolve(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }
}

#[async_trait]
impl FileStore for LocalFiles {
    async fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create parent of {relative_path}"))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {relative_path}"))?;
        Ok(())
    }

    async fn read(&self, relative_path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(relative_path))
            .await
            .with_context(|| format!("failed to read {relative_path}"))
    }

    async fn remove(&self, relative_path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(relative_path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {relative_path}")),
        }
    }
}

pub fn join_relative(dir: &str, filename: &str) -> String {
    format!("{dir}/{filename}")
}

pub fn serve_path(root: &str, dir: &str) -> PathBuf {
    Path::new(root).join(dir)
}
