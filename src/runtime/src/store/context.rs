//! Per-run pipeline state.
//!
//! One [`PipelineContext`] is threaded through every phase of a pull. It
//! owns the working and output directories, the staged items waiting for
//! commit and the running byte total.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use a3s_pull_core::error::{PullError, Result};

/// A fetched blob sitting in the working directory, waiting for commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    /// Digest of the descriptor the content was fetched for
    pub digest: String,
    /// Temporary file holding the content
    pub path: PathBuf,
    /// Bytes written to the temporary file
    pub bytes: u64,
}

/// Mutable state of one pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    work_dir: PathBuf,
    output_dir: Option<PathBuf>,
    fixed: bool,
    pending: VecDeque<StagedItem>,
    bytes_staged: u64,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Fresh context staging into the platform temp directory.
    pub fn new() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            output_dir: None,
            fixed: false,
            pending: VecDeque::new(),
            bytes_staged: 0,
        }
    }

    /// Override the working and/or output directory.
    ///
    /// `None` or an empty path leaves the current value. Each given path
    /// must be an existing directory. Fails with
    /// [`PullError::DirectoriesFixed`] once the store has been located.
    pub fn set_directories(&mut self, working: Option<&Path>, output: Option<&Path>) -> Result<()> {
        if self.fixed {
            return Err(PullError::DirectoriesFixed);
        }

        let working = working.filter(|p| !p.as_os_str().is_empty());
        let output = output.filter(|p| !p.as_os_str().is_empty());

        if let Some(dir) = working {
            ensure_directory(dir)?;
            self.work_dir = dir.to_path_buf();
        }
        if let Some(dir) = output {
            ensure_directory(dir)?;
            self.output_dir = Some(dir.to_path_buf());
        }

        if working.map_or(false, |dir| self.work_dir != dir) {
            return Err(PullError::Unset("working directory".to_string()));
        }
        if output.map_or(false, |dir| self.output_dir.as_deref() != Some(dir)) {
            return Err(PullError::Unset("output directory".to_string()));
        }

        Ok(())
    }

    /// Freeze the directories for the rest of the run.
    pub(crate) fn fix_directories(&mut self) {
        self.fixed = true;
    }

    pub fn directories_fixed(&self) -> bool {
        self.fixed
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Active output directory, set by locating the store.
    pub fn output_dir(&self) -> Result<&Path> {
        self.output_dir
            .as_deref()
            .ok_or_else(|| PullError::Unset("output directory".to_string()))
    }

    /// Staged items not yet committed, in the order they were fetched.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &StagedItem> {
        self.pending.iter()
    }

    /// Total bytes staged during this run.
    pub fn bytes_staged(&self) -> u64 {
        self.bytes_staged
    }

    pub(crate) fn record(&mut self, item: StagedItem) {
        self.bytes_staged += item.bytes;
        self.pending.push_back(item);
    }

    pub(crate) fn next_pending(&self) -> Option<&StagedItem> {
        self.pending.front()
    }

    pub(crate) fn complete_next(&mut self) -> Option<StagedItem> {
        self.pending.pop_front()
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_dir() {
        return Err(PullError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_context_defaults() {
        let ctx = PipelineContext::new();
        assert_eq!(ctx.work_dir(), std::env::temp_dir());
        assert!(matches!(ctx.output_dir(), Err(PullError::Unset(_))));
        assert_eq!(ctx.pending().len(), 0);
        assert_eq!(ctx.bytes_staged(), 0);
    }

    #[test]
    fn test_set_directories() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::create_dir_all(&out).unwrap();

        let mut ctx = PipelineContext::new();
        ctx.set_directories(Some(&work), Some(&out)).unwrap();
        assert_eq!(ctx.work_dir(), work);
        assert_eq!(ctx.output_dir().unwrap(), out);
    }

    #[test]
    fn test_set_directories_empty_keeps_current() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new();
        ctx.set_directories(None, Some(tmp.path())).unwrap();
        ctx.set_directories(Some(Path::new("")), None).unwrap();
        assert_eq!(ctx.work_dir(), std::env::temp_dir());
        assert_eq!(ctx.output_dir().unwrap(), tmp.path());
    }

    #[test]
    fn test_set_directories_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let mut ctx = PipelineContext::new();
        let err = ctx.set_directories(Some(&file), None).unwrap_err();
        assert!(matches!(err, PullError::NotADirectory(p) if p == file));
    }

    #[test]
    fn test_set_directories_missing_path() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new();
        let err = ctx
            .set_directories(None, Some(&tmp.path().join("nope")))
            .unwrap_err();
        assert!(matches!(err, PullError::IoError(_)));
    }

    #[test]
    fn test_directories_fixed() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = PipelineContext::new();
        ctx.set_directories(Some(tmp.path()), Some(tmp.path())).unwrap();
        ctx.fix_directories();
        assert!(ctx.directories_fixed());
        assert!(matches!(
            ctx.set_directories(Some(tmp.path()), None),
            Err(PullError::DirectoriesFixed)
        ));
    }

    #[test]
    fn test_record_and_complete_in_order() {
        let mut ctx = PipelineContext::new();
        for (digest, bytes) in [("sha256:aaa", 10), ("sha256:bbb", 20)] {
            ctx.record(StagedItem {
                digest: digest.to_string(),
                path: PathBuf::from(format!("/work/{}-x", digest)),
                bytes,
            });
        }
        assert_eq!(ctx.bytes_staged(), 30);
        assert_eq!(ctx.next_pending().unwrap().digest, "sha256:aaa");
        assert_eq!(ctx.complete_next().unwrap().digest, "sha256:aaa");
        assert_eq!(ctx.pending().map(|i| i.digest.as_str()).collect::<Vec<_>>(), vec!["sha256:bbb"]);
        assert_eq!(ctx.bytes_staged(), 30);
    }
}
