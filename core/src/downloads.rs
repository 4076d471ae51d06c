use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::MentoraResult;
use crate::types::Attachment;

/// Destination for files returned by the backend
pub trait DownloadSink: Send + Sync + Debug {
    /// Hand the attachment to the user; returns where it ended up
    fn deliver(&self, attachment: &Attachment) -> MentoraResult<PathBuf>;
}

/// Writes attachments into a directory, never overwriting existing files
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (file_name, None),
        };
        (1..)
            .map(|n| match ext {
                Some(ext) => self.dir.join(format!("{} ({}).{}", stem, n, ext)),
                None => self.dir.join(format!("{} ({})", stem, n)),
            })
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

impl DownloadSink for DirectoryDownloads {
    fn deliver(&self, attachment: &Attachment) -> MentoraResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.free_path(&sanitize_file_name(&attachment.file_name));
        fs::write(&path, &attachment.bytes)?;
        info!("Saved {} ({} bytes)", path.display(), attachment.len());
        Ok(path)
    }
}

/// Keeps only the final path component and replaces characters that are
/// unsafe in file names
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "archivo_mentora".to_string(),
        _ => cleaned,
    }
}
