//! Input corpus: every regular file under a root, read once and shared read-only.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One input file.
#[derive(Debug, Clone)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub data: Bytes,
}

/// Files in deterministic walk order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    files: Vec<CorpusFile>,
}

impl Corpus {
    /// Recursively read every file below `root`, in file-name order per directory.
    ///
    /// Symlinks to regular files are read through; symlinked directories are
    /// listed but not descended into, and dangling links are skipped. A root
    /// that is itself a file yields a one-file corpus.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            if entry.path().is_file() {
                paths.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "skipping non-regular entry");
            }
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let data = Bytes::from(std::fs::read(&path)?);
            debug!(path = %path.display(), bytes = data.len(), "loaded file");
            files.push(CorpusFile { path, data });
        }

        let corpus = Self { files };
        info!(
            root = %root.display(),
            files = corpus.len(),
            bytes = corpus.total_bytes(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    /// In-memory corpus, named `mem/<index>`.
    pub fn from_buffers<I, B>(buffers: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let files = buffers
            .into_iter()
            .enumerate()
            .map(|(i, data)| CorpusFile {
                path: PathBuf::from(format!("mem/{i}")),
                data: data.into(),
            })
            .collect();
        Self { files }
    }

    pub fn files(&self) -> &[CorpusFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of file sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.data.len() as u64).sum()
    }
}
