//! Locating the files of a cookbook
//!
//! A directory is a cookbook when it has a metadata file (`metadata.rb`, or `metadata.json`)
//! and a `recipes` or `resources` directory. [CookbookFiles] lists the files to analyze in
//! sorted order, nothing is read at this point.
use std::path::{Path, PathBuf};

const METADATA_FILES: &[&str] = &["metadata.rb", "metadata.json"];

#[derive(Debug, Clone)]
pub struct CookbookFiles {
    pub root: PathBuf,
    pub metadata: PathBuf,
    /// `recipes/*.rb`
    pub recipes: Vec<PathBuf>,
    /// `resources/*.rb`
    pub resources: Vec<PathBuf>,
    /// every file below `templates/`
    pub templates: Vec<PathBuf>,
}

impl CookbookFiles {
    #[tracing::instrument(level = "trace")]
    pub fn locate(dir: &Path) -> Result<Self, ExtractionError> {
        let not_a_cookbook = |reason: &str| ExtractionError::NotACookbook {
            path: dir.to_path_buf(),
            reason: reason.to_string(),
        };

        if !dir.is_dir() {
            return Err(not_a_cookbook("not a directory"));
        }

        let metadata = METADATA_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| not_a_cookbook("no metadata.rb or metadata.json"))?;

        let recipes_dir = dir.join("recipes");
        let resources_dir = dir.join("resources");
        if !recipes_dir.is_dir() && !resources_dir.is_dir() {
            return Err(not_a_cookbook("no recipes or resources directory"));
        }

        Ok(Self {
            root: dir.to_path_buf(),
            metadata,
            recipes: ruby_files(&recipes_dir)?,
            resources: ruby_files(&resources_dir)?,
            templates: template_files(&dir.join("templates"))?,
        })
    }

    /// `/`-separated path relative to the cookbook root, as used in citations
    pub fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Directory name, used when the metadata does not name the cookbook
    pub fn dir_name(&self) -> String {
        self.root
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(&self.root)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `*.rb` directly inside `dir`, sorted; a missing directory has none
fn ruby_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut files = vec![];
    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }

        let path = dir_entry.path();
        if path.extension().is_some_and(|extension| extension == "rb") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn template_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut files = vec![];
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

pub(crate) fn read_source(path: &Path) -> Result<String, FileParseError> {
    tracing::info!(path = %path.display(), "loading file");
    Ok(std::fs::read_to_string(path)?)
}

/// Faults that stop the extraction of a cookbook
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("{} is not a cookbook: {reason}", path.display())]
    NotACookbook { path: PathBuf, reason: String },
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("unable to list templates")]
    Walk(#[from] walkdir::Error),
}

/// Faults confined to one file, the file is skipped
#[derive(thiserror::Error, Debug)]
pub enum FileParseError {
    #[error("unable to read file")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] crate::syntax::ParseError),
    #[error("invalid metadata.json")]
    Json(#[from] serde_json::Error),
}
