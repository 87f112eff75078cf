use crate::utils::error::{PortalError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Matches file names by extension, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn html() -> Self {
        Self::new(["html"])
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Same test for module ids. Ids with a `?query` suffix are sub-modules
    /// (styles, scripts) of a source file and never match.
    pub fn matches_module(&self, module_id: &str) -> bool {
        !module_id.contains('?') && self.matches(Path::new(module_id))
    }
}

/// Files found by [`walk`], plus the subtrees that could not be listed.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, PortalError)>,
}

/// Lists matching files under `root`, sorted by file name at each level.
///
/// Symlinks are not followed. Only an unreadable root fails the walk; a
/// subdirectory that cannot be listed is skipped and reported.
pub fn walk(root: &Path, filter: &ExtensionFilter) -> Result<WalkOutcome> {
    let mut outcome = WalkOutcome::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                let error = PortalError::WalkError {
                    path: path.clone(),
                    message: e.to_string(),
                };
                if e.depth() == 0 {
                    return Err(error);
                }
                tracing::warn!("⚠️ Skipping {}: {}", path.display(), e);
                outcome.skipped.push((path, error));
                continue;
            }
        };

        if entry.file_type().is_file() && filter.matches(entry.path()) {
            outcome.files.push(entry.into_path());
        }
    }

    tracing::debug!(
        "Found {} candidate files under {}",
        outcome.files.len(),
        root.display()
    );
    Ok(outcome)
}

/// Maps each source to a path under `out_dir`, keeping its position relative
/// to the deepest directory all sources share.
///
/// Two sources mapping to the same target is an error.
pub fn output_paths(sources: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>> {
    let absolute = sources
        .iter()
        .map(|source| {
            std::path::absolute(source).map_err(|source_err| PortalError::ReadError {
                path: source.clone(),
                source: source_err,
            })
        })
        .collect::<Result<Vec<PathBuf>>>()?;

    let mut base: Option<PathBuf> = None;
    for path in &absolute {
        let parent = path.parent().unwrap_or(path);
        base = Some(match base {
            None => parent.to_path_buf(),
            Some(current) => current
                .components()
                .zip(parent.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    let base = base.unwrap_or_default();

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(absolute.len());
    for (source, path) in sources.iter().zip(&absolute) {
        let relative = path.strip_prefix(&base).unwrap_or(path);
        let target = out_dir.join(relative);
        if !seen.insert(target.clone()) {
            return Err(PortalError::InvalidConfigValueError {
                field: "files".to_string(),
                value: source.display().to_string(),
                reason: format!("another source is also written to {}", target.display()),
            });
        }
        targets.push(target);
    }
    Ok(targets)
}
