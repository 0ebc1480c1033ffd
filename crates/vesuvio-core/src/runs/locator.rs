use super::RunLocator;
use crate::domain::{ReductionError, ReductionResult};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_RUN_PREFIX: &str = "EVS";
pub const DEFAULT_RUN_EXTENSION: &str = "json";

/// Finds `<prefix><digits>.<extension>` files (case-insensitive) in an ordered
/// list of directories. Leading zeros in the digits are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRunLocator {
    search_dirs: Vec<PathBuf>,
    prefix: String,
    extension: String,
}

impl DirectoryRunLocator {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            prefix: DEFAULT_RUN_PREFIX.to_string(),
            extension: DEFAULT_RUN_EXTENSION.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    fn matcher(&self) -> ReductionResult<GlobMatcher> {
        let pattern = format!("{}*.{}", self.prefix, self.extension);
        GlobBuilder::new(&pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|source| {
                ReductionError::input_validation(
                    "INPUT.RUN_PATTERN",
                    format!("invalid run file pattern '{}': {}", pattern, source),
                )
            })
    }

    fn run_number(&self, path: &Path) -> Option<u32> {
        let stem = path.file_stem()?.to_str()?;
        let head = stem.get(..self.prefix.len())?;
        if !head.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let digits = &stem[self.prefix.len()..];
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn candidates(&self, directory: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(source) => {
                warn!(
                    directory = %directory.display(),
                    error = %source,
                    "skipping unreadable run directory"
                );
                return Vec::new();
            }
        };

        let mut paths = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.file_name().is_some_and(|name| matcher.is_match(name)))
            .collect::<Vec<_>>();
        paths.sort();
        paths
    }
}

impl RunLocator for DirectoryRunLocator {
    fn locate(&self, run: u32) -> ReductionResult<PathBuf> {
        let matcher = self.matcher()?;
        for directory in &self.search_dirs {
            let found = self
                .candidates(directory, &matcher)
                .into_iter()
                .find(|path| self.run_number(path) == Some(run));
            if let Some(path) = found {
                debug!(run, path = %path.display(), "located run file");
                return Ok(path);
            }
        }

        let searched = self
            .search_dirs
            .iter()
            .map(|directory| format!("'{}'", directory.display()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(ReductionError::io_system(
            "IO.RUN_NOT_FOUND",
            format!(
                "run {} ({}{}.{}) was not found in [{}]",
                run, self.prefix, run, self.extension, searched
            ),
        ))
    }
}
