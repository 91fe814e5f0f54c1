//! Gitignore-aware candidate file walker.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs (early prune + late filter)
//! - Deterministic ordering so batch runs and tests are stable
//!
//! Backed by ripgrep's `ignore` crate and `globset`. The pipeline treats the
//! result as an opaque ordered sequence of paths.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Directories that never contain user source worth cleaning.
pub const DEFAULT_IGNORES: &[&str] = &[
    "node_modules/**",
    "target/**",
    "dist/**",
    "build/**",
    "vendor/**",
    ".git/**",
    "__pycache__/**",
    "coverage/**",
];

/// Gitignore-aware walker with additional ignore globs.
/// Extra globs are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
pub struct FileWalker {
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Restrict results to these file extensions (empty = all)
    extensions: Vec<String>,

    /// Include hidden (dot) files; default false for source cleanup
    include_hidden: bool,

    /// Maximum recursion depth; default None (unbounded)
    max_depth: Option<usize>,
}

impl FileWalker {
    /// Build a walker with additional ignore patterns on top of
    /// [`DEFAULT_IGNORES`]. Patterns match on (relative) paths.
    pub fn new(additional_ignores: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in DEFAULT_IGNORES {
            builder.add(Glob::new(pattern)?);
        }
        for pattern in additional_ignores {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            extensions: Vec::new(),
            include_hidden: false,
            max_depth: None,
        })
    }

    /// Restrict results to the given file extensions (without dots).
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions.to_vec();
        self
    }

    /// Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Limit recursion depth (`None` = unbounded).
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(&self, root: &Path) -> WalkBuilder {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) *skips* dotfiles, so invert our flag
        b.hidden(!self.include_hidden);

        // Respect .ignore/.gitignore/.git/info/exclude and global gitignore
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);

        b.follow_links(false);
        b.max_depth(self.max_depth);

        // Early directory pruning using extra ignores (fast short-circuit).
        let extra = self.ignore_patterns.clone();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if is_dir && extra.is_match(ent.path()) {
                return false;
            }
            true
        });

        b
    }

    /// Traverse files under `root`, respecting ignore rules and extra globs.
    /// Returns a **sorted** list of file paths for determinism.
    pub fn walk_files<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let root_path = root.as_ref();
        let walker = self.build_walk(root_path).build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| res.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            // Late file-level extra ignore filtering using RELATIVE path
            .filter(|abs| {
                let rel = abs.strip_prefix(root_path).unwrap_or(abs);
                !self.ignore_patterns.is_match(rel)
            })
            .filter(|p| self.extension_allowed(p))
            .collect();

        // Deterministic order (stable CLI & tests)
        out.sort();

        out
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension().and_then(|e| e.to_str()).is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|want| want.eq_ignore_ascii_case(ext))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Create a file with parent dirs as needed
    fn write_file(root: &Path, rel: &str, contents: &str) -> Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    #[test]
    fn test_walk_sorted_and_complete() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        write_file(root, "b.js", "let x = 1;")?;
        write_file(root, "a.js", "let y = 2;")?;

        let walker = FileWalker::new(&[])?;
        let files = walker.walk_files(root);

        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[test]
    fn test_default_ignores_prune_dependencies() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        write_file(root, "node_modules/pkg/index.js", "js")?;
        write_file(root, "target/debug/a.rs", "rs")?;
        write_file(root, "src/app.js", "console.log('x');")?;

        let walker = FileWalker::new(&[])?;
        let files = walker.walk_files(root);

        assert_eq!(files.len(), 1, "unexpected files: {files:?}");
        assert_eq!(files[0].strip_prefix(root).unwrap(), Path::new("src/app.js"));
        Ok(())
    }

    #[test]
    fn test_extension_filter() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        write_file(root, "app.js", "x")?;
        write_file(root, "app.py", "x")?;
        write_file(root, "README.md", "x")?;

        let walker = FileWalker::new(&[])?.with_extensions(&["js".to_string()]);
        let mut files = walker.walk_files(root);
        files
            .iter_mut()
            .for_each(|p| *p = p.strip_prefix(root).unwrap().to_path_buf());

        assert_eq!(files, vec![PathBuf::from("app.js")]);
        Ok(())
    }

    #[test]
    fn test_extra_globs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        write_file(root, "generated/out.js", "x")?;
        write_file(root, "src/keep.js", "x")?;

        let ignores = vec!["generated/**".to_string()];
        let walker = FileWalker::new(&ignores)?;
        let files = walker.walk_files(root);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].strip_prefix(root).unwrap(), Path::new("src/keep.js"));
        Ok(())
    }
}
