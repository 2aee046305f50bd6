use std::collections::HashSet;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{io_err, ResolveError};

/// Per-codebase ignore files read after the folder defaults, in order.
pub const IGNORE_FILES: &[&str] = &[".gitignore", ".coignore"];

/// Compiled gitignore-style rules for one codebase root.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    matcher: Gitignore,
    patterns: Vec<String>,
}

impl IgnoreRules {
    /// Compile `patterns` relative to `root`.
    pub fn compile(root: &Path, patterns: Vec<String>) -> Result<Self, ResolveError> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in &patterns {
            builder
                .add_line(None, pattern)
                .map_err(|source| ResolveError::Ignore {
                    path: root.to_path_buf(),
                    source,
                })?;
        }
        let matcher = builder.build().map_err(|source| ResolveError::Ignore {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self { matcher, patterns })
    }

    /// Match a codebase-relative path. A trailing `/` marks a directory.
    ///
    /// Parents are consulted too, so `node_modules/x/y.js` is ignored by
    /// `node_modules/`, and a whitelisted parent (`!.costrict/wiki/`) wins
    /// over a broader pattern.
    pub fn matches_path(&self, rel: &str) -> bool {
        let is_dir = rel.ends_with('/');
        let trimmed = rel.trim_end_matches('/');
        if trimmed.is_empty() || Path::new(trimmed).has_root() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(trimmed, is_dir)
            .is_ignore()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

pub trait IgnoreLoader: Send + Sync {
    /// Rules for `codebase_root`, or `None` when there are no rules at all.
    fn load(&self, codebase_root: &Path) -> Result<Option<IgnoreRules>, ResolveError>;
}

/// Folder defaults from settings plus `.gitignore` and `.coignore`.
#[derive(Debug, Clone)]
pub struct ScannerIgnoreLoader {
    folder_patterns: Vec<String>,
}

impl ScannerIgnoreLoader {
    pub fn new(folder_patterns: Vec<String>) -> Self {
        Self { folder_patterns }
    }
}

impl IgnoreLoader for ScannerIgnoreLoader {
    fn load(&self, codebase_root: &Path) -> Result<Option<IgnoreRules>, ResolveError> {
        let mut lines = self.folder_patterns.clone();
        for file in IGNORE_FILES {
            lines.extend(read_rule_lines(&codebase_root.join(file))?);
        }

        let mut seen = HashSet::new();
        let patterns: Vec<String> = lines
            .into_iter()
            .filter(|line| seen.insert(line.clone()))
            .collect();
        if patterns.is_empty() {
            return Ok(None);
        }
        IgnoreRules::compile(codebase_root, patterns).map(Some)
    }
}

/// Trimmed, non-empty, non-comment lines of `path`; nothing if it is absent.
fn read_rule_lines(path: &Path) -> Result<Vec<String>, ResolveError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(path, err)),
    };
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules(root: &Path, patterns: &[&str]) -> IgnoreRules {
        IgnoreRules::compile(root, patterns.iter().map(|p| p.to_string()).collect()).unwrap()
    }

    #[test]
    fn directory_patterns_need_trailing_slash_or_parent() {
        let dir = TempDir::new().unwrap();
        let r = rules(dir.path(), &["node_modules/"]);
        assert!(r.matches_path("node_modules/"));
        assert!(r.matches_path("node_modules/left-pad/index.js"));
        assert!(!r.matches_path("src/node_modules.rs"));
    }

    #[test]
    fn whitelisted_wiki_survives_hidden_pattern() {
        let dir = TempDir::new().unwrap();
        let r = rules(dir.path(), &[".*", "!.costrict/wiki/"]);
        assert!(r.matches_path(".env"));
        assert!(!r.matches_path(".costrict/wiki/index.md"));
    }

    #[test]
    fn loader_merges_files_and_drops_duplicates_and_comments() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "# build\n*.log\n\ntarget/\n").unwrap();
        std::fs::write(dir.path().join(".coignore"), "  *.log  \nsecrets.toml\n").unwrap();

        let loaded = ScannerIgnoreLoader::new(vec!["target/".into()])
            .load(dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.patterns(), ["target/", "*.log", "secrets.toml"]);
        assert!(loaded.matches_path("server.log"));
        assert!(loaded.matches_path("config/secrets.toml"));
    }

    #[test]
    fn loader_without_any_rules_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(ScannerIgnoreLoader::new(vec![])
            .load(dir.path())
            .unwrap()
            .is_none());
    }

    #[test]
    fn absolute_paths_never_match() {
        let dir = TempDir::new().unwrap();
        let r = rules(dir.path(), &["*.log"]);
        assert!(!r.matches_path("/var/log/x.log"));
    }
}
