use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex};
use thiserror::Error;

/// How a [`Replacement`] decides what to match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Matcher {
    /// Match the search value literally; the replacement is inserted verbatim.
    #[default]
    Literal,
    /// Match this regular expression instead of the search value. The
    /// replacement may refer to capture groups (`$1`, `${name}`).
    Pattern(String),
}

/// One find/replace instruction against a text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub search: String,
    pub replace: String,
    pub target: PathBuf,
    pub matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub path: PathBuf,
    pub replaced: usize,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to resolve path {}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading the file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error writing to the file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Matcher {
    pub fn compile(&self, search: &str) -> Result<Regex, PatchError> {
        let pattern = match self {
            Matcher::Literal => regex::escape(search),
            Matcher::Pattern(pattern) => pattern.clone(),
        };
        Regex::new(&pattern).map_err(|source| PatchError::InvalidPattern { pattern, source })
    }
}

impl Replacement {
    /// Replaces every match in `content`, returning the new text and the number of matches.
    pub fn apply_to(&self, content: &str) -> Result<(String, usize), PatchError> {
        let regex = self.matcher.compile(&self.search)?;
        Ok(replace_all(&regex, &self.matcher, content, &self.replace))
    }
}

fn replace_all(regex: &Regex, matcher: &Matcher, content: &str, replace: &str) -> (String, usize) {
    let count = regex.find_iter(content).count();
    if count == 0 {
        return (content.to_owned(), 0);
    }
    let updated = match matcher {
        Matcher::Literal => regex.replace_all(content, NoExpand(replace)),
        Matcher::Pattern(_) => regex.replace_all(content, replace),
    };
    (updated.into_owned(), count)
}

fn resolve(path: &Path) -> Result<PathBuf, PatchError> {
    std::path::absolute(path).map_err(|source| PatchError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the target, replaces every match and writes the result back over it.
///
/// The target is never created: a missing file fails the read and nothing is
/// written. A file without matches is rewritten unchanged.
pub async fn patch_file(replacement: &Replacement) -> Result<PatchReport, PatchError> {
    let path = resolve(&replacement.target)?;
    let regex = replacement.matcher.compile(&replacement.search)?;

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| PatchError::Read {
            path: path.clone(),
            source,
        })?;

    let (updated, replaced) = replace_all(&regex, &replacement.matcher, &content, &replacement.replace);

    write_back(&path, updated).await?;

    Ok(PatchReport { path, replaced })
}

async fn write_back(path: &Path, content: String) -> Result<(), PatchError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| PatchError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Runs one replacement pass, logging the outcome instead of returning it.
pub async fn apply(replacement: &Replacement) {
    match patch_file(replacement).await {
        Ok(report) => tracing::info!(
            path = %report.path.display(),
            replaced = report.replaced,
            "file updated successfully"
        ),
        Err(err) => tracing::error!(error = &err as &dyn std::error::Error, "patch failed"),
    }
}

/// Runs the passes in order; a failing pass does not stop the ones after it.
pub async fn apply_all(replacements: &[Replacement]) {
    for replacement in replacements {
        apply(replacement).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn replacement(target: &Path, search: &str, replace: &str, matcher: Matcher) -> Replacement {
        Replacement {
            search: search.into(),
            replace: replace.into(),
            target: target.to_path_buf(),
            matcher,
        }
    }

    const UI_GO: &str = r#"var UI = struct {
	DefaultTheme string
	Themes       []string
}{
	DefaultTheme: "gitea-auto",
	Themes:       []string{"gitea-auto", "gitea-light", "gitea-dark"},
}
"#;

    #[tokio::test]
    async fn replaces_every_occurrence_and_keeps_the_rest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ui.go");
        std::fs::write(&path, UI_GO).unwrap();

        let spec = replacement(&path, "gitea-auto", "catppuccin-frappe-lavender", Matcher::Literal);
        let report = patch_file(&spec).await.unwrap();

        assert_eq!(report.replaced, 2);
        assert!(report.path.is_absolute());
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(!updated.contains("gitea-auto"));
        assert_eq!(updated, UI_GO.replace("gitea-auto", "catppuccin-frappe-lavender"));
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ui.go");
        std::fs::write(&path, UI_GO).unwrap();

        let spec = replacement(&path, "gitea-auto", "catppuccin-frappe-lavender", Matcher::Literal);
        patch_file(&spec).await.unwrap();
        let once = std::fs::read_to_string(&path).unwrap();
        let report = patch_file(&spec).await.unwrap();
        let twice = std::fs::read_to_string(&path).unwrap();

        assert_eq!(report.replaced, 0);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn missing_target_is_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.go");

        let spec = replacement(&path, "gitea-auto", "x", Matcher::Literal);
        let err = patch_file(&spec).await.unwrap_err();

        assert!(matches!(err, PatchError::Read { .. }));
        assert!(!path.exists());

        // The fire-and-forget entry point swallows the error.
        apply(&spec).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn custom_pattern_overrides_search_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ui.go");
        std::fs::write(&path, UI_GO).unwrap();

        let spec = replacement(
            &path,
            "gitea-auto",
            "catppuccin-mocha-blue",
            Matcher::Pattern("gitea-(auto|dark)".into()),
        );
        let report = patch_file(&spec).await.unwrap();

        assert_eq!(report.replaced, 3);
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(!updated.contains("gitea-auto"));
        assert!(!updated.contains("gitea-dark"));
        assert!(updated.contains("gitea-light"));
    }

    #[test]
    fn literal_search_is_escaped() {
        let spec = replacement(
            Path::new("unused"),
            "Gitea (Git with a cup of tea) is",
            "",
            Matcher::Literal,
        );
        let (updated, count) = spec
            .apply_to("AppName = \"Gitea (Git with a cup of tea) is great\"")
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(updated, "AppName = \" great\"");
    }

    #[test]
    fn literal_replacement_is_not_expanded() {
        let spec = replacement(Path::new("unused"), "theme", "$1-cost", Matcher::Literal);
        let (updated, _) = spec.apply_to("theme").unwrap();
        assert_eq!(updated, "$1-cost");
    }

    #[test]
    fn pattern_replacement_expands_captures() {
        let spec = replacement(
            Path::new("unused"),
            "",
            "catppuccin-${flavor}",
            Matcher::Pattern("gitea-(?P<flavor>light|dark)".into()),
        );
        let (updated, count) = spec.apply_to("gitea-light gitea-dark").unwrap();
        assert_eq!(count, 2);
        assert_eq!(updated, "catppuccin-light catppuccin-dark");
    }

    #[tokio::test]
    async fn invalid_pattern_skips_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ui.go");
        std::fs::write(&path, UI_GO).unwrap();

        let spec = replacement(&path, "gitea-auto", "x", Matcher::Pattern("gitea-(".into()));
        let err = patch_file(&spec).await.unwrap_err();

        assert!(matches!(err, PatchError::InvalidPattern { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), UI_GO);
    }

    #[tokio::test]
    async fn directory_target_fails_before_writing() {
        let dir = TempDir::new().unwrap();

        let spec = replacement(dir.path(), "gitea-auto", "x", Matcher::Literal);
        let err = patch_file(&spec).await.unwrap_err();

        assert!(matches!(err, PatchError::Read { .. }));
        assert!(dir.path().is_dir());
    }

    #[tokio::test]
    async fn unwritable_target_reports_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("ui.go");
        std::fs::write(&blocker, UI_GO).unwrap();
        // A regular file cannot be a parent directory, whoever runs the test.
        let path = blocker.join("nested.go");

        let err = write_back(&path, "updated".into()).await.unwrap_err();

        match err {
            PatchError::Write { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected write error, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), UI_GO);
    }

    #[tokio::test]
    async fn apply_all_keeps_going_after_a_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ui.go");
        std::fs::write(&path, UI_GO).unwrap();

        let passes = vec![
            replacement(&dir.path().join("missing.go"), "gitea-auto", "x", Matcher::Literal),
            replacement(&path, "gitea-light", "catppuccin-latte-blue", Matcher::Literal),
        ];
        apply_all(&passes).await;

        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.contains("catppuccin-latte-blue"));
    }
}
