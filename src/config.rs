use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use url::Url;

use crate::patcher::{Matcher, Replacement};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";
const DEFAULT_USER_AGENT: &str = "iroduke";
const DEFAULT_RELEASE_REPO: &str = "catppuccin/gitea";
const DEFAULT_ARCHIVE_NAME: &str = "catppuccin-gitea.tar.gz";

/// Branding strings in the generated settings file that `--strip-branding` blanks out.
pub const BRANDING_STRINGS: [&str; 2] = [
    "Gitea - Git with a cup of tea",
    "Gitea (Git with a cup of tea) is a painless self-hosted Git service written in Go",
];

#[derive(Debug, Parser)]
#[command(
    name = "iroduke",
    version,
    about = "Pre-build hook that swaps the default Gitea theme and installs the Catppuccin theme bundle."
)]
pub struct Cli {
    /// Project root that every other path is resolved against.
    #[arg(long, env = "IRODUKE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Settings file to patch, relative to the root.
    #[arg(long, default_value = "modules/setting/ui.go")]
    pub settings_file: PathBuf,

    /// Directory the theme bundle is downloaded into and unpacked under, relative to the root.
    #[arg(long, default_value = "public/css/themes")]
    pub themes_dir: PathBuf,

    /// Theme identifier to replace.
    #[arg(long, default_value = "gitea-auto")]
    pub default_theme: String,

    /// Theme identifier written in its place.
    #[arg(long, default_value = "catppuccin-frappe-lavender")]
    pub theme: String,

    /// Regular expression used instead of the literal default theme identifier.
    #[arg(long)]
    pub theme_pattern: Option<String>,

    /// Also remove the stock Gitea branding strings from the settings file.
    #[arg(long)]
    pub strip_branding: bool,

    /// Only patch the settings file; do not fetch the theme bundle.
    #[arg(long)]
    pub skip_themes: bool,

    /// Repository (owner/name) whose latest release carries the theme bundle.
    #[arg(long, env = "IRODUKE_RELEASE_REPO", default_value = DEFAULT_RELEASE_REPO)]
    pub release_repo: String,

    /// File name of the archive attached to each release.
    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    pub archive_name: String,

    /// GitHub REST API base URL (useful for testing).
    #[arg(long = "api-base", env = "IRODUKE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base_url: String,

    /// Base URL release downloads are served from (useful for testing).
    #[arg(long = "download-base", env = "IRODUKE_DOWNLOAD_BASE", default_value = DEFAULT_DOWNLOAD_BASE)]
    pub download_base_url: String,

    /// Optional GitHub token, raises the API rate limit.
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Custom user-agent header value.
    #[arg(long, env = "IRODUKE_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Emit newline-delimited JSON log lines.
    #[arg(long, env = "IRODUKE_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings_path: PathBuf,
    pub themes_dir: PathBuf,
    pub archive_path: PathBuf,
    pub replacements: Vec<Replacement>,
    pub fetch_themes: bool,
    pub release: ReleaseSource,
    pub github_token: Option<String>,
    pub user_agent: String,
    pub log_json: bool,
}

/// Where the theme bundle's releases live.
#[derive(Debug, Clone)]
pub struct ReleaseSource {
    pub owner: String,
    pub repo: String,
    pub archive_name: String,
    pub api_base_url: Url,
    pub download_base_url: Url,
}

impl Config {
    pub fn from_cli() -> Result<Self> {
        Config::from_parts(Cli::parse())
    }

    fn from_parts(cli: Cli) -> Result<Self> {
        if cli.default_theme.is_empty() {
            return Err(anyhow!("default theme must not be empty"));
        }
        if cli.theme.is_empty() {
            return Err(anyhow!("theme must not be empty"));
        }

        let (owner, repo) = cli
            .release_repo
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| anyhow!("release repo must look like owner/name: {}", cli.release_repo))?;

        if cli.archive_name.is_empty() || cli.archive_name.contains('/') {
            return Err(anyhow!("invalid archive name: {}", cli.archive_name));
        }

        let api_base_url = parse_base_url(&cli.api_base_url)
            .with_context(|| format!("invalid api base url: {}", cli.api_base_url))?;
        let download_base_url = parse_base_url(&cli.download_base_url)
            .with_context(|| format!("invalid download base url: {}", cli.download_base_url))?;

        let settings_path = cli.root.join(&cli.settings_file);
        let themes_dir = cli.root.join(&cli.themes_dir);
        let archive_path = themes_dir.join(&cli.archive_name);

        let matcher = match cli.theme_pattern {
            Some(pattern) => Matcher::Pattern(pattern),
            None => Matcher::Literal,
        };
        let mut replacements = vec![Replacement {
            search: cli.default_theme,
            replace: cli.theme,
            target: settings_path.clone(),
            matcher,
        }];
        if cli.strip_branding {
            replacements.extend(BRANDING_STRINGS.iter().map(|branding| Replacement {
                search: (*branding).to_string(),
                replace: String::new(),
                target: settings_path.clone(),
                matcher: Matcher::Literal,
            }));
        }

        Ok(Self {
            settings_path,
            themes_dir,
            archive_path,
            replacements,
            fetch_themes: !cli.skip_themes,
            release: ReleaseSource {
                owner: owner.to_string(),
                repo: repo.to_string(),
                archive_name: cli.archive_name,
                api_base_url,
                download_base_url,
            },
            github_token: cli.github_token.filter(|token| !token.is_empty()),
            user_agent: cli.user_agent,
            log_json: cli.log_json,
        })
    }
}

/// Parses a base URL and guarantees a trailing slash so `Url::join` appends
/// rather than replacing the last path segment.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("url cannot be used as a base"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
