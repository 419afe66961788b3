use super::archive;
use super::{InstallContext, ToolInstaller};
use crate::error::InstallError;
use crate::events::{ScannerEvent, SharedSink};
use crate::process::{CommandRunner, Deadline};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on the artifact download, applied on top of the installer's
/// own timeout. The earlier of the two wins.
pub const DOWNLOAD_DEADLINE: Duration = Duration::from_secs(15 * 60);

/// The subset of GitHub's release JSON that matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// A concrete downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub url: String,
    /// Release tag without its leading `v`.
    pub version: String,
}

/// Picks the first asset whose name matches `pattern`.
///
/// # Errors
///
/// Returns [`InstallError::InvalidPattern`] if `pattern` is not a valid
/// regular expression and [`InstallError::NoMatchingAsset`] (carrying the
/// pattern) if nothing matches.
pub fn select_asset(release: &GithubRelease, pattern: &str) -> Result<ResolvedAsset, InstallError> {
    let regex = Regex::new(pattern).map_err(|source| InstallError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    release
        .assets
        .iter()
        .find(|asset| regex.is_match(&asset.name))
        .map(|asset| ResolvedAsset {
            url: asset.browser_download_url.clone(),
            version: release.tag_name.trim_start_matches('v').to_string(),
        })
        .ok_or_else(|| InstallError::NoMatchingAsset {
            pattern: pattern.to_string(),
        })
}

/// Whether `url` points at the releases API rather than at an artifact.
///
/// Any `api.github.com` releases URL qualifies, as does any URL shaped like
/// the API's `/releases/latest` or `/releases/tags/<tag>` endpoints.
pub fn is_release_api_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    (url.contains("api.github.com") && url.contains("/releases/"))
        || path.ends_with("/releases/latest")
        || path.contains("/releases/tags/")
}

/// Installs a tool from a GitHub release asset.
///
/// Arguments: `url asset_pattern version dest_path`. `url` may be a
/// releases API URL, resolved through `asset_pattern`, or a direct link.
pub struct GithubInstaller {
    url: String,
    asset_pattern: String,
    version: String,
    dest: PathBuf,
    timeout_minutes: u64,
    http: reqwest::Client,
    runner: Arc<dyn CommandRunner>,
    events: SharedSink,
}

impl GithubInstaller {
    pub fn new(args: Vec<String>, timeout_minutes: u64, ctx: &InstallContext) -> Result<Self, InstallError> {
        let mut args = args.into_iter();
        let (Some(url), Some(asset_pattern), Some(version), Some(dest)) =
            (args.next(), args.next(), args.next(), args.next())
        else {
            return Err(InstallError::InvalidArguments {
                installer: "github",
                usage: "github <url> <asset_pattern> <version> <dest_path>".to_string(),
            });
        };

        Ok(Self {
            url,
            asset_pattern,
            version,
            dest: PathBuf::from(dest),
            timeout_minutes,
            http: ctx.http.clone(),
            runner: ctx.runner.clone(),
            events: ctx.events.clone(),
        })
    }

    fn tool_name(&self) -> String {
        self.dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dest.display().to_string())
    }

    /// Direct download URL and effective version for this install.
    async fn resolve(&self, deadline: Deadline) -> Result<ResolvedAsset, InstallError> {
        if !is_release_api_url(&self.url) {
            return Ok(ResolvedAsset {
                url: self.url.clone(),
                version: self.version.clone(),
            });
        }

        let release = self.fetch_release(deadline).await?;
        let asset = select_asset(&release, &self.asset_pattern)?;

        let version = if self.version == "latest" {
            asset.version
        } else {
            self.version.clone()
        };
        Ok(ResolvedAsset {
            url: asset.url,
            version,
        })
    }

    async fn fetch_release(&self, deadline: Deadline) -> Result<GithubRelease, InstallError> {
        let request = async {
            let response = self
                .http
                .get(&self.url)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout_at(deadline.at(), request)
            .await
            .map_err(|_| InstallError::timeout("release lookup", deadline.budget()))?
            .map_err(|source| InstallError::Http {
                url: self.url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(InstallError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|source| InstallError::ReleaseParse {
            url: self.url.clone(),
            source,
        })
    }

    /// Streams `url` into `file`.
    async fn download(&self, url: &str, file: &mut std::fs::File, deadline: Deadline) -> Result<(), InstallError> {
        let transfer = async {
            let mut response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|source| InstallError::Http {
                    url: url.to_string(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(InstallError::HttpStatus {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            while let Some(chunk) = response.chunk().await.map_err(|source| InstallError::Http {
                url: url.to_string(),
                source,
            })? {
                file.write_all(&chunk)
                    .map_err(|e| InstallError::io("failed to write download", e))?;
            }
            file.flush()
                .map_err(|e| InstallError::io("failed to write download", e))
        };

        tokio::time::timeout_at(deadline.at(), transfer)
            .await
            .map_err(|_| InstallError::timeout(format!("download of {}", url), deadline.budget()))?
    }

    /// Writes the staged download to `dest` as an executable, extracting it
    /// first when it is an archive.
    async fn place(
        &self,
        staged: PathBuf,
        tool: &str,
        archive_name: String,
        deadline: Deadline,
    ) -> Result<(), InstallError> {
        archive::prepare_destination(&self.dest, self.runner.as_ref(), self.events.as_ref(), deadline)
            .await?;

        let dest = self.dest.clone();
        let tool_name = tool.to_string();
        let extraction = tokio::task::spawn_blocking(move || {
            let result = if archive::is_archive(&archive_name) {
                archive::extract_executable(&staged, &dest, &tool_name, &archive_name)
            } else {
                archive::copy_file(&staged, &dest)
            };
            result.and_then(|()| archive::set_executable(&dest))
        });

        tokio::time::timeout_at(deadline.at(), extraction)
            .await
            .map_err(|_| InstallError::timeout(format!("extraction of {}", tool), deadline.budget()))?
            .map_err(|e| InstallError::io("extraction task failed", std::io::Error::other(e)))?
    }
}

#[async_trait]
impl ToolInstaller for GithubInstaller {
    fn kind(&self) -> &'static str {
        "github"
    }

    async fn install_tool(&self) -> Result<(), InstallError> {
        let deadline = Deadline::after_minutes(self.timeout_minutes);
        let tool = self.tool_name();

        let asset = self.resolve(deadline).await?;
        let archive_name = asset
            .url
            .rsplit('/')
            .next()
            .unwrap_or(asset.url.as_str())
            .to_string();

        let mut staging = tempfile::Builder::new()
            .prefix("tool-download-")
            .tempfile()
            .map_err(|e| InstallError::io("failed to create temp file", e))?;

        self.events.emit(ScannerEvent::Downloading {
            tool: tool.clone(),
            url: asset.url.clone(),
            version: asset.version.clone(),
        });
        let download_deadline = deadline.earliest(Deadline::after(DOWNLOAD_DEADLINE));
        self.download(&asset.url, staging.as_file_mut(), download_deadline)
            .await?;

        let placed = self.place(staging.path().to_path_buf(), &tool, archive_name, deadline).await;

        // staging is removed when dropped, on both paths.
        drop(staging);

        if let Err(err) = placed {
            let _ = std::fs::remove_file(&self.dest);
            return Err(err);
        }

        self.events.emit(ScannerEvent::Extracted {
            tool: tool.clone(),
            dest: self.dest.clone(),
        });
        self.events.emit(ScannerEvent::InstallFinished { tool });
        Ok(())
    }
}
