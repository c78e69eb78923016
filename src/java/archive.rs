//! Source archives (`.tar.gz`) downloaded from GitHub, for repositories `git` cannot clone.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use tar::Archive;

use crate::github::json::repository::RestRepository;
use crate::java::filter_chain::SourceFetcher;
use crate::java::staging::remove_tree;
use crate::nested;
use crate::repominer_error::MineError;
use crate::repominer_metadata;

pub const GITHUB_BASE_URL: &str = "https://github.com";

/// Tried in order; `HEAD` resolves to the default branch.
const ARCHIVE_REFS: [&str; 3] = ["HEAD", "refs/heads/main", "refs/heads/master"];

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveDownloader {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ArchiveDownloader {
    fn default() -> Self {
        ArchiveDownloader {
            base_url: GITHUB_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ArchiveDownloader {
    pub fn archive_urls(&self, repository: &RestRepository) -> Vec<String> {
        ARCHIVE_REFS
            .iter()
            .map(|reference| {
                format!("{}/{}/archive/{}.tar.gz", self.base_url.trim_end_matches('/'), repository.full_name, reference)
            })
            .collect()
    }

    /// `None` when there is no archive for that ref.
    async fn download(&self, client: &Client, url: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let response = client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let archive = response.error_for_status()?.bytes().await?;

        Ok(Some(archive.to_vec()))
    }
}

#[async_trait]
impl SourceFetcher for ArchiveDownloader {
    async fn fetch(&self, repository: &RestRepository, target: &Path) -> Result<(), MineError> {
        let name = repository.full_name.as_str();
        let client = Client::builder()
            .user_agent(repominer_metadata::user_agent())
            .timeout(self.timeout)
            .build()
            .map_err(|e| MineError::CloneError {
                repository: name.to_string(),
                nested: nested!(e),
            })?;

        let mut last_failure = anyhow!("no archive requested");

        for url in self.archive_urls(repository) {
            debug!("Downloading [{}]...", url);

            let archive = match self.download(&client, &url).await {
                Ok(Some(archive)) => archive,
                Ok(None) => {
                    debug!("No archive at [{}].", url);
                    last_failure = anyhow!("no archive at {}", url);
                    continue;
                }
                Err(e) => {
                    warn!("Download of [{}] failed: {:#}", url, e);
                    last_failure = e;
                    continue;
                }
            };

            let destination = target.to_path_buf();
            let size = archive.len();
            match tokio::task::spawn_blocking(move || unpack_tarball(archive.as_slice(), &destination)).await {
                Ok(Ok(files)) => {
                    info!("[{}] unpacked from {} ({} bytes, {} file(s)).", name, url, size, files);
                    return Ok(());
                }
                Ok(Err(e)) => last_failure = anyhow!("could not unpack {}: {}", url, e),
                Err(e) => last_failure = anyhow!("unpacking {} was aborted: {}", url, e),
            }

            warn!("[{}]: {}", name, last_failure);

            if target.exists() {
                if let Err(e) = remove_tree(target) {
                    warn!("Could not remove partial archive [{}]: {}", target.display(), e);
                }
            }
        }

        Err(MineError::CloneError {
            repository: name.to_string(),
            nested: last_failure,
        })
    }
}

/// Unpacks the regular files and directories of a gzipped tarball into `target`, dropping the single
/// top-level directory GitHub wraps sources in. Returns the amount of files written.
pub fn unpack_tarball<R: Read>(reader: R, target: &Path) -> io::Result<usize> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    fs::create_dir_all(target)?;

    let mut files = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();

        if !entry_type.is_file() && !entry_type.is_dir() {
            continue;
        }

        let relative = match strip_top_level(&entry.path()?) {
            Some(relative) => relative,
            None => continue,
        };
        let destination = target.join(relative);

        if entry_type.is_dir() {
            fs::create_dir_all(&destination)?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&destination)?;
        files += 1;
    }

    Ok(files)
}

/// `wrapper/a/b` becomes `a/b`; the wrapper itself and anything that is not a plain relative path yield
/// `None`.
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();

    match components.next() {
        Some(Component::Normal(_)) => {}
        _ => return None,
    }

    let relative = components.as_path();
    let is_plain = relative.components().all(|component| matches!(component, Component::Normal(_)));

    if relative.as_os_str().is_empty() || !is_plain {
        None
    } else {
        Some(relative.to_path_buf())
    }
}
