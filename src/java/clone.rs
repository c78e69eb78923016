use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, warn};

use crate::github::json::repository::RestRepository;
use crate::java::filter_chain::SourceFetcher;
use crate::java::process::{is_missing_program, run_bounded};
use crate::java::staging::remove_tree;
use crate::nested;
use crate::repominer_error::MineError;

const GIT: &str = "git";

/// Shallow `git clone` with a bounded amount of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct GitCloner {
    pub attempts: u32,
    pub pause: Duration,
    pub timeout: Duration,
}

impl Default for GitCloner {
    fn default() -> Self {
        GitCloner {
            attempts: 2,
            pause: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

#[async_trait]
impl SourceFetcher for GitCloner {
    async fn fetch(&self, repository: &RestRepository, target: &Path) -> Result<(), MineError> {
        let attempts = self.attempts.max(1);
        let mut last_failure = anyhow!("no clone attempted");

        for attempt in 1..=attempts {
            debug!("Cloning [{}] (attempt {}/{})...", repository.full_name, attempt, attempts);

            let args = [
                OsStr::new("clone"),
                OsStr::new("--depth"),
                OsStr::new("1"),
                OsStr::new("--quiet"),
                OsStr::new(&repository.clone_url),
                target.as_os_str(),
            ];

            match run_bounded(GIT, args, &[("GIT_TERMINAL_PROMPT", "0")], self.timeout).await {
                Ok(output) if output.success() => return Ok(()),
                Ok(output) => {
                    last_failure = anyhow!("git exited with {:?}: {}", output.exit_code, output.last_error_line())
                }
                Err(e) if is_missing_program(&e) => {
                    warn!("git is not available; [{}] cannot be cloned.", repository.full_name);
                    last_failure = e;
                    break;
                }
                Err(e) => last_failure = e,
            }

            warn!("Clone of [{}] failed: {}", repository.full_name, last_failure);

            if target.exists() {
                if let Err(e) = remove_tree(target) {
                    warn!("Could not remove partial clone [{}]: {}", target.display(), e);
                }
            }

            if attempt < attempts && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        Err(MineError::CloneError {
            repository: repository.full_name.clone(),
            nested: last_failure,
        })
    }
}

/// Tries `primary` first and `fallback` once `primary` gave up, starting from an empty target.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackFetcher<P: SourceFetcher, S: SourceFetcher> {
    pub primary: P,
    pub fallback: S,
}

#[async_trait]
impl<P: SourceFetcher, S: SourceFetcher> SourceFetcher for FallbackFetcher<P, S> {
    async fn fetch(&self, repository: &RestRepository, target: &Path) -> Result<(), MineError> {
        let primary_failure = match self.primary.fetch(repository, target).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        warn!("[{}] falling back to a source archive: {}", repository.full_name, primary_failure);

        if target.exists() {
            remove_tree(target).map_err(|e| MineError::IoError {
                msg: format!("Could not clear [{}] for the fallback fetch", target.display()),
                nested: nested!(e),
            })?;
        }

        self.fallback.fetch(repository, target).await
    }
}
