//! Update notification
//!
//! Once per day the CLI asks crates.io whether a newer release exists and
//! logs a hint. The check runs as a detached task and never affects the
//! command being executed.

use eyre::{Context, OptionExt, Result};
use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use url::Url;

const REGISTRY_URL: &str = "https://crates.io/api/v1/crates/";
const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);

pub struct UpdateNotifier {
    package: String,
    current: Version,
    url: Url,
    state_file: PathBuf,
    interval: Duration,
}

impl UpdateNotifier {
    pub fn for_package(package: &str, version: &str) -> Result<Self> {
        let current = Version::parse(version)
            .with_context(|| format!("Invalid package version: {}", version))?;
        let url = Url::parse(REGISTRY_URL)?
            .join(package)
            .with_context(|| format!("Invalid package name: {}", package))?;

        Ok(Self {
            package: package.to_string(),
            current,
            url,
            state_file: std::env::temp_dir().join(format!("{}-update-check", package)),
            interval: CHECK_INTERVAL,
        })
    }

    /// Ask a different registry endpoint for the crate metadata
    pub fn with_registry_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Where the time of the last check is remembered
    pub fn with_state_file(mut self, path: impl AsRef<Path>) -> Self {
        self.state_file = path.as_ref().to_path_buf();
        self
    }

    /// True when no check happened within the interval
    pub fn is_due(&self, now: SystemTime) -> bool {
        let last = std::fs::read_to_string(&self.state_file)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));

        match last {
            Some(last) => now
                .duration_since(last)
                .map(|elapsed| elapsed >= self.interval)
                .unwrap_or(true),
            None => true,
        }
    }

    fn record_check(&self, now: SystemTime) -> Result<()> {
        let secs = now.duration_since(UNIX_EPOCH)?.as_secs();
        std::fs::write(&self.state_file, secs.to_string()).with_context(|| {
            format!("Failed to write update state: {}", self.state_file.display())
        })
    }

    /// Newer stable release, if one is published and a check is due.
    ///
    /// The check only counts as done once the registry has answered.
    pub async fn check(&self) -> Result<Option<Version>> {
        let now = SystemTime::now();
        if !self.is_due(now) {
            return Ok(None);
        }

        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", self.package, self.current))
            .build()?;
        let body: Value = client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let latest = body
            .pointer("/crate/max_stable_version")
            .and_then(Value::as_str)
            .ok_or_eyre("Registry response has no max_stable_version")?;
        self.record_check(now)?;
        Ok(newer_version(&self.current, latest))
    }

    /// Spawn the check on the current runtime.
    ///
    /// The task is dropped with the runtime, so callers should give the
    /// returned handle a moment to finish before exiting.
    pub fn notify(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            match self.check().await {
                Ok(Some(latest)) => log::info!(
                    "Update available {} → {}, run `cargo install {}` to update",
                    self.current,
                    latest,
                    self.package
                ),
                Ok(None) => {}
                Err(e) => log::debug!("Update check failed: {:#}", e),
            }
        })
    }
}

/// `latest` parsed, when it is greater than `current`
pub fn newer_version(current: &Version, latest: &str) -> Option<Version> {
    Version::parse(latest.trim_start_matches('v'))
        .ok()
        .filter(|latest| latest > current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_newer_version() {
        let current = Version::parse("0.3.0").unwrap();
        assert_eq!(
            newer_version(&current, "0.4.1"),
            Some(Version::parse("0.4.1").unwrap())
        );
        assert_eq!(newer_version(&current, "v0.3.1").unwrap().patch, 1);
        assert_eq!(newer_version(&current, "0.3.0"), None);
        assert_eq!(newer_version(&current, "0.2.9"), None);
        assert_eq!(newer_version(&current, "garbage"), None);
    }

    #[test]
    fn test_check_is_due_once_per_interval() {
        let temp = TempDir::new().unwrap();
        let notifier = UpdateNotifier::for_package("metasync", "0.3.0")
            .unwrap()
            .with_state_file(temp.path().join("state"));
        let now = SystemTime::now();

        assert!(notifier.is_due(now));
        notifier.record_check(now).unwrap();
        assert!(!notifier.is_due(now + Duration::from_secs(60)));
        assert!(notifier.is_due(now + CHECK_INTERVAL + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_failed_check_is_retried() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        let notifier = UpdateNotifier::for_package("metasync", "0.3.0")
            .unwrap()
            .with_registry_url(Url::parse("http://127.0.0.1:9/api/v1/crates/metasync").unwrap())
            .with_state_file(&state);

        assert!(notifier.check().await.is_err());
        assert!(!state.exists());
        assert!(notifier.is_due(SystemTime::now()));
    }

    #[test]
    fn test_registry_url() {
        let notifier = UpdateNotifier::for_package("metasync", "0.3.0").unwrap();
        assert_eq!(
            notifier.url.as_str(),
            "https://crates.io/api/v1/crates/metasync"
        );
        assert!(UpdateNotifier::for_package("metasync", "not-a-version").is_err());
    }
}
