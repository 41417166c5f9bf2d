//! Release-asset downloads into `~/.local/bin`.
//!
//! The asset is fetched into memory, checked against an optional pinned
//! SHA-256, unpacked when it is a `.tar.gz`/`.tgz`, and the binary is
//! staged beside its destination before an atomic rename.
use anyhow::{Context as _, Result, bail};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io::Read as _;
use std::path::Path;
use std::time::Duration;

use super::helpers::fs::write_atomic;
use super::probe::Probe;
use super::{Refresh, ResourceChange, Strategy};
use crate::config::phases::Category;
use crate::error::ResourceError;
use crate::phases::Context;

/// Number of download attempts.
const RETRY_COUNT: u32 = 3;

/// Seconds to wait between download attempts.
const RETRY_DELAY: u64 = 2;

/// Upper bound on a downloaded asset.
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Download a pinned release asset and install its binary.
#[derive(Debug, Clone)]
pub struct Archive {
    /// URL template (`{version}`, `{arch}`, `{deb_arch}`).
    pub url: String,
    /// Binary to extract, also the installed file name.
    pub binary: String,
    /// Optional expected SHA-256 (hex) of the download.
    pub sha256: Option<String>,
    /// The step's pinned version.
    pub version: Option<String>,
}

impl Archive {
    /// Concrete download URL for this platform.
    #[must_use]
    pub fn resolve_url(&self, ctx: &Context) -> String {
        ctx.render(&self.url, self.version.as_deref())
    }

    fn install(&self, ctx: &Context) -> Result<()> {
        let url = self.resolve_url(ctx);
        ctx.log.debug(&format!("downloading {url}"));
        let bytes = download(&url)?;
        if let Some(expected) = &self.sha256 {
            verify_sha256(&url, &bytes, expected)?;
        }
        let binary = if is_tarball(&url) {
            extract_binary(&bytes, &self.binary).ok_or_else(|| {
                ResourceError::BinaryNotInArchive {
                    binary: self.binary.clone(),
                    url: url.clone(),
                }
            })?
        } else {
            bytes
        };
        let dest = ctx.local_bin().join(&self.binary);
        write_atomic(&dest, &binary, Some(0o755))?;
        ctx.log
            .debug(&format!("installed {} to {}", self.binary, dest.display()));
        Ok(())
    }
}

impl Strategy for Archive {
    fn kind(&self) -> &'static str {
        "archive"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "download {} into {}",
            self.resolve_url(ctx),
            ctx.local_bin().display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        self.install(ctx)?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        self.install(ctx)?;
        Ok(Refresh::Refreshed)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Command {
            names: vec![self.binary.clone()],
        })
    }

    fn implied_category(&self) -> Category {
        Category::Package
    }

    fn is_versioned(&self) -> bool {
        true
    }
}

fn is_tarball(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".tar.gz") || path.ends_with(".tgz")
}

/// Fetch `url`, retrying transient failures.
fn download(url: &str) -> Result<Vec<u8>> {
    let mut last_err = None;
    for attempt in 1..=RETRY_COUNT {
        if attempt > 1 {
            std::thread::sleep(Duration::from_secs(RETRY_DELAY));
        }
        match fetch(url) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_err = Some(e),
        }
    }
    let reason = last_err.map_or_else(String::new, |e| format!("{e:#}"));
    bail!("download of {url} failed after {RETRY_COUNT} attempts: {reason}")
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let mut response = ureq::get(url)
        .call()
        .with_context(|| format!("GET {url}"))?;
    response
        .body_mut()
        .with_config()
        .limit(MAX_DOWNLOAD_BYTES)
        .read_to_vec()
        .with_context(|| format!("reading body of {url}"))
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

fn verify_sha256(url: &str, bytes: &[u8], expected: &str) -> Result<(), ResourceError> {
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ResourceError::ChecksumMismatch {
            url: url.to_string(),
            expected: expected.trim().to_string(),
            actual,
        })
    }
}

/// Find a regular file named `binary` anywhere in a gzipped tarball.
fn extract_binary(bytes: &[u8], binary: &str) -> Option<Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    for entry in archive.entries().ok()? {
        let mut entry = entry.ok()?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .is_some_and(|n| n == binary);
        if matches {
            let mut out = Vec::new();
            entry.read_to_end(&mut out).ok()?;
            return Some(out);
        }
    }
    None
}
