//! Deterministic output locations for comparison artifacts
//!
//! Every comparison writes three sibling files under a per-domain directory:
//! `<base>_old.png`, `<base>_new.png`, `<base>_diff.png`. Repeated calls for
//! the same URL always yield the same location.

use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Error, Result};
use crate::types::ArtifactPaths;

/// Resolved output locations for one comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Absolute directory the artifacts are written to
    pub dir: PathBuf,

    /// Filename stem shared by the three artifacts
    pub base: String,

    /// Directory path relative to the serving root
    pub rel_dir: String,
}

impl OutputPaths {
    pub fn old_image(&self) -> PathBuf {
        self.dir.join(format!("{}_old.png", self.base))
    }

    pub fn new_image(&self) -> PathBuf {
        self.dir.join(format!("{}_new.png", self.base))
    }

    pub fn diff_image(&self) -> PathBuf {
        self.dir.join(format!("{}_diff.png", self.base))
    }

    /// Serving-root-relative paths for the three artifacts
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            old: format!("{}/{}_old.png", self.rel_dir, self.base),
            new: format!("{}/{}_new.png", self.rel_dir, self.base),
            diff: format!("{}/{}_diff.png", self.rel_dir, self.base),
        }
    }
}

/// Derive the output locations for a URL, creating the directory
pub fn derive(output_root: &Path, url: &str) -> Result<OutputPaths> {
    let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

    let domain = match parsed.port() {
        Some(port) => slugify(&format!("{host}-{port}")),
        None => slugify(host),
    };

    let path = parsed.path();
    let base = if path.is_empty() || path == "/" {
        "index".to_string()
    } else {
        slugify(path)
    };

    let dir = output_root.join(&domain);
    std::fs::create_dir_all(&dir)?;

    Ok(OutputPaths {
        dir,
        base,
        rel_dir: domain,
    })
}

/// Lowercase the input and collapse every run of non-alphanumerics into `-`
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
