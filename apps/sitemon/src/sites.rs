//! Loading of the monitored site list.
//!
//! The list is a JSON array of `{ "name": ..., "url": ... }` records, read
//! once at startup. URLs are not validated here; a malformed URL shows up
//! later as a failed check.

use std::path::{Path, PathBuf};
use std::{fs, io};

use thiserror::Error;
use tracing::{error, info};

use crate::monitoring::SiteConfig;

#[derive(Debug, Error)]
pub enum SitesError {
    #[error("failed to read sites file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse sites file {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// Read the site list, reporting why it could not be loaded
pub fn try_load_sites(path: &Path) -> Result<Vec<SiteConfig>, SitesError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| SitesError::Read { path: path.to_path_buf(), source })?;

    serde_json::from_str(&raw).map_err(|source| SitesError::Parse { path: path.to_path_buf(), source })
}

/// Read the site list, logging any failure and returning an empty list
/// instead.
pub fn load_sites(path: &Path) -> Vec<SiteConfig> {
    match try_load_sites(path) {
        Ok(sites) => {
            info!("Loaded {} sites from {}", sites.len(), path.display());
            sites
        }
        Err(e) => {
            error!("Error loading sites: {e}");
            Vec::new()
        }
    }
}
