//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use course_harvest::config::{HarvestConfig, RecrawlPolicy, SiteProfile};

const DATA_DIR: &str = ".course-harvest";

/// Resolve the database path.
pub fn resolve_db_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var("COURSE_HARVEST_DB") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    let cwd_db = PathBuf::from(DATA_DIR).join("harvest.db");
    if cwd_db.exists() {
        return cwd_db;
    }

    data_dir().join("harvest.db")
}

/// Resolve the saved-cookie file path.
pub fn resolve_cookie_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var("COURSE_HARVEST_COOKIES") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    data_dir().join("cookies.json")
}

/// `~/.course-harvest`, or `./.course-harvest` without a home directory.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR))
}

/// Build the run configuration from command-line options.
pub fn load_config(
    profile: Option<&Path>,
    screenshots: Option<&Path>,
    atomic_recrawl: bool,
) -> anyhow::Result<HarvestConfig> {
    let profile = match profile {
        Some(path) => SiteProfile::from_file(path)
            .map_err(|e| anyhow::anyhow!("profile {}: {e}", path.display()))?,
        None => SiteProfile::default(),
    };

    Ok(HarvestConfig {
        profile,
        recrawl_policy: if atomic_recrawl {
            RecrawlPolicy::ReplaceOnSuccess
        } else {
            RecrawlPolicy::PreClear
        },
        screenshot_dir: screenshots.map(Path::to_path_buf),
        ..HarvestConfig::default()
    })
}
