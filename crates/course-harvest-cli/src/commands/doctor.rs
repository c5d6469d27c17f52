//! Environment readiness check.

use anyhow::Result;
use std::path::Path;

use course_harvest::{find_chromium, Credentials};

use crate::config::resolve_cookie_path;
use crate::output;

/// Check Chromium, the database location, credentials and saved cookies.
pub fn run(db: &Path, cookies: Option<&Path>) -> Result<()> {
    let chromium = find_chromium();
    let db_dir = db
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let db_ready = db.exists() || db_dir.exists() || std::fs::create_dir_all(db_dir).is_ok();
    let credentials = Credentials::from_env();
    let cookie_path = resolve_cookie_path(cookies);
    let cookies_saved = cookie_path.exists();
    let ready = chromium.is_some() && db_ready && (credentials.is_ok() || cookies_saved);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "database": db.display().to_string(),
            "database_exists": db.exists(),
            "credentials": credentials.is_ok(),
            "cookie_file": cookie_path.display().to_string(),
            "cookies_saved": cookies_saved,
            "ready": ready,
        }));
        return Ok(());
    }

    println!("Course Harvest Doctor");
    println!("=====================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set COURSE_HARVEST_CHROMIUM_PATH or install Chrome."),
    }

    if db.exists() {
        println!("[OK] Database: {}", db.display());
    } else if db_ready {
        println!("[OK] Database will be created at {}", db.display());
    } else {
        println!("[!!] Database directory not writable: {}", db_dir.display());
    }

    match &credentials {
        Ok(c) => println!("[OK] Credentials for {}", c.login_id),
        Err(e) => println!("[??] Credentials: {e}"),
    }

    if cookies_saved {
        println!("[OK] Saved cookies: {}", cookie_path.display());
    } else {
        println!("[??] No saved cookies at {}", cookie_path.display());
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        if credentials.is_err() && !cookies_saved {
            println!("  Set COURSE_HARVEST_LOGIN_ID and COURSE_HARVEST_SECRET_FILE, or run `course-harvest login --save-cookies`.");
        }
    }
    Ok(())
}
