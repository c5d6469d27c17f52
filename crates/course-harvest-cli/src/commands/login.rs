//! `course-harvest login`: sign in and optionally save the session cookies.

use anyhow::Result;
use std::path::Path;

use course_harvest::{authenticate, Credentials, HarvestConfig};

use super::{launch_browser, BrowserArgs};
use crate::output;

pub async fn run(
    args: &BrowserArgs,
    config: &HarvestConfig,
    save_cookies: Option<&Path>,
) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let browser = launch_browser(args).await?;

    if !output::is_json() {
        eprintln!("  Signing in as {}. Approve the sign-in on your phone when asked.", credentials.login_id);
    }
    let session = authenticate(browser, &credentials, config).await?;

    let saved = match save_cookies {
        Some(path) => Some((path, session.export_cookies(path, config).await?)),
        None => None,
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "landed_url": session.landed_url(),
            "authenticated_at": session.authenticated_at(),
            "cookies_saved": saved.map(|(_, n)| n),
            "cookie_file": saved.map(|(p, _)| p.display().to_string()),
        }));
        return Ok(());
    }

    println!("  Signed in: {}", session.landed_url());
    if let Some((path, count)) = saved {
        println!("  Saved {count} cookies to {}", path.display());
    }
    Ok(())
}
