//! Course Harvest: entry point.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing::Instrument;

use course_harvest::{HarvestFilter, DEFAULT_DRIFT_THRESHOLD};
use course_harvest_cli::commands::{self, BrowserArgs};
use course_harvest_cli::config::{load_config, resolve_cookie_path, resolve_db_path};
use course_harvest_cli::output;

#[derive(Parser)]
#[command(
    name = "course-harvest",
    about = "Course Harvest collects enrolled course progress and curricula into SQLite",
    version,
    after_help = "Credentials come from COURSE_HARVEST_LOGIN_ID and COURSE_HARVEST_SECRET_FILE (or COURSE_HARVEST_SECRET)."
)]
struct Cli {
    /// SQLite database (default: $COURSE_HARVEST_DB, ./.course-harvest/harvest.db,
    /// then ~/.course-harvest/harvest.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Site profile JSON overriding the built-in URLs and selectors.
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Output results as JSON (machine-readable).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and optionally save the session cookies.
    Login {
        #[command(flatten)]
        browser: BrowserArgs,

        /// Write the signed-in cookies here
        /// (default with no value: the resolved cookie path).
        #[arg(long, num_args = 0..=1)]
        save_cookies: Option<Option<PathBuf>>,
    },

    /// Refresh the stored course list from the site.
    Discover {
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Harvest progress and curricula.
    Harvest {
        #[command(flatten)]
        browser: BrowserArgs,

        /// Only this course.
        #[arg(long)]
        course_id: Option<i64>,

        /// Only courses flagged with `target`.
        #[arg(long)]
        target_only: bool,

        /// Skip courses updated in the last 24 hours.
        #[arg(long)]
        skip_recent: bool,

        /// Use the stored course list without visiting the listing page.
        #[arg(long)]
        no_discover: bool,
    },

    /// Re-harvest courses whose lectures drift from their declared total.
    Recrawl {
        #[command(flatten)]
        browser: BrowserArgs,

        /// Drift ratio above which a course is re-harvested.
        #[arg(long, default_value_t = DEFAULT_DRIFT_THRESHOLD)]
        threshold: f64,

        /// Keep existing lectures until each course is harvested again.
        #[arg(long)]
        atomic: bool,
    },

    /// Report drifted courses without touching the site.
    Drift {
        #[arg(long, default_value_t = DEFAULT_DRIFT_THRESHOLD)]
        threshold: f64,
    },

    /// Flag or unflag a course for `harvest --target-only`.
    Target {
        course_id: i64,

        #[arg(long)]
        unset: bool,
    },

    /// List stored courses.
    Courses,

    /// Check that Chromium, the database and credentials are ready.
    Doctor {
        #[arg(long)]
        cookies: Option<PathBuf>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   course-harvest completions bash > ~/.local/share/bash-completion/completions/course-harvest
    ///   course-harvest completions zsh > ~/.zfunc/_course-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    output::set_json(cli.json);

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", id = %run_id);
    let result = dispatch(cli).instrument(span).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    let db = resolve_db_path(cli.db.as_deref());
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Login {
            browser,
            save_cookies,
        } => {
            let config = load_config(profile, browser.screenshots.as_deref(), false)?;
            let target = save_cookies.map(|p| resolve_cookie_path(p.as_deref()));
            commands::login::run(&browser, &config, target.as_deref()).await
        }

        Commands::Discover { browser } => {
            let config = load_config(profile, browser.screenshots.as_deref(), false)?;
            commands::discover::run(&db, &browser, &config).await
        }

        Commands::Harvest {
            browser,
            course_id,
            target_only,
            skip_recent,
            no_discover,
        } => {
            let config = load_config(profile, browser.screenshots.as_deref(), false)?;
            let filter = HarvestFilter {
                course_id,
                target_only,
                skip_recent,
                discover: !no_discover,
            };
            commands::harvest::run(&db, &browser, &config, &filter).await
        }

        Commands::Recrawl {
            browser,
            threshold,
            atomic,
        } => {
            let config = load_config(profile, browser.screenshots.as_deref(), atomic)?;
            commands::harvest::run_recrawl(&db, &browser, &config, threshold).await
        }

        Commands::Drift { threshold } => commands::drift::run(&db, threshold),

        Commands::Target { course_id, unset } => commands::target::run(&db, course_id, unset),

        Commands::Courses => commands::courses::run(&db),

        Commands::Doctor { cookies } => commands::doctor::run(&db, cookies.as_deref()),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "course-harvest", &mut std::io::stdout());
            Ok(())
        }
    }
}
