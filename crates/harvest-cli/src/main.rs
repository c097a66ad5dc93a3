//! `harvest-cli` – vessel harvesting tutor console.
//!
//! This binary:
//!
//! 1. Loads `~/.harvest/config.toml` (defaults when absent) and applies the
//!    `HARVEST_*` environment overrides.
//! 2. Installs the configured scene manifest, if any.
//! 3. Drops the user into an **interactive REPL** that drives the session
//!    (`/start`, `/stop`, `/reset`, `/export`) and injects tracker poses.
//! 4. Intercepts **Ctrl-C** so the running session is stopped and reported
//!    before exit.

mod config;
mod manifest;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

fn main() {
    // RUST_LOG filter, HARVEST_LOG_FORMAT=json for machine-readable logs.
    // User-facing output still uses println!.
    harvest_runtime::init_tracing();

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – press Enter to stop the session and exit."
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the session will not be stopped on Ctrl-C");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    println!(
        "  Jaw clamp {}°–{}°, debounce {} ms, branch cut distance {}",
        cfg.tutor.jaw.clamp_low_deg,
        cfg.tutor.jaw.clamp_high_deg,
        cfg.tutor.scoring.debounce_ms,
        cfg.tutor.scoring.branch_cut_distance
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(shutdown, cfg);
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  _                           _   "#.bold().cyan());
    println!("{}", r#" | |__   __ _ _ ____   _____ ___| |_ "#.bold().cyan());
    println!("{}", r#" | '_ \ / _` | '__\ \ / / _ / __| __|"#.bold().cyan());
    println!("{}", r#" | | | | (_| | |   \ V /  __\__ \ |_ "#.bold().cyan());
    println!("{}", r#" |_| |_|\__,_|_|    \_/ \___|___/\__|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Harvest".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Endoscopic vessel harvesting tutor");
    println!();
}
