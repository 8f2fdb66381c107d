//! `behave-cli` – operator shell for the behave arbitration engine.
//!
//! This binary:
//!
//! 1. Initialises structured logging (and OTLP export when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set).
//! 2. Checks for `~/.behave/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 3. Builds the demo engine on a simulated drive base.
//! 4. Drops the user into an **interactive REPL** with slash-commands
//!    (`/status`, `/run`, `/live`, `/activate`, `/cancel`, `/help`, …).
//! 5. Intercepts **Ctrl-C** to run the emergency procedures and exit safely.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

fn main() {
    let _telemetry = behave_runtime::init_tracing("behave");

    print_banner();

    // ── Shared flags ──────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let emergency = Arc::new(AtomicBool::new(false));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // The handler runs on its own thread; the engine is only touched by the
    // REPL thread, which polls `emergency` before every prompt.
    let shutdown_ctrlc = Arc::clone(&shutdown);
    let emergency_ctrlc = Arc::clone(&emergency);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – running emergency procedures …".yellow().bold());
        emergency_ctrlc.store(true, Ordering::SeqCst);
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; emergency stop on Ctrl-C will not be available"
        );
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let session = match repl::Session::new(&cfg, shutdown, emergency) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}: {}", "Startup failed".red(), e);
            std::process::exit(1);
        }
    };
    info!(
        behaviors = session.control().engine().table().len(),
        "engine ready"
    );

    println!();
    println!(
        "  {} behaviors registered. Type {} for a list of commands.\n",
        session.control().engine().table().len(),
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(session);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       behave First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up the simulated bot.\n");

    let mut cfg = config::Config::default();

    let raw = prompt_line(
        &format!("  Control period in ms [{}]: ", cfg.tick_period_ms),
        &cfg.tick_period_ms.to_string(),
    );
    if let Ok(ms) = raw.trim().parse::<u64>() {
        cfg.tick_period_ms = ms;
    }

    let raw = prompt_line(
        &format!("  Motionless ticks before a stall [{}]: ", cfg.stall_threshold),
        &cfg.stall_threshold.to_string(),
    );
    if let Ok(ticks) = raw.trim().parse::<u32>() {
        cfg.stall_threshold = ticks;
    }

    let raw = prompt_line("  Start patrolling on boot? [y/N]: ", "n");
    if raw.trim().eq_ignore_ascii_case("y") {
        cfg.behaviors.insert(
            "patrol".to_string(),
            behave_runtime::BehaviorOverride {
                priority: None,
                active: Some(true),
            },
        );
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __       __                   "#.bold().cyan());
    println!("{}", r#"  / /  ___ / /  ___ __  _____    "#.bold().cyan());
    println!("{}", r#" / _ \/ -_) _ \/ _ `/ |/ / -_)   "#.bold().cyan());
    println!("{}", r#"/_.__/\__/_//_/\_,_/|___/\__/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "behave".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Behavior arbitration for the c't-Bot");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
