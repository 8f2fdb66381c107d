//! REPL – Read-Eval-Print Loop for the behave operator shell.
//!
//! Supported slash-commands:
//!   /help                   – show this list
//!   /status [json]          – behavior table and drive state
//!   /run <ticks>            – step the control loop in simulated time
//!   /live <secs>            – step in real time (Ctrl-C stops early)
//!   /activate <name>        – switch a behavior on
//!   /deactivate <name>      – switch a behavior off
//!   /toggle <name>          – flip a behavior in the visible band
//!   /cancel <name>          – tear down the chain a caller started
//!   /reset                  – stop every visible behavior
//!   /target <l> <r>         – operator base speed, mm/s
//!   /obstacle <l_mm> <r_mm> – front distance readings
//!   /border <l> <r>         – floor sensor readings
//!   /emergency              – run the emergency procedures
//!   /quit | /exit           – leave the shell

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use behave_kernel::Engine;
use behave_runtime::ControlLoop;
use behave_types::{BehaviorId, BehaviorStatus, Speed, SubResult};

use crate::config::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

/// One parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status { json: bool },
    Run(u64),
    Live(u64),
    Activate(String),
    Deactivate(String),
    Toggle(String),
    Cancel(String),
    Reset,
    Target(Speed, Speed),
    Obstacle(i16, i16),
    Border(i16, i16),
    Emergency,
    Quit,
}

/// Parse one input line.  The error is a user-facing message.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let cmd = match head {
        "/help" => Command::Help,
        "/status" => match args.as_slice() {
            [] => Command::Status { json: false },
            ["json"] => Command::Status { json: true },
            _ => return Err("usage: /status [json]".to_string()),
        },
        "/run" => Command::Run(one_number(&args, "/run <ticks>")?),
        "/live" => Command::Live(one_number(&args, "/live <secs>")?),
        "/activate" => Command::Activate(one_name(&args, "/activate <name>")?),
        "/deactivate" => Command::Deactivate(one_name(&args, "/deactivate <name>")?),
        "/toggle" => Command::Toggle(one_name(&args, "/toggle <name>")?),
        "/cancel" => Command::Cancel(one_name(&args, "/cancel <name>")?),
        "/reset" => Command::Reset,
        "/target" => {
            let (l, r) = two_numbers(&args, "/target <left> <right>")?;
            Command::Target(l, r)
        }
        "/obstacle" => {
            let (l, r) = two_numbers(&args, "/obstacle <left_mm> <right_mm>")?;
            Command::Obstacle(l, r)
        }
        "/border" => {
            let (l, r) = two_numbers(&args, "/border <left> <right>")?;
            Command::Border(l, r)
        }
        "/emergency" => Command::Emergency,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(cmd)
}

fn one_number(args: &[&str], usage: &str) -> Result<u64, String> {
    match args {
        [n] => n.parse().map_err(|_| format!("usage: {}", usage)),
        _ => Err(format!("usage: {}", usage)),
    }
}

fn one_name(args: &[&str], usage: &str) -> Result<String, String> {
    match args {
        [name] => Ok((*name).to_string()),
        _ => Err(format!("usage: {}", usage)),
    }
}

fn two_numbers(args: &[&str], usage: &str) -> Result<(i16, i16), String> {
    match args {
        [l, r] => match (l.parse::<i16>(), r.parse::<i16>()) {
            (Ok(l), Ok(r)) => Ok((l, r)),
            _ => Err(format!("usage: {}", usage)),
        },
        _ => Err(format!("usage: {}", usage)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one shell session drives: the control loop, a runtime for
/// `/live`, and the flags raised by the Ctrl-C handler.
pub struct Session {
    control: ControlLoop,
    runtime: tokio::runtime::Runtime,
    shutdown: Arc<AtomicBool>,
    emergency: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        cfg: &Config,
        shutdown: Arc<AtomicBool>,
        emergency: Arc<AtomicBool>,
    ) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start the async runtime: {}", e))?;
        Ok(Self {
            control: ControlLoop::new(cfg.to_loop_config()),
            runtime,
            shutdown,
            emergency,
        })
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    /// Run the emergency procedures if the Ctrl-C handler asked for it.
    fn poll_emergency(&mut self) {
        if self.emergency.swap(false, Ordering::SeqCst) {
            let ran = self.control.emergency();
            println!(
                "  {} {} emergency procedure(s) executed.",
                "✓".green(),
                ran
            );
        }
    }

    fn lookup(&self, name: &str) -> Result<BehaviorId, String> {
        self.control
            .engine()
            .find(name)
            .ok_or_else(|| format!("no behavior named '{}'", name))
    }

    /// Execute everything except `/quit`, which the loop handles.
    pub fn execute(&mut self, cmd: Command) -> Result<(), String> {
        match cmd {
            Command::Help => cmd_help(),
            Command::Status { json } => self.cmd_status(json)?,
            Command::Run(ticks) => self.cmd_run(ticks)?,
            Command::Live(secs) => self.cmd_live(secs)?,
            Command::Activate(name) => {
                let id = self.lookup(&name)?;
                self.control.engine_mut().activate(id).map_err(|e| e.to_string())?;
                println!("  {} {}", name.bold(), "active".green());
            }
            Command::Deactivate(name) => {
                let id = self.lookup(&name)?;
                self.control.engine_mut().deactivate(id).map_err(|e| e.to_string())?;
                println!("  {} {}", name.bold(), "inactive".dimmed());
            }
            Command::Toggle(name) => {
                let id = self.lookup(&name)?;
                let on = self.control.engine_mut().toggle(id).map_err(|e| e.to_string())?;
                let state = if on { "active".green() } else { "inactive".dimmed() };
                println!("  {} {}", name.bold(), state);
            }
            Command::Cancel(name) => {
                let id = self.lookup(&name)?;
                let stopped = self
                    .control
                    .engine_mut()
                    .cancel_chain(id)
                    .map_err(|e| e.to_string())?;
                println!("  Cancelled {} behavior(s) started by {}.", stopped, name.bold());
            }
            Command::Reset => {
                let stopped = self.control.engine_mut().deactivate_all();
                println!("  Stopped {} visible behavior(s).", stopped);
            }
            Command::Target(l, r) => {
                self.control.drive_mut().set_target(l, r);
                println!("  Target speed {} / {} mm/s", l, r);
            }
            Command::Obstacle(l, r) => {
                self.control.drive_mut().set_distances(l, r);
                println!("  Distance sensors {} / {} mm", l, r);
            }
            Command::Border(l, r) => {
                self.control.drive_mut().set_border(l, r);
                println!("  Border sensors {} / {}", l, r);
            }
            Command::Emergency => {
                let ran = self.control.emergency();
                println!("  {} {} emergency procedure(s) executed.", "⚠".yellow(), ran);
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn cmd_status(&self, json: bool) -> Result<(), String> {
        let rows = self.control.engine().snapshot();
        if json {
            let raw = serde_json::to_string_pretty(&rows)
                .map_err(|e| format!("Failed to serialize status: {}", e))?;
            println!("{}", raw);
            return Ok(());
        }

        println!("{}", "Behaviors".bold().underline());
        for row in &rows {
            println!("  {}", format_row(row));
        }
        let frame = self.control.drive().frame();
        let (wl, wr) = self.control.drive().wheel_speeds();
        println!("{}", "Drive".bold().underline());
        println!("  tick      {}", frame.tick);
        println!("  target    {} / {} mm/s", frame.target_left, frame.target_right);
        println!("  wheels    {} / {} mm/s", wl, wr);
        println!("  encoders  {} / {}", frame.encoder_left, frame.encoder_right);
        println!("  distance  {} / {} mm", frame.dist_left_mm, frame.dist_right_mm);
        println!("  border    {} / {}", frame.border_left, frame.border_right);
        Ok(())
    }

    fn cmd_run(&mut self, ticks: u64) -> Result<(), String> {
        let summary = self.control.run(ticks).map_err(|e| e.to_string())?;
        let (wl, wr) = self.control.drive().wheel_speeds();
        println!(
            "  Ran {} tick(s); wheels {} / {} mm/s.",
            summary.ticks, wl, wr
        );
        if let Some(winner) = summary.last.and_then(|r| r.cycle.winner) {
            println!("  Last winner: {}", behavior_name(self.control.engine(), winner).bold());
        }
        if summary.stalls > 0 {
            println!(
                "  {} {} stall(s) detected.",
                "⚠".yellow(),
                summary.stalls
            );
        }
        Ok(())
    }

    fn cmd_live(&mut self, secs: u64) -> Result<(), String> {
        let start = self.control.drive().frame().tick;
        let shutdown = Arc::clone(&self.shutdown);
        let control = &mut self.control;
        println!(
            "  Running live for {}s at {} ms per tick …",
            secs,
            control.tick_period().as_millis()
        );
        let result = self.runtime.block_on(async {
            tokio::select! {
                res = control.run_until(shutdown) => res.map(|_| ()),
                _ = tokio::time::sleep(Duration::from_secs(secs)) => Ok(()),
            }
        });
        result.map_err(|e| e.to_string())?;
        let ticks = self.control.drive().frame().tick - start;
        println!("  Ran {} tick(s) live.", ticks);
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("control", &self.control)
            .finish()
    }
}

fn behavior_name(engine: &Engine, id: BehaviorId) -> String {
    engine
        .table()
        .record(id)
        .map(|r| r.name().to_string())
        .unwrap_or_else(|_| id.to_string())
}

fn format_row(row: &BehaviorStatus) -> String {
    let marker = if row.active { "●".green() } else { "○".dimmed() };
    let result = match row.result {
        SubResult::Success => "success".normal(),
        SubResult::Fail => "fail".red(),
        SubResult::Running => "running".yellow(),
        SubResult::Cancel => "cancel".magenta(),
    };
    let name = if row.visible {
        row.name.bold()
    } else {
        row.name.dimmed()
    };
    let caller = row
        .caller
        .as_deref()
        .map(|c| format!(" ← {}", c))
        .unwrap_or_default();
    format!("{} {:>3} {:<16} {}{}", marker, row.priority, name, result, caller)
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Push a command line into the editor history; a failure is only logged.
fn remember(history: &mut impl History, line: &str) {
    if let Err(e) = history.add(line) {
        debug!(error = %e, "history entry not recorded");
    }
}

/// Entry point for the interactive REPL.
///
/// The shutdown and emergency flags are polled before each prompt.  Ctrl-C
/// at the prompt behaves like Ctrl-C anywhere else: emergency, then exit.
pub fn run(mut session: Session) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Failed to open the terminal".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "behave>".bold().cyan());

    loop {
        session.poll_emergency();
        if session.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "⚠  Ctrl-C – running emergency procedures …".yellow().bold());
                session.emergency.store(true, Ordering::SeqCst);
                session.shutdown.store(true, Ordering::SeqCst);
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        remember(editor.history_mut(), cmd);

        match parse_command(cmd) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                session.shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(command) => {
                if let Err(e) = session.execute(command) {
                    println!("{} {}", "Error:".red(), e);
                }
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e,
                "/help".bold()
            ),
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "behave Commands".bold().underline());
    let rows = [
        ("/status [json]", "behavior table and drive state"),
        ("/run <ticks>", "step the control loop in simulated time"),
        ("/live <secs>", "step in real time, Ctrl-C stops"),
        ("/activate <name>", "switch a behavior on"),
        ("/deactivate <name>", "switch a behavior off"),
        ("/toggle <name>", "flip a behavior in the visible band"),
        ("/cancel <name>", "tear down the chain a caller started"),
        ("/reset", "stop every visible behavior"),
        ("/target <l> <r>", "operator base speed, mm/s"),
        ("/obstacle <l> <r>", "front distance readings, mm"),
        ("/border <l> <r>", "floor sensor readings"),
        ("/emergency", "run the emergency procedures"),
        ("/quit  /exit", "leave the shell"),
    ];
    for (cmd, what) in rows {
        println!("  {:<20} – {}", cmd.bold().cyan(), what);
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
