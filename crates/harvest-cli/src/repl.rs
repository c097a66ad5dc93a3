//! REPL – Read-Eval-Print Loop for the tutor console.
//!
//! Supported slash-commands:
//!   /help                     – show this list
//!   /load [scene.toml]        – install a scene manifest
//!   /start                    – begin a new session
//!   /stop                     – stop and print the report
//!   /reset                    – clear metrics and branch flags
//!   /sensor rx ry rz          – inject a trigger rotation (degrees)
//!   /move node x y z [rx ry rz] – move a tracked frame
//!   /tick                     – run one periodic sampling step
//!   /status                   – show jaw state and running metrics
//!   /export [path]            – append the report to a CSV file
//!   /quit | /exit             – stop the session and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use harvest_runtime::{CycleReport, SessionController, SessionObserver};
use harvest_scoring::BranchCut;
use harvest_types::{MetricsReport, MetricsSnapshot};
use nalgebra::{Matrix4, Rotation3, Vector3};
use tracing::warn;

use crate::config::Config;
use crate::manifest::Manifest;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Load(Option<PathBuf>),
    Start,
    Stop,
    Reset,
    Sensor([f64; 3]),
    Move {
        node: String,
        translation: [f64; 3],
        rotation_deg: [f64; 3],
    },
    Tick,
    Status,
    Export(Option<PathBuf>),
    Quit,
}

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = parts.collect();

    let cmd = match (head, args.as_slice()) {
        ("/help", []) => Command::Help,
        ("/load", []) => Command::Load(None),
        ("/load", [path]) => Command::Load(Some(PathBuf::from(path))),
        ("/start", []) => Command::Start,
        ("/stop", []) => Command::Stop,
        ("/reset", []) => Command::Reset,
        ("/sensor", [x, y, z]) => Command::Sensor(parse_triple(x, y, z)?),
        ("/move", [node, x, y, z]) => Command::Move {
            node: node.to_string(),
            translation: parse_triple(x, y, z)?,
            rotation_deg: [0.0; 3],
        },
        ("/move", [node, x, y, z, rx, ry, rz]) => Command::Move {
            node: node.to_string(),
            translation: parse_triple(x, y, z)?,
            rotation_deg: parse_triple(rx, ry, rz)?,
        },
        ("/tick", []) => Command::Tick,
        ("/status", []) => Command::Status,
        ("/export", []) => Command::Export(None),
        ("/export", [path]) => Command::Export(Some(PathBuf::from(path))),
        ("/quit" | "/exit", []) => Command::Quit,
        ("/sensor" | "/move", _) => return Err(format!("wrong arguments for {head}")),
        _ => return Err(format!("unknown command '{head}'")),
    };
    Ok(cmd)
}

fn parse_triple(x: &str, y: &str, z: &str) -> Result<[f64; 3], String> {
    let parse = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{s}' is not a number"))
    };
    Ok([parse(x)?, parse(y)?, parse(z)?])
}

fn pose(translation: [f64; 3], rotation_deg: [f64; 3]) -> Matrix4<f64> {
    let [r, p, y] = rotation_deg;
    Matrix4::new_translation(&Vector3::from(translation))
        * Rotation3::from_euler_angles(r.to_radians(), p.to_radians(), y.to_radians())
            .to_homogeneous()
}

// ─────────────────────────────────────────────────────────────────────────────
// Console observer
// ─────────────────────────────────────────────────────────────────────────────

struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_branch_cut(&mut self, cut: &BranchCut) {
        println!(
            "  {} branch {} cut ({:.1} from centreline)",
            "✂".green().bold(),
            cut.id.bold(),
            cut.distance
        );
    }

    fn on_session_stopped(&mut self, report: &MetricsReport) {
        println!("{}", "Session Report".bold().underline());
        println!("  Session   : {}", report.session_id.to_string().dimmed());
        println!("  Elapsed   : {:.1} s", report.elapsed.as_secs_f64());
        print_metrics(&report.metrics);
        for flag in &report.branches {
            let state = if flag.cut { "cut".green() } else { "open".yellow() };
            println!("  Branch {:<4}: {}", flag.id, state);
        }
    }
}

fn print_metrics(m: &MetricsSnapshot) {
    println!("  Samples   : {}", m.sample_count);
    println!(
        "  Angle     : {:.1}° – {:.1}°",
        m.min_angle_deg, m.max_angle_deg
    );
    if m.min_distance.is_finite() {
        println!("  Distance  : {:.2} – {:.2}", m.min_distance, m.max_distance);
    } else {
        println!("  Distance  : {}", "no closed-jaw samples".dimmed());
    }
    println!(
        "  Trajectory: y = {:.3}·x + {:.3}",
        m.trajectory_slope, m.trajectory_intercept
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// REPL
// ─────────────────────────────────────────────────────────────────────────────

struct Console {
    tutor: SessionController,
    config: Config,
    scene_loaded: bool,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL stops any running
/// session and exits.
pub fn run(shutdown: Arc<AtomicBool>, config: Config) {
    let mut tutor = match SessionController::new(config.tutor.clone()) {
        Ok(t) => t,
        Err(e) => {
            println!("{}: {}", "Invalid tutor configuration".red(), e);
            return;
        }
    };
    tutor.add_observer(Box::new(ConsoleObserver));
    let mut console = Console {
        tutor,
        config,
        scene_loaded: false,
    };
    if console.config.scene.is_some() {
        console.load(None);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let prompt = if console.tutor.is_running() {
            "harvest●>".bold().green()
        } else {
            "harvest>".bold().cyan()
        };
        print!("{} ", prompt);
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match parse_command(cmd) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(command) => console.dispatch(command),
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e.yellow(),
                "/help".bold()
            ),
        }
    }

    // Ctrl-C or /quit: never leave a session half-recorded.
    console.tutor.stop(Instant::now());
    shutdown.store(true, Ordering::SeqCst);
}

impl Console {
    fn dispatch(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Help => cmd_help(),
            Command::Load(path) => self.load(path),
            Command::Start => match self.tutor.start(now) {
                Ok(id) => println!("{} session {}", "▶ Started".green().bold(), id),
                Err(e) => println!("{}: {}", "Cannot start".red(), e),
            },
            Command::Stop => {
                if self.tutor.stop(now).is_none() {
                    println!("{}", "No session is running.".dimmed());
                }
            }
            Command::Reset => {
                self.tutor.reset();
                println!("{}", "✓ Metrics and branches reset.".green());
            }
            Command::Sensor(rotation_deg) => {
                let cycle = self.tutor.update_sensor(pose([0.0; 3], rotation_deg), now);
                print_cycle(&cycle);
            }
            Command::Move {
                node,
                translation,
                rotation_deg,
            } => {
                let cycle = self
                    .tutor
                    .update_node(&node, pose(translation, rotation_deg), now);
                print_cycle(&cycle);
            }
            Command::Tick => print_cycle(&self.tutor.tick(now)),
            Command::Status => self.status(),
            Command::Export(path) => {
                let target = path.unwrap_or_else(|| self.config.export_dir.clone());
                match self.tutor.export(&target, now) {
                    Ok(written) => println!(
                        "{} {}",
                        "✓ Metrics exported to".green(),
                        written.display().to_string().bold()
                    ),
                    Err(e) => println!("{}: {}", "Export failed".red(), e),
                }
            }
            Command::Quit => {}
        }
    }

    fn load(&mut self, path: Option<PathBuf>) {
        let Some(path) = path.or_else(|| self.config.scene.clone()) else {
            println!(
                "{} no scene given and none configured in {}",
                "Error:".red(),
                crate::config::config_path().display()
            );
            return;
        };
        let installed = Manifest::load(&path)
            .and_then(Manifest::into_assets)
            .and_then(|mut assets| self.tutor.install(&mut assets));
        match installed {
            Ok(()) => {
                self.scene_loaded = true;
                println!(
                    "{} {}",
                    "✓ Scene installed from".green(),
                    path.display().to_string().bold()
                );
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "scene install failed");
                println!("{}: {}", "Scene error".red(), e);
            }
        }
    }

    fn status(&self) {
        println!("{}", "Tutor Status".bold().underline());
        let scene = if self.scene_loaded {
            "installed".green()
        } else {
            "not loaded".yellow()
        };
        println!("  Scene     : {}", scene);
        let session = match (self.tutor.is_running(), self.tutor.session_id()) {
            (true, Some(id)) => format!("running ({id})").green(),
            (false, Some(id)) => format!("stopped ({id})").yellow(),
            _ => "idle".dimmed(),
        };
        println!("  Session   : {}", session);
        match self.tutor.jaw_state() {
            Some(jaw) => println!(
                "  Jaw       : trigger {:.1}°, opening {:.1}°",
                jaw.raw_angle_deg, jaw.open_angle_deg
            ),
            None => println!("  Jaw       : {}", "unsolved".dimmed()),
        }
        print_metrics(&self.tutor.snapshot());
    }
}

fn print_cycle(cycle: &CycleReport) {
    if let Some(jaw) = cycle.jaw {
        println!(
            "  jaw: trigger {:.1}° → opening {:.1}°",
            jaw.raw_angle_deg, jaw.open_angle_deg
        );
    }
    if cycle.sampled {
        println!("  {}", "sample recorded".dimmed());
    }
    for (metric, error) in &cycle.skipped {
        println!("  {} {:?}: {}", "skipped".yellow(), metric, error);
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Tutor Commands".bold().underline());
    println!("  {}          – install a scene manifest", "/load [file]".bold().cyan());
    println!("  {}                – begin a new session", "/start".bold().cyan());
    println!("  {}                 – stop and print the report", "/stop".bold().cyan());
    println!("  {}                – clear metrics and branch flags", "/reset".bold().cyan());
    println!("  {}      – inject a trigger rotation (degrees)", "/sensor rx ry rz".bold().cyan());
    println!("  {} – move a tracked frame", "/move node x y z [rx ry rz]".bold().cyan());
    println!("  {}                 – run one sampling step", "/tick".bold().cyan());
    println!("  {}               – show jaw state and metrics", "/status".bold().cyan());
    println!("  {}        – append the report to a CSV file", "/export [path]".bold().cyan());
    println!("  {}         – exit the console", "/quit  /exit".bold().cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/start"), Ok(Command::Start));
        assert_eq!(parse_command("  /stop  "), Ok(Command::Stop));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
        assert_eq!(parse_command("/export"), Ok(Command::Export(None)));
        assert_eq!(
            parse_command("/load scenes/vessel.toml"),
            Ok(Command::Load(Some(PathBuf::from("scenes/vessel.toml"))))
        );
    }

    #[test]
    fn parses_sensor_and_move() {
        assert_eq!(
            parse_command("/sensor 0 0 -6"),
            Ok(Command::Sensor([0.0, 0.0, -6.0]))
        );
        assert_eq!(
            parse_command("/move CutterToRetractor 1 2 3"),
            Ok(Command::Move {
                node: "CutterToRetractor".to_string(),
                translation: [1.0, 2.0, 3.0],
                rotation_deg: [0.0; 3],
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("/sensor 1 2").is_err());
        assert!(parse_command("/sensor a b c").is_err());
        assert!(parse_command("/sensor 1 2 NaN").is_err());
        assert!(parse_command("/settings").is_err());
        assert!(parse_command("/start now").is_err());
    }

    #[test]
    fn pose_composes_rotation_then_translation() {
        let m = pose([0.0, 0.0, 5.0], [0.0, 0.0, 90.0]);
        let p = m.transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
        assert!((p.z - 5.0).abs() < 1e-12);
    }
}
