use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use stillpoint_lib::{
    session::{SessionEvent, SessionSnapshot, SubState},
    AppOptions, AppState, Catalog, Practice,
};

#[derive(Parser)]
#[command(name = "stillpoint")]
#[command(about = "Guided practice sessions with breath cycles and voice narration", long_about = None)]
struct Cli {
    /// Data directory for settings and history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Practice catalog JSON to use instead of the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Disable narration for this run
    #[arg(long, global = true)]
    no_voice: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available practices
    List,
    /// Run one practice interactively
    Run {
        /// Practice id from `list`
        practice: Option<String>,
        /// Fetch today's practice instead
        #[arg(long, conflicts_with = "practice")]
        daily: bool,
    },
    /// Show completed sessions and total xp
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    stillpoint_lib::utils::logging::init();
    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };

    match cli.command {
        Commands::List => {
            for practice in catalog.practices() {
                println!(
                    "{:<16} {:<20} {:<10} {:>4} xp  {:>2} steps  ~{}s",
                    practice.id,
                    practice.title,
                    practice.kind.as_str(),
                    practice.xp,
                    practice.steps.len(),
                    practice.total_duration_secs()
                );
            }
        }
        Commands::Run { practice, daily } => {
            let options = AppOptions {
                data_dir: cli.data_dir,
                no_voice: cli.no_voice,
            };
            let (app, events) = AppState::bootstrap(options)?;

            let practice = if daily {
                Arc::new(app.daily.fetch().await)
            } else {
                let id = practice.context("pass a practice id or --daily")?;
                match catalog.get(&id) {
                    Some(practice) => practice,
                    None => bail!("unknown practice '{id}'; see `stillpoint list`"),
                }
            };
            run_session(&app, events, practice).await?;
        }
        Commands::History { limit } => {
            let options = AppOptions {
                data_dir: cli.data_dir,
                no_voice: true,
            };
            let (app, _events) = AppState::bootstrap(options)?;
            let summary = app.db.completion_summary().await?;
            for completion in app.db.list_completions(limit).await? {
                println!(
                    "{}  {:<24} +{} xp",
                    completion.completed_at.format("%Y-%m-%d %H:%M"),
                    completion.title,
                    completion.xp
                );
            }
            println!("{} sessions, {} xp total", summary.sessions, summary.total_xp);
        }
    }

    Ok(())
}

async fn run_session(
    app: &AppState,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    practice: Arc<Practice>,
) -> Result<()> {
    println!("{} ({} xp)", practice.title, practice.xp);
    println!("commands: start, next, pause, resume, voice on|off, status, quit");
    app.controller.select_practice(practice).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_printed: Option<(usize, SubState, bool)> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(app, line.trim()).await? {
                    break;
                }
            }
            Some(event) = events.recv() => match event {
                SessionEvent::StateChanged(snapshot) => {
                    let marker = (snapshot.step_index, snapshot.sub_state, snapshot.paused);
                    if last_printed != Some(marker) {
                        print_snapshot(&snapshot);
                        last_printed = Some(marker);
                    }
                }
                SessionEvent::Completed(event) => {
                    println!("Complete: {} (+{} xp). Type `quit` to leave.", event.title, event.xp);
                }
                SessionEvent::Ended { .. } => {}
            },
        }
    }

    app.controller.exit().await;
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn handle_line(app: &AppState, line: &str) -> Result<bool> {
    let controller = &app.controller;
    let result = match line {
        "" => return Ok(true),
        "quit" | "exit" | "q" => return Ok(false),
        "start" => controller.start().await.map(|_| ()),
        "next" | "n" => controller.advance().await.map(|_| ()),
        "pause" => controller.pause().await.map(|_| ()),
        "resume" => controller.resume().await.map(|_| ()),
        "voice on" => {
            app.set_voice_enabled(true)?;
            Ok(())
        }
        "voice off" => {
            app.set_voice_enabled(false)?;
            Ok(())
        }
        "status" => {
            match controller.snapshot().await {
                Some(snapshot) => print_snapshot(&snapshot),
                None => println!("no session"),
            }
            Ok(())
        }
        other => {
            println!("unknown command '{other}'");
            Ok(())
        }
    };

    if let Err(rejection) = result {
        println!("not now: {rejection}");
    }
    Ok(true)
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let position = format!("[{}/{}]", snapshot.step_index + 1, snapshot.step_count);
    match snapshot.sub_state {
        SubState::Intro => {
            println!("{position} {}: {}", snapshot.step.title, snapshot.step.instruction);
        }
        SubState::Active if snapshot.paused => println!("{position} paused"),
        SubState::Active => {
            let timing = match snapshot.step.timed_secs() {
                Some(_) => format!("{}s remaining", snapshot.remaining_secs),
                None => "self-paced, type `next` when ready".to_string(),
            };
            match snapshot.breath {
                Some(breath) => println!(
                    "{position} {} ({timing}, breath {} cycle {})",
                    snapshot.step.title,
                    breath.phase.cue(),
                    breath.cycle_count
                ),
                None => println!("{position} {} ({timing})", snapshot.step.title),
            }
        }
        SubState::Complete => println!("{position} complete"),
    }
}
