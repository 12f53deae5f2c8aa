// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, SessionCommands, SkillCommands};
use glimt_core::{AgentEvent, Envelope, EventBus, GoalOutcome, Orchestrator};
use glimt_input::{EnigoDriver, InputDriver};
use glimt_memory::{default_db_path, SessionStore};
use glimt_screen::{Capturer, DisplayGrabber};
use glimt_skills::{scan_dir, SkillRegistry, SkillWatcher};
use glimt_tools::{CompleteMilestoneTool, RunCommandTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = glimt_config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_yaml_string(&config));
            Ok(())
        }
        Commands::Skills { command } => match command {
            SkillCommands::List => {
                let dir = skills_dir(&config);
                let skills = scan_dir(&dir);
                if skills.is_empty() {
                    println!("no skills found under {}", dir.display());
                }
                for skill in skills {
                    println!(
                        "{:24} {}  ({} parameters)",
                        skill.tool_name(),
                        skill.description,
                        skill.parameters.len()
                    );
                }
                Ok(())
            }
        },
        Commands::Sessions { command } => {
            let store = open_store(&config)?;
            match command {
                SessionCommands::Stats => {
                    let Some(key) = store.latest_session()? else {
                        println!("no sessions recorded yet");
                        return Ok(());
                    };
                    let stats = store.stats(&key)?;
                    println!("session   {}", stats.session_key);
                    println!("messages  {}", stats.message_count);
                    println!("tokens    {}", stats.total_tokens);
                    println!("images    {}", stats.image_messages);
                    Ok(())
                }
                SessionCommands::Reset => {
                    let key = store.reset()?;
                    println!("new session: {key}");
                    Ok(())
                }
                SessionCommands::Export => {
                    let Some(key) = store.latest_session()? else {
                        println!("no sessions recorded yet");
                        return Ok(());
                    };
                    let messages = store.load_messages(&key)?;
                    print!(
                        "{}",
                        glimt_memory::transcript::serialize_session(&key, &messages)
                    );
                    Ok(())
                }
            }
        }
        Commands::Run {
            goal,
            max_iterations,
            model,
            json,
        } => {
            if let Some(n) = max_iterations {
                config.decision_loop.max_iterations = n;
            }
            if let Some(name) = model {
                config.model.name = name;
            }
            run_goal(config, &goal, json).await
        }
    }
}

async fn run_goal(config: glimt_config::Config, goal: &str, json: bool) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let provider = glimt_model::from_config(&config.model)?;

    // The input driver and pointer probe share one OS connection; failing to
    // open it (no display, no permission) is terminal at startup.
    let driver = EnigoDriver::new().context("opening the input backend")?;
    let pointer = driver.pointer_probe();
    let capturer = Arc::new(
        Capturer::new(Box::new(DisplayGrabber), Box::new(pointer))
            .with_jpeg_quality(config.screen.jpeg_quality),
    );

    let skills = Arc::new(SkillRegistry::new());
    let dir = skills_dir(&config);
    let _watcher = if config.skills.watch && dir.is_dir() {
        match SkillWatcher::start(dir.clone(), Arc::clone(&skills)) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(error = %e, "skill watcher unavailable; loading once");
                skills.publish(scan_dir(&dir));
                None
            }
        }
    } else {
        skills.publish(scan_dir(&dir));
        None
    };

    let (tool_tx, tool_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut tools = ToolRegistry::new(
        Arc::clone(&skills),
        config.executor.action_timeout_seconds,
        tool_tx.clone(),
    );
    tools.register(RunCommandTool {
        timeout_secs: config.executor.action_timeout_seconds,
    });
    tools.register(CompleteMilestoneTool::new(tool_tx));

    let store = Arc::new(open_store(&config)?);
    let _maintenance = glimt_memory::spawn_maintenance(Arc::clone(&store), config.memory.clone());

    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, json),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        capturer,
        Arc::new(driver) as Arc<dyn InputDriver>,
        Arc::new(tools),
        skills,
        Some(store),
        bus,
        Arc::clone(&config),
        tool_rx,
    ));

    // Ctrl-C requests a clean stop at the next iteration boundary.
    let interrupt = orchestrator.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt requested; stopping after the current action");
            interrupt.store(true, Ordering::SeqCst);
        }
    });

    let outcome = orchestrator.execute_goal(goal).await;
    printer.abort();

    match outcome {
        GoalOutcome::Success(summary) => {
            println!("success: {summary}");
            Ok(())
        }
        GoalOutcome::Partial(reason) => {
            println!("partial: {reason}");
            std::process::exit(2);
        }
        GoalOutcome::Failure(reason) => {
            println!("failure: {reason}");
            std::process::exit(1);
        }
    }
}

fn print_event(event: &AgentEvent, json: bool) {
    if json {
        let envelope = Envelope::from(event);
        if let Ok(line) = serde_json::to_string(&envelope) {
            println!("{line}");
        }
        return;
    }
    match event {
        AgentEvent::GoalStarted { goal } => println!("goal: {goal}"),
        AgentEvent::IterationStarted { iteration } => println!("-- iteration {iteration}"),
        AgentEvent::RoundStarted { intent, .. } => println!("   intent: {intent}"),
        AgentEvent::ActionExecuted { action, .. } => println!("   {action}"),
        AgentEvent::ActionFailed { action, message } => {
            println!("   {action} FAILED: {message}")
        }
        AgentEvent::RoundFinished {
            executed,
            hit_boundary,
            ..
        } => {
            if *hit_boundary {
                println!("   ({executed} executed, boundary hit, re-observing)");
            }
        }
        AgentEvent::GoalCompleted { summary } => println!("completed: {summary}"),
        AgentEvent::GoalFailed { reason } => println!("failed: {reason}"),
        AgentEvent::GoalInterrupted { reason } => println!("interrupted: {reason}"),
        AgentEvent::TtsAudio { .. } | AgentEvent::TtsSkip { .. } | AgentEvent::TtsError { .. } => {}
    }
}

fn skills_dir(config: &glimt_config::Config) -> PathBuf {
    config.skills.dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".glimt")
            .join("skills")
    })
}

fn open_store(config: &glimt_config::Config) -> anyhow::Result<SessionStore> {
    let path = config
        .memory
        .db_path
        .clone()
        .unwrap_or_else(default_db_path);
    Ok(SessionStore::open(&path)?)
}

fn serde_yaml_string(config: &glimt_config::Config) -> String {
    serde_yaml::to_string(config).unwrap_or_default()
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
