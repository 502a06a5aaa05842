//! UI Agent - autonomous Android UI automation
//!
//! This is the CLI entry point for the ui-agent tool.
//! Run with: cargo run --bin ui-agent -- type:search_box=parcel click:go_button

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use ui_agent::adb::{dump_hierarchy, ADBConnection, AdbSurface};
use ui_agent::{
    AgentRunner, AgentSystem, AppSettings, EnvironmentPerception, ExperienceArchive, Goal,
    RuleBasedPolicy,
};

const USAGE: &str = "\
Usage: ui-agent [OPTIONS] <STEP>...

Steps:
  click:<id>            click the first clickable element with this resource id
  click-text:<text>     click the first clickable element showing this text
  click-re:<regex>      click the first clickable element whose text or id matches
  type:<id>=<text>      enter text into the first editable element with this id

Options:
  --connect <addr>      connect to a device over TCP/IP (host[:port]) and use it
  --list-devices        list attached adb devices and exit
  --dump                print the current snapshot as JSON and exit
  --save-settings       persist the effective settings and continue";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let has_flag = |flag: &str| args.iter().any(|arg| arg == flag);

    let mut settings = AppSettings::load();
    apply_env_overrides(&mut settings);

    if let Some(address) = flag_value(&args, "--connect") {
        let serial = ADBConnection::new().connect(address)?;
        println!("Connected to {}", serial);
        if settings.device_id.is_empty() {
            settings.device_id = serial;
        }
    }
    let device_id = (!settings.device_id.is_empty()).then(|| settings.device_id.clone());

    if has_flag("--list-devices") {
        for device in ADBConnection::new().list_devices()? {
            println!(
                "{}\t{}\t{:?}\t{}",
                device.device_id,
                device.status,
                device.connection_type,
                device.model.unwrap_or_default()
            );
        }
        return Ok(());
    }

    if has_flag("--dump") {
        let tree = dump_hierarchy(device_id.as_deref())?;
        let snapshot = EnvironmentPerception::default().analyze(tree.as_ref());
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if has_flag("--save-settings") {
        settings.save().map_err(anyhow::Error::msg)?;
    }

    let steps = goal_steps(&args);
    if steps.is_empty() {
        println!("{}", USAGE);
        return Ok(());
    }
    let goal = Goal::parse(steps)?;

    println!("🤖 UI Agent - Android UI Automation");
    println!("================================================");
    for (i, step) in goal.steps().iter().enumerate() {
        println!("Step {}: {}", i + 1, step);
    }
    if let Some(ref id) = device_id {
        println!("Device: {}", id);
    }
    println!(
        "Poll: {}ms, max cycles: {}, buffer: {}",
        settings.poll_interval_ms, settings.max_cycles, settings.buffer_capacity
    );
    println!("================================================\n");

    let config = settings.agent_config();
    let mut system = AgentSystem::new(
        &config,
        Box::new(RuleBasedPolicy::new(goal)),
        AdbSurface::new(device_id.clone()),
    );

    if settings.archive_experiences {
        let archive = if settings.archive_path.is_empty() {
            ExperienceArchive::default_location()?
        } else {
            ExperienceArchive::new(&settings.archive_path)
        };
        println!("Archiving experiences to {}", archive.path().display());
        system = system.with_sink(Box::new(archive));
    }

    let done = Arc::new(AtomicBool::new(false));
    let done_flag = done.clone();
    let (handle, join) = AgentRunner::new(system, config.queue_capacity)
        .with_report_callback(move |report| {
            let status = if report.outcome.succeeded { "✅" } else { "❌" };
            println!(
                "{} #{} {} ({} elements){}",
                status,
                report.cycle,
                report.action,
                report.snapshot.len(),
                report
                    .outcome
                    .message
                    .as_deref()
                    .map(|m| format!(": {}", m))
                    .unwrap_or_default()
            );
            if report.policy_complete {
                done_flag.store(true, Ordering::SeqCst);
            }
        })
        .spawn();

    let mut ticker = tokio::time::interval(Duration::from_millis(settings.poll_interval_ms.max(1)));
    while !done.load(Ordering::SeqCst) && handle.cycles() < settings.max_cycles {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted");
                break;
            }
        }

        // A fresh dump supersedes anything still pending.
        if handle.is_processing() || handle.pending_events() > 0 {
            continue;
        }

        let device = device_id.clone();
        match tokio::task::spawn_blocking(move || dump_hierarchy(device.as_deref())).await? {
            Ok(Some(tree)) => handle.deliver(tree)?,
            Ok(None) => tracing::debug!("No active window"),
            Err(e) => tracing::warn!("Hierarchy dump failed: {}", e),
        }
    }

    handle.stop();
    let system = join.await?;

    println!("\n================================================");
    if system.decision().policy().is_complete() {
        println!("🎉 Goal completed in {} cycles", system.cycles());
    } else {
        println!("⚠️ Goal not completed after {} cycles", system.cycles());
    }
    println!(
        "Buffered experiences: {}, optimization passes: {}, dropped events: {}",
        system.learning().len(),
        system.learning().optimization_runs(),
        handle.dropped_events()
    );

    Ok(())
}

/// Value following `flag`, if both are present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Positional goal steps: everything that is neither a flag nor a flag's value.
fn goal_steps(args: &[String]) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--connect" {
            iter.next();
        } else if !arg.starts_with("--") {
            steps.push(arg.as_str());
        }
    }
    steps
}

/// Let environment variables override persisted settings.
fn apply_env_overrides(settings: &mut AppSettings) {
    fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
        env::var(key).ok().and_then(|v| v.parse().ok())
    }

    if let Ok(id) = env::var("ADB_DEVICE_ID") {
        settings.device_id = id;
    }
    if let Some(ms) = parsed("AGENT_POLL_INTERVAL_MS") {
        settings.poll_interval_ms = ms;
    }
    if let Some(n) = parsed("AGENT_MAX_CYCLES") {
        settings.max_cycles = n;
    }
    if let Some(n) = parsed::<usize>("AGENT_BUFFER_CAPACITY").filter(|n| *n > 0) {
        settings.buffer_capacity = n;
    }
    if let Some(n) = parsed::<usize>("AGENT_QUEUE_CAPACITY").filter(|n| *n > 0) {
        settings.queue_capacity = n;
    }
    if let Ok(v) = env::var("AGENT_ARCHIVE") {
        settings.archive_experiences = v == "1" || v.eq_ignore_ascii_case("true");
    }
}
