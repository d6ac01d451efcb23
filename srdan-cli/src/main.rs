mod cli;
mod config;
mod scheduler;
mod session;

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    Layer, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use showroom::ShowroomApi;

use crate::cli::Args;
use crate::config::Settings;
use crate::scheduler::{RoomScheduler, SchedulerHandle};

/// File the program debug log goes to when enabled.
const PROGRAM_LOG_FILE: &str = "srdan.log";

const HELP_TEXT: &str = "Commands:
- Type \"h\" or \"help\" for help.
- Type \"q\" or \"quit\" to quit.
- Type \"s\" or \"status\" to view status.
- Type \"c\" or \"comment\" to turn on/off showing comments.
";

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = config::load_or_create_settings(&args.settings)?;
    let (mut room_keys, removed) = config::load_or_create_rooms(&args.rooms)?;

    let _log_guard = init_logging(&settings);

    debug!("program settings: {:?}", settings.program);
    debug!("danmaku settings: {:?}", settings.danmaku);

    if let Some(url) = args.url.as_deref() {
        let key = cli::room_key_from_url(url);
        info!("Monitoring {key} ...");
        room_keys = vec![key];
    } else {
        if removed > 0 {
            info!("Removed duplicate {removed} room(s)");
        }
        info!("Monitoring {} rooms...", room_keys.len());
    }

    if room_keys.is_empty() {
        info!("No rooms to monitor");
        return Ok(());
    }

    let echo_comments = Arc::new(AtomicBool::new(settings.program.show_comments));
    info!(
        "{}",
        if echo_comments.load(Ordering::Relaxed) {
            "Comments on"
        } else {
            "Comments off"
        }
    );
    info!("{HELP_TEXT}");

    let api = ShowroomApi::new();
    let scheduler = RoomScheduler::new(api, room_keys, settings, echo_comments.clone()).start();

    command_loop(&scheduler, &echo_comments).await;

    info!("quitting jobs...");
    scheduler.shutdown().await;
    info!("bye");
    Ok(())
}

/// The interactive stdin loop. Returns when the user quits, stdin closes,
/// or Ctrl-C arrives; the caller then shuts the scheduler down so every
/// partial recording is flushed.
async fn command_loop(scheduler: &SchedulerHandle, echo_comments: &AtomicBool) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt");
                break;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => match line.trim().to_lowercase().as_str() {
                "q" | "quit" | "exit" => break,
                "h" | "help" => info!("{HELP_TEXT}"),
                "s" | "status" => scheduler.status().await,
                "c" | "comment" | "comments" => {
                    let on = !echo_comments.load(Ordering::Relaxed);
                    echo_comments.store(on, Ordering::Relaxed);
                    info!("{}", if on { "Comments on" } else { "Comments off" });
                }
                "" => {}
                _ => info!("Unknown command. Type \"h\" or \"help\" for help."),
            },
            Ok(None) => break,
            Err(e) => {
                error!("stdin error: {e}");
                break;
            }
        }
    }
}

/// Console logging always; a debug-level file layer when enabled. The
/// returned guard keeps the non-blocking file writer alive.
fn init_logging(settings: &Settings) -> Option<WorkerGuard> {
    let console_level = if settings.program.show_debug_message {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::from_default_env().add_directive(console_level.into()));

    if settings.program.save_program_debug_log {
        let file_appender = tracing_appender::rolling::never(".", PROGRAM_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::registry()
            .with(console_layer)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(EnvFilter::new("debug")),
            )
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(console_layer).init();
        None
    }
}
