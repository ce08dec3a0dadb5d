//! Headless player
//!
//! Plays one file with the desktop shims and reads triggers from stdin
//! (`toggle-play-pause`, `toggle-loop`, `exit`), one per line.
//!
//! Run with:
//! ```bash
//! cargo run --example headless_player -- /path/to/song.flac
//!
//! # Start looping, end the session when the file finishes
//! cargo run --example headless_player -- /path/to/song.flac --loop --close
//! ```

use anyhow::Context;
use bridge_traits::LogLevel;
use core_runtime::events::{CoreEvent, RecvError, SessionEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::PlayerPreferences;
use core_service::{bootstrap_desktop, serve_lines, DesktopOptions};
use std::env;
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let reference = args
        .next()
        .context("usage: headless_player <path> [--loop] [--close]")?;

    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug)
            .with_thread_info(true),
    )?;

    let mut preferences = PlayerPreferences::default();
    for flag in args {
        match flag.as_str() {
            "--loop" => preferences = preferences.with_default_loop(true),
            "--close" => preferences = preferences.with_close_on_completion(true),
            other => warn!(flag = other, "ignoring unknown flag"),
        }
    }

    let service = bootstrap_desktop(DesktopOptions {
        settings_path: None,
        preferences: Some(preferences),
    })
    .await?;

    let mut events = service.subscribe();
    service.load_source(&reference).await?;

    let commands = service.commands();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        match serve_lines(stdin, &commands).await {
            Ok(count) => info!(count, "stdin closed"),
            Err(err) => warn!(error = %err, "stopped reading stdin"),
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                match &event {
                    CoreEvent::Session(SessionEvent::Ended { reason, .. }) => {
                        println!("ended: {:?}", reason);
                        break;
                    }
                    CoreEvent::Playback(_) => {}
                    other => println!("{}: {:?}", other.description(), other),
                }
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
