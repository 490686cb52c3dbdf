use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;

use audio_router::config::RouterConfig;
use audio_router::device::{FilterProfile, BUILTIN_SPEAKER_ID};
use audio_router::engine::backend::{sco_output, wired_output, RouteHost, StubRouteHost};
use audio_router::engine::RouteEngine;
use audio_router::RouteEvent;

fn main() -> ExitCode {
    audio_router::init_logging();
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("route-diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "route-diag", about = "Audio route diagnostics CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        match self.command {
            Command::List(args) => list_command(args),
            Command::Watch(args) => watch_command(args),
            Command::Simulate => simulate_command(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate currently available output devices.
    List(ListArgs),
    /// Subscribe to route events on this machine and print them as JSON.
    Watch(WatchArgs),
    /// Drive a scripted stub-host session demonstrating reconciliation.
    Simulate,
}

#[derive(Args, Debug, Clone)]
struct ListArgs {
    /// Filter profile governing which device types are surfaced.
    #[arg(long, value_enum, default_value_t = ProfileArg::Communication)]
    profile: ProfileArg,
    /// Emit the device list as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct WatchArgs {
    /// How long to watch before exiting (milliseconds).
    #[arg(long, default_value_t = 10_000)]
    watch_ms: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ProfileArg {
    Communication,
    Media,
    All,
}

impl From<ProfileArg> for FilterProfile {
    fn from(profile: ProfileArg) -> Self {
        match profile {
            ProfileArg::Communication => FilterProfile::Communication,
            ProfileArg::Media => FilterProfile::Media,
            ProfileArg::All => FilterProfile::All,
        }
    }
}

fn list_command(args: ListArgs) -> Result<()> {
    let devices = audio_router::list_available_devices(args.profile.into())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    println!("{:<40} {}", "id", "kind");
    for device in devices {
        println!("{:<40} {}", device.id, device.kind.as_str());
    }
    Ok(())
}

fn watch_command(args: WatchArgs) -> Result<()> {
    audio_router::acquire_router()?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = rt.block_on(async {
        let mut stream = audio_router::route_events_stream().await?;
        let deadline = Instant::now() + Duration::from_millis(args.watch_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, stream.next()).await {
                Ok(Some(event)) => println!("{}", serde_json::to_string(&event)?),
                Ok(None) | Err(_) => break,
            }
        }
        anyhow::Ok(())
    });

    audio_router::release_router()?;
    result
}

fn simulate_command() -> Result<()> {
    let host = StubRouteHost::new();
    let mut config = RouterConfig::default();
    config.routing.verify_delay_ms = 80;
    let engine = RouteEngine::new(
        Arc::new(host.clone()) as Arc<dyn RouteHost>,
        config,
    );

    engine.acquire()?;
    let (_handle, mut events) = engine.subscribe()?;

    println!("-- speaker request with no external device");
    engine.request_device(BUILTIN_SPEAKER_ID)?;
    pump(&mut events, 200);

    println!("-- bluetooth headset connects; speaker exclusivity applies");
    host.connect(sco_output("bt-headset"));
    pump(&mut events, 300);

    println!("-- wired headset connects and is requested explicitly");
    host.disconnect("bt-headset");
    host.connect(wired_output("wired-headset"));
    pump(&mut events, 200);
    engine.request_device("wired-headset")?;
    pump(&mut events, 300);

    println!("-- devices disappear, route falls back to the receiver");
    host.disconnect("wired-headset");
    pump(&mut events, 300);

    println!("-- platform ignores a request; verification reports the failure");
    host.set_ignore_set_active(true);
    engine.request_device(BUILTIN_SPEAKER_ID)?;
    pump(&mut events, 500);

    engine.release()?;
    Ok(())
}

/// Let the engine settle, then print everything it emitted.
fn pump(events: &mut tokio::sync::mpsc::UnboundedReceiver<RouteEvent>, wait_ms: u64) {
    std::thread::sleep(Duration::from_millis(wait_ms));
    while let Ok(event) = events.try_recv() {
        if let Ok(json) = serde_json::to_string(&event) {
            println!("{json}");
        }
    }
}
