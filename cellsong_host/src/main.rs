// CLI entry point for the cellsong host.
//
// Loads a session configuration, binds a MIDI output, fills the grid and
// starts the music (unless a script is given), and runs until Ctrl+C or the
// requested duration. See `host.rs` for the loop itself.
//
// Usage:
//   cellsong [OPTIONS]
//     --config <PATH>       Session configuration JSON (default: built-in defaults)
//     --script <PATH>       Timed command script JSON
//     --seconds <N>         Stop after N seconds
//     --device <NAME>       Preferred MIDI output (default: first available)
//     --console-midi        Log MIDI messages instead of opening a device
//     --list-devices        Print MIDI outputs and exit
//     --seed <N>            Override the configuration's PRNG seed
//     --render <MS>         Print the grid every MS milliseconds
//
// Logging goes through `tracing`; set `RUST_LOG` (e.g. `RUST_LOG=debug`) to
// see individual notes and generations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cellsong_host::host::{Host, HostOptions};
use cellsong_host::script::{Script, ScriptEntry};
use cellsong_host::{HostError, read_file};
use cellsong_midi::DeviceManager;
use cellsong_sim::command::Command;
use cellsong_sim::config::SessionConfig;
use cellsong_sim::output::OutputSink;
use cellsong_sim::session::Session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLIENT_NAME: &str = "cellsong";

#[derive(Default)]
struct Args {
    config: Option<String>,
    script: Option<String>,
    seconds: Option<f64>,
    device: Option<String>,
    console_midi: bool,
    list_devices: bool,
    seed: Option<u64>,
    render_ms: Option<f64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();

    if args.list_devices {
        list_devices();
        return;
    }

    if let Err(e) = run(args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), HostError> {
    let mut config = match &args.config {
        Some(path) => {
            SessionConfig::from_json(&read_file(path)?).map_err(|source| HostError::Json {
                path: path.clone(),
                source,
            })?
        }
        None => SessionConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let script = match &args.script {
        Some(path) => Script::from_json(path, &read_file(path)?)?,
        None => Script::new(vec![
            ScriptEntry {
                at_ms: 0.0,
                command: Command::RandomFill,
            },
            ScriptEntry {
                at_ms: 0.0,
                command: Command::StartMusic,
            },
        ]),
    };

    let (sink, devices) = open_output(&args);
    let session = Session::new(config, sink);
    let options = HostOptions {
        seconds: args.seconds,
        render_every_ms: args.render_ms,
        ..HostOptions::default()
    };
    let mut host = Host::new(session, devices, script, options);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_ctrlc = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || stop_for_ctrlc.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Ctrl+C handler unavailable; stop with --seconds");
    }

    host.run(&stop);
    Ok(())
}

/// Bind the initial output. A MIDI backend that cannot start leaves the
/// session on the null sink with no device polling.
fn open_output(args: &Args) -> (OutputSink, Option<DeviceManager>) {
    if args.console_midi {
        return (OutputSink::Console, None);
    }
    let mut manager = DeviceManager::new(CLIENT_NAME, args.device.clone());
    match manager.rescan() {
        Ok(rescan) => {
            info!(status = %rescan.status, "MIDI");
            (rescan.sink.unwrap_or_default(), Some(manager))
        }
        Err(e) => {
            warn!(error = %e, "Unable to initialize MIDI. Notes will not be sent.");
            (OutputSink::Null, None)
        }
    }
}

fn list_devices() {
    match DeviceManager::new(CLIENT_NAME, None).list() {
        Ok(devices) if devices.is_empty() => println!("No MIDI outputs detected."),
        Ok(devices) => {
            for device in devices {
                println!("{}", device.name);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Parse command-line arguments. Plain `std::env::args()` matching.
fn parse_args() -> Args {
    let mut args = Args::default();
    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "--config" => {
                i += 1;
                args.config = Some(required(&argv, i, "--config requires a path"));
            }
            "--script" => {
                i += 1;
                args.script = Some(required(&argv, i, "--script requires a path"));
            }
            "--seconds" => {
                i += 1;
                args.seconds = Some(parsed(&argv, i, "--seconds requires a number"));
            }
            "--device" => {
                i += 1;
                args.device = Some(required(&argv, i, "--device requires a name"));
            }
            "--seed" => {
                i += 1;
                args.seed = Some(parsed(&argv, i, "--seed requires an integer"));
            }
            "--render" => {
                i += 1;
                args.render_ms = Some(parsed(&argv, i, "--render requires milliseconds"));
            }
            "--console-midi" => args.console_midi = true,
            "--list-devices" => args.list_devices = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn required(argv: &[String], i: usize, message: &str) -> String {
    argv.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{message}");
        std::process::exit(1);
    })
}

fn parsed<T: std::str::FromStr>(argv: &[String], i: usize, message: &str) -> T {
    argv.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("{message}");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: cellsong [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>     Session configuration JSON");
    println!("  --script <PATH>     Timed command script JSON");
    println!("  --seconds <N>       Stop after N seconds");
    println!("  --device <NAME>     Preferred MIDI output (default: first available)");
    println!("  --console-midi      Log MIDI messages instead of opening a device");
    println!("  --list-devices      Print MIDI outputs and exit");
    println!("  --seed <N>          Override the configuration's PRNG seed");
    println!("  --render <MS>       Print the grid every MS milliseconds");
    println!("  --help, -h          Show this help");
}
