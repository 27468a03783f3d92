// cellsong_host — headless real-time driver for a cellsong session.
//
// Runs a `Session` against the wall clock at roughly display frame rate,
// binds it to a hardware MIDI output through `cellsong_midi`, and keeps
// watching for that output disappearing or a new one appearing.
//
// Module overview:
// - `host.rs`:   Host loop: frames, device polling, event logging, shutdown.
// - `script.rs`: Timed command scripts loaded from JSON.
// - `render.rs`: ASCII rendering of a `GridSnapshot` for terminal output.
//
// The binary (`main.rs`) parses flags, sets up logging, and hands off to
// `Host::run()`.

pub mod host;
pub mod render;
pub mod script;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Read a whole file, tagging errors with the path.
pub fn read_file(path: &str) -> Result<String, HostError> {
    std::fs::read_to_string(path).map_err(|source| HostError::Io {
        path: path.to_string(),
        source,
    })
}
