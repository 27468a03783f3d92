// MIDI output device discovery, selection, and connection.
//
// `DeviceSelection` is the pure half: given the list of outputs currently
// visible, it decides which one the session should be bound to. A rescan
// keeps the user's preferred device if it is still present and otherwise
// falls back to the first output listed; an empty list clears the
// preference. Between rescans, `detect_loss()` notices the bound device
// vanishing so the host can drop to the null sink.
//
// `DeviceManager` is the `midir` half. It opens a fresh `midir` client for
// each query (a `MidiOutput` client is consumed by `connect()`), maps ports to
// `DeviceInfo` by name, and produces `OutputSink`s plus the status line the
// host shows the user.
//
// See also: `cellsong_sim::output` for the `MidiOutput` trait and
// `OutputSink`, `cellsong_host::host` for the polling loop that calls
// `rescan()` and `check_connection()`.

use crate::error::MidiError;
use cellsong_sim::output::{MidiOutput, OutputError, OutputSink};
use midir::{MidiOutputConnection, MidiOutputPort};
use tracing::{debug, info, warn};

/// Status shown when a rescan finds nothing to bind to.
pub const NO_OUTPUTS_STATUS: &str = "No MIDI outputs detected. Connect a device and refresh.";
/// Status shown when a rescan leaves the current binding in place.
pub const REFRESHED_STATUS: &str = "MIDI devices refreshed.";

/// One MIDI output as the user sees it. Ports are identified by name, which
/// is the only identifier that survives re-enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

/// What a rescan decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// No outputs exist. Bind the null sink.
    NoOutputs,
    /// The bound device is still the right one. Nothing to reconnect.
    Unchanged(DeviceInfo),
    /// Bind this device.
    Switch(DeviceInfo),
}

// ---------------------------------------------------------------------------
// DeviceSelection
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct DeviceSelection {
    preferred: Option<String>,
    current: Option<String>,
}

impl DeviceSelection {
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred,
            current: None,
        }
    }

    pub fn preferred(&self) -> Option<&str> {
        self.preferred.as_deref()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Pick the preferred device if listed, else the first one.
    pub fn reconcile(&mut self, available: &[DeviceInfo]) -> Selection {
        let Some(first) = available.first() else {
            self.preferred = None;
            self.current = None;
            return Selection::NoOutputs;
        };
        let chosen = self
            .preferred
            .as_deref()
            .and_then(|id| available.iter().find(|d| d.id == id))
            .unwrap_or(first)
            .clone();
        self.preferred = Some(chosen.id.clone());
        if self.current.as_deref() == Some(chosen.id.as_str()) {
            Selection::Unchanged(chosen)
        } else {
            self.current = Some(chosen.id.clone());
            Selection::Switch(chosen)
        }
    }

    /// Explicit user choice. Becomes the preference for later rescans.
    pub fn choose(&mut self, device: &DeviceInfo) {
        self.preferred = Some(device.id.clone());
        self.current = Some(device.id.clone());
    }

    /// Forget the binding without touching the preference, so the next
    /// `reconcile()` reconnects even if the device is still listed.
    pub fn mark_unbound(&mut self) {
        self.current = None;
    }

    /// The bound device is gone from `available`. Unbinds it and returns its
    /// id; the preference is kept so a later rescan re-binds it if it
    /// reappears.
    pub fn detect_loss(&mut self, available: &[DeviceInfo]) -> Option<String> {
        let current = self.current.as_deref()?;
        if available.iter().any(|d| d.id == current) {
            return None;
        }
        self.current.take()
    }
}

// ---------------------------------------------------------------------------
// DeviceOutput
// ---------------------------------------------------------------------------

/// An open `midir` connection usable as a session output.
pub struct DeviceOutput {
    name: String,
    connection: MidiOutputConnection,
}

impl MidiOutput for DeviceOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        self.connection
            .send(message)
            .map_err(|e| OutputError::Send(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DeviceManager
// ---------------------------------------------------------------------------

/// The result of `DeviceManager::rescan()`.
pub struct Rescan {
    /// A new sink to install, or `None` to keep the current one.
    pub sink: Option<OutputSink>,
    pub status: String,
}

pub struct DeviceManager {
    client_name: String,
    selection: DeviceSelection,
}

impl DeviceManager {
    pub fn new(client_name: impl Into<String>, preferred: Option<String>) -> Self {
        Self {
            client_name: client_name.into(),
            selection: DeviceSelection::new(preferred),
        }
    }

    pub fn selection(&self) -> &DeviceSelection {
        &self.selection
    }

    fn client(&self) -> Result<midir::MidiOutput, MidiError> {
        midir::MidiOutput::new(&self.client_name).map_err(|e| MidiError::Init(e.to_string()))
    }

    /// Every output port the platform currently reports. Ports whose name
    /// cannot be read are skipped.
    pub fn list(&self) -> Result<Vec<DeviceInfo>, MidiError> {
        let client = self.client()?;
        let devices = client
            .ports()
            .iter()
            .filter_map(|port| match client.port_name(port) {
                Ok(name) => Some(DeviceInfo::new(name)),
                Err(e) => {
                    debug!(error = %e, "skipping unnamed MIDI port");
                    None
                }
            })
            .collect();
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo) -> Result<DeviceOutput, MidiError> {
        let client = self.client()?;
        let port: MidiOutputPort = client
            .ports()
            .into_iter()
            .find(|p| client.port_name(p).is_ok_and(|name| name == device.id))
            .ok_or_else(|| MidiError::UnknownDevice(device.id.clone()))?;
        let connection = client
            .connect(&port, &self.client_name)
            .map_err(|e| MidiError::Connect {
                name: device.name.clone(),
                reason: e.to_string(),
            })?;
        info!(device = %device.name, "MIDI output connected");
        Ok(DeviceOutput {
            name: device.name.clone(),
            connection,
        })
    }

    /// Bind the output named `id`, making it the preference.
    pub fn connect(&mut self, id: &str) -> Result<(OutputSink, String), MidiError> {
        let devices = self.list()?;
        let device = devices
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| MidiError::UnknownDevice(id.to_string()))?;
        let output = self.open(&device)?;
        self.selection.choose(&device);
        Ok((OutputSink::device(output), connected_status(&device)))
    }

    /// Re-enumerate outputs and re-bind: preferred if present, else first.
    pub fn rescan(&mut self) -> Result<Rescan, MidiError> {
        let devices = self.list()?;
        debug!(count = devices.len(), "MIDI outputs enumerated");
        match self.selection.reconcile(&devices) {
            Selection::NoOutputs => Ok(Rescan {
                sink: Some(OutputSink::Null),
                status: NO_OUTPUTS_STATUS.to_string(),
            }),
            Selection::Unchanged(_) => Ok(Rescan {
                sink: None,
                status: REFRESHED_STATUS.to_string(),
            }),
            Selection::Switch(device) => match self.open(&device) {
                Ok(output) => Ok(Rescan {
                    sink: Some(OutputSink::device(output)),
                    status: connected_status(&device),
                }),
                Err(e) => {
                    self.selection.mark_unbound();
                    Err(e)
                }
            },
        }
    }

    /// The session dropped its output on its own (a failed send). The next
    /// `rescan()` opens a fresh connection.
    pub fn mark_unbound(&mut self) {
        if let Some(id) = self.selection.current() {
            debug!(device = %id, "MIDI output unbound");
        }
        self.selection.mark_unbound();
    }

    /// Poll for the bound device disappearing. Returns the status line to
    /// show when it has; the caller should install `OutputSink::Null`.
    pub fn check_connection(&mut self) -> Option<String> {
        let devices = match self.list() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "MIDI enumeration failed during connection check");
                return None;
            }
        };
        let lost = self.selection.detect_loss(&devices)?;
        warn!(device = %lost, "MIDI output disappeared");
        Some(format!("MIDI output \"{lost}\" disconnected."))
    }
}

pub fn connected_status(device: &DeviceInfo) -> String {
    format!("Connected to \"{}\"", device.name)
}
