// Timed command scripts.
//
// A script is a JSON array of `{"at_ms": <f64>, "command": <Command>}`
// entries, e.g.
//
//   [
//     {"at_ms": 0,    "command": {"SetSpawnMode": {"mode": "scanning"}}},
//     {"at_ms": 0,    "command": "RandomFill"},
//     {"at_ms": 0,    "command": "StartMusic"},
//     {"at_ms": 8000, "command": {"SetMusicBpm": {"bpm": 120}}}
//   ]
//
// Entries are applied in time order; entries sharing a timestamp keep their
// file order.

use crate::HostError;
use cellsong_sim::command::Command;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub at_ms: f64,
    pub command: Command,
}

#[derive(Clone, Debug, Default)]
pub struct Script {
    entries: Vec<ScriptEntry>,
    cursor: usize,
}

impl Script {
    pub fn new(mut entries: Vec<ScriptEntry>) -> Self {
        entries.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        Self { entries, cursor: 0 }
    }

    pub fn from_json(path: &str, json: &str) -> Result<Self, HostError> {
        let entries = serde_json::from_str(json).map_err(|source| HostError::Json {
            path: path.to_string(),
            source,
        })?;
        Ok(Self::new(entries))
    }

    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// Commands scheduled at or before `now_ms` that have not run yet.
    pub fn due(&mut self, now_ms: f64) -> Vec<Command> {
        let start = self.cursor;
        while self
            .entries
            .get(self.cursor)
            .is_some_and(|e| e.at_ms <= now_ms)
        {
            self.cursor += 1;
        }
        self.entries[start..self.cursor]
            .iter()
            .map(|e| e.command.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders_entries() {
        let json = r#"[
            {"at_ms": 500, "command": "StopMusic"},
            {"at_ms": 0, "command": "RandomFill"},
            {"at_ms": 0, "command": {"SetMusicBpm": {"bpm": 90}}}
        ]"#;
        let mut script = Script::from_json("test.json", json).unwrap();
        assert_eq!(script.remaining(), 3);
        assert_eq!(
            script.due(0.0),
            vec![Command::RandomFill, Command::SetMusicBpm { bpm: 90.0 }]
        );
        assert!(script.due(499.0).is_empty());
        assert_eq!(script.due(10_000.0), vec![Command::StopMusic]);
        assert_eq!(script.remaining(), 0);
        assert!(script.due(20_000.0).is_empty());
    }

    #[test]
    fn bad_json_names_the_file() {
        let err = Script::from_json("broken.json", "[{").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse broken.json"));
    }
}
