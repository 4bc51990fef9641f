//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::Write;

use serde::Deserialize;
use tracing::warn;

use crate::instance::InstanceMsg;

// Records every instance input message as a JSON line.
pub struct EventRecorder(std::fs::File);

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub enabled: bool,
    pub dir: String,
}

// ===== impl EventRecorder =====

impl EventRecorder {
    // Creates new event recorder.
    pub fn new(config: &Config) -> Option<EventRecorder> {
        if !config.enabled {
            return None;
        }

        // Get full file path.
        let path = format!("{}/ospf6ac-events.jsonl", config.dir);

        // Create event recorder.
        match std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
        {
            Ok(file) => Some(EventRecorder(file)),
            Err(error) => {
                warn!(%error, "couldn't write to file");
                None
            }
        }
    }

    // Records the instance event.
    pub fn record(&mut self, msg: &InstanceMsg) {
        let event = match serde_json::to_string(msg) {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "couldn't serialize event");
                return;
            }
        };
        if let Err(error) = writeln!(self.0, "{event}") {
            warn!(%error, "couldn't write to file");
        }
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventRecorder").finish()
    }
}

// ===== impl Config =====

impl Default for Config {
    fn default() -> Config {
        Config {
            enabled: false,
            dir: "/var/opt/ospf6ac".to_owned(),
        }
    }
}

// ===== unit tests =====
