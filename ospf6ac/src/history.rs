//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assignment::ASSIGNED_PREFIX_LEN;
use crate::error::IoError;

// Maximum number of prefixes remembered per interface.
pub const HISTORY_CAPACITY: usize = 5;

// Prefixes recently assigned to an interface, most recent first.
//
// Consulted when minting so that a router keeps handing out the same
// sub-prefix across restarts and link flaps.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AssociatedPrefixHistory(VecDeque<Ipv6Network>);

// ===== impl AssociatedPrefixHistory =====

impl AssociatedPrefixHistory {
    // Moves `prefix` to the front of the history, evicting the oldest entry
    // when the capacity is exceeded.
    pub fn push(&mut self, prefix: Ipv6Network) {
        self.0.retain(|entry| *entry != prefix);
        self.0.push_front(prefix);
        self.0.truncate(HISTORY_CAPACITY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv6Network> {
        self.0.iter()
    }

    pub fn contains(&self, prefix: &Ipv6Network) -> bool {
        self.0.contains(prefix)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Loads the interface history from stable storage. A missing file yields
    // an empty history.
    pub fn load(dir: &Path, ifname: &str) -> Result<Self, IoError> {
        let path = path(dir, ifname);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(IoError::HistoryReadError(ifname.to_owned(), error));
            }
        };

        let mut history = Self::default();
        for line in data.lines().map(str::trim).filter(|line| !line.is_empty())
        {
            match line.parse::<Ipv6Network>() {
                Ok(prefix) if prefix.prefix() != ASSIGNED_PREFIX_LEN => {
                    warn!(
                        %ifname,
                        %line,
                        "ignoring history entry that isn't a /64"
                    );
                }
                Ok(prefix) => {
                    let prefix = prefix.apply_mask();
                    if history.0.len() < HISTORY_CAPACITY
                        && !history.contains(&prefix)
                    {
                        history.0.push_back(prefix);
                    }
                }
                Err(error) => {
                    warn!(%ifname, %line, %error, "ignoring invalid history entry");
                }
            }
        }

        Ok(history)
    }

    // Writes the interface history to stable storage, one prefix per line.
    pub fn store(&self, dir: &Path, ifname: &str) -> Result<(), IoError> {
        let data = self
            .0
            .iter()
            .map(|prefix| format!("{prefix}\n"))
            .collect::<String>();
        std::fs::write(path(dir, ifname), data)
            .map_err(|error| IoError::HistoryWriteError(ifname.to_owned(), error))
    }
}

// ===== global functions =====

// Returns the location of the history file of the given interface.
pub fn path(dir: &Path, ifname: &str) -> PathBuf {
    dir.join(format!("ospf6ac-history-{ifname}"))
}

// ===== unit tests =====
