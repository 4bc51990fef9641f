//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv6Network;
use serde::{Deserialize, Serialize};

use crate::instance::Instance;
use crate::prefix::{AggregatedPrefix, AssignmentState};

// Operational state requested by the operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ShowKind {
    // Aggregated prefixes allocated by the operator.
    Allocated,
    // Working list of aggregated prefixes.
    Aggregated,
    // Per-interface assignments.
    Assigned,
}

#[derive(Clone, Debug)]
#[derive(Serialize)]
pub enum ShowOutput {
    Allocated(Vec<Ipv6Network>),
    Aggregated(Vec<AggregatedPrefix>),
    Assigned(Vec<AssignedEntry>),
}

#[derive(Clone, Debug)]
#[derive(Serialize)]
pub struct AssignedEntry {
    pub ifname: String,
    pub prefix: Ipv6Network,
    pub assigning_rtr: Ipv4Addr,
    pub valid: bool,
    pub state: AssignmentState,
    pub address: Option<Ipv6Network>,
}

// ===== global functions =====

pub(crate) fn show(instance: &Instance, kind: ShowKind) -> ShowOutput {
    match kind {
        ShowKind::Allocated => ShowOutput::Allocated(
            instance.config.aggregates.iter().copied().collect(),
        ),
        ShowKind::Aggregated => ShowOutput::Aggregated(
            instance
                .state
                .as_ref()
                .map(|state| state.aggregated.clone())
                .unwrap_or_default(),
        ),
        ShowKind::Assigned => ShowOutput::Assigned(
            instance
                .interfaces
                .values()
                .flat_map(|iface| {
                    iface.assignments.iter().map(|record| AssignedEntry {
                        ifname: iface.name.clone(),
                        prefix: record.prefix,
                        assigning_rtr: record.assigning_rtr,
                        valid: record.valid,
                        state: record.state,
                        address: record.installed,
                    })
                })
                .collect(),
        ),
    }
}

// ===== impl ShowOutput =====

impl std::fmt::Display for ShowOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowOutput::Allocated(prefixes) => {
                for prefix in prefixes {
                    writeln!(f, "{prefix}")?;
                }
            }
            ShowOutput::Aggregated(aggregates) => {
                for aggregate in aggregates {
                    writeln!(
                        f,
                        "{:<44} {:<34} {}",
                        aggregate.prefix, aggregate.source, aggregate.adv_rtr
                    )?;
                }
            }
            ShowOutput::Assigned(entries) => {
                for entry in entries {
                    writeln!(
                        f,
                        "{:<16} {:<44} {:<16} {}{}",
                        entry.ifname,
                        entry.prefix,
                        entry.assigning_rtr,
                        entry.state,
                        if entry.valid { "" } else { " (invalid)" }
                    )?;
                }
            }
        }

        Ok(())
    }
}
