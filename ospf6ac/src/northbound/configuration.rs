//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnetwork::Ipv6Network;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceCfg {
    pub enabled: bool,
    // Statically configured Router ID. Autoconfigured when absent.
    pub router_id: Option<Ipv4Addr>,
    // Directory holding the prefix histories and the generated ULA prefix.
    // Nothing is persisted when absent.
    pub storage_dir: Option<PathBuf>,
    // Aggregated prefixes allocated by the operator.
    pub aggregates: BTreeSet<Ipv6Network>,
    // Static interface list. All operative non-loopback interfaces are
    // attached to the backbone when empty.
    pub interfaces: BTreeMap<String, InterfaceCfg>,
    pub timers: TimersCfg,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterfaceCfg {
    pub area_id: Ipv4Addr,
}

// Timer values, in seconds.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimersCfg {
    pub prefix_pending: u16,
    pub prefix_deprecation: u16,
    pub ula_generation: u16,
    pub ula_termination: u16,
}

// ===== configuration defaults =====

impl Default for InstanceCfg {
    fn default() -> InstanceCfg {
        InstanceCfg {
            enabled: true,
            router_id: None,
            storage_dir: None,
            aggregates: Default::default(),
            interfaces: Default::default(),
            timers: Default::default(),
        }
    }
}

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            area_id: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Default for TimersCfg {
    fn default() -> TimersCfg {
        TimersCfg {
            prefix_pending: 20,
            prefix_deprecation: 60,
            ula_generation: 20,
            ula_termination: 120,
        }
    }
}
