//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use derive_new::new;
use ipnetwork::Ipv6Network;
use ospf6ac_utils::task::TimeoutTask;
use serde::{Deserialize, Serialize};

// Origin of an aggregated prefix.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PrefixSource {
    Configured,
    Network,
    Generated,
}

// IPv6 block available for sub-delegation.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AggregatedPrefix {
    pub prefix: Ipv6Network,
    pub source: PrefixSource,
    pub adv_rtr: Ipv4Addr,
}

// Sub-prefix claimed by a router for one of its interfaces, as seen in the
// AC-LSAs of the area.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AssignedPrefix {
    pub prefix: Ipv6Network,
    pub assigning_rtr: Ipv4Addr,
    pub assigning_iface_id: u32,
    #[new(default)]
    pub valid: bool,
}

// Identifies a local assignment. The same prefix can be tracked twice on an
// interface while a lower-ID claim is being deprecated in favor of a
// higher-ID one.
#[derive(Clone, Copy, Debug, Eq, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct AssignmentKey {
    pub prefix: Ipv6Network,
    pub assigning_rtr: Ipv4Addr,
}

// Lifecycle state of a local assignment.
//
// An invalidated pending assignment is removed right away, while an
// invalidated active one moves to the deprecating state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AssignmentState {
    Pending,
    Active,
    Deprecating,
}

// Assignment tracked by one of our interfaces.
#[derive(Debug)]
pub struct LocalAssignment {
    pub prefix: Ipv6Network,
    pub assigning_rtr: Ipv4Addr,
    pub assigning_iface_id: u32,
    pub valid: bool,
    pub state: AssignmentState,
    // Set by every assignment cycle that confirms the record.
    pub refreshed: bool,
    // Interface address installed when the assignment became active.
    pub installed: Option<Ipv6Network>,
    pub pending_timer: Option<TimeoutTask>,
    pub deprecation_timer: Option<TimeoutTask>,
}

// ===== impl PrefixSource =====

impl std::fmt::Display for PrefixSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixSource::Configured => write!(f, "Manually Configured"),
            PrefixSource::Network => {
                write!(f, "Received From Neighbouring Router")
            }
            PrefixSource::Generated => write!(f, "Automatically Generated"),
        }
    }
}

// ===== impl AssignmentKey =====

impl std::fmt::Display for AssignmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (router {})", self.prefix, self.assigning_rtr)
    }
}

// ===== impl AssignmentState =====

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentState::Pending => write!(f, "pending"),
            AssignmentState::Active => write!(f, "active"),
            AssignmentState::Deprecating => write!(f, "deprecating"),
        }
    }
}

// ===== impl LocalAssignment =====

impl LocalAssignment {
    pub(crate) fn new(
        prefix: Ipv6Network,
        assigning_rtr: Ipv4Addr,
        assigning_iface_id: u32,
    ) -> LocalAssignment {
        LocalAssignment {
            prefix,
            assigning_rtr,
            assigning_iface_id,
            valid: true,
            state: AssignmentState::Pending,
            refreshed: true,
            installed: None,
            pending_timer: None,
            deprecation_timer: None,
        }
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey::new(self.prefix, self.assigning_rtr)
    }

    // Returns whether this router is the one that claimed the prefix.
    pub fn is_own(&self, router_id: Ipv4Addr) -> bool {
        self.assigning_rtr == router_id
    }

    // Returns whether the assignment must be advertised in our AC-LSA.
    pub(crate) fn is_advertised(&self, router_id: Ipv4Addr) -> bool {
        self.is_own(router_id)
            && self.valid
            && self.state != AssignmentState::Deprecating
    }
}
