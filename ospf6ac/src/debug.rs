//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnetwork::Ipv6Network;
use tracing::{debug, debug_span};

use crate::neighbor::nsm;
use crate::packet::lsa::{AcLsaBody, LsaHdr, LsaKey};
use crate::prefix::AssignmentKey;

// Autoconfiguration debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceStart(Ipv4Addr),
    InstanceStop(InstanceInactiveReason),
    // Router identity
    RouterIdGenerate(Ipv4Addr, u32),
    RouterIdCollision(&'a str, Ipv4Addr, &'a Ipv6Addr),
    FingerprintConflict(u32, u32),
    // Interfaces
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    HistoryLoad(&'a str, usize),
    HistoryStore(&'a str, usize),
    // Neighbors
    NeighborCreate(&'a str, Ipv4Addr),
    NeighborDelete(&'a str, Ipv4Addr),
    NeighborStateChange(&'a str, Ipv4Addr, nsm::State),
    // AC-LSA database
    LsaInstall(&'a LsaHdr),
    LsaDelete(&'a LsaKey),
    LsaOriginate(&'a AcLsaBody),
    // Assignment cycle
    CycleStart(usize),
    CycleAbort(&'a str, Ipv4Addr),
    // Assignment lifecycle
    PrefixMint(&'a str, &'a Ipv6Network),
    PrefixAdopt(&'a str, &'a AssignmentKey),
    PrefixActivate(&'a str, &'a AssignmentKey),
    PrefixRefresh(&'a str, &'a AssignmentKey),
    PrefixInvalidate(&'a str, &'a AssignmentKey),
    PrefixRemove(&'a str, &'a AssignmentKey),
    // ULA
    UlaGenerationStart,
    UlaGenerationCancel,
    UlaCreate(&'a Ipv6Network),
    UlaTerminationStart(&'a Ipv6Network),
    UlaTerminationCancel(&'a Ipv6Network),
    UlaRemove(&'a Ipv6Network),
}

// Reason why the autoconfiguration instance is inactive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceInactiveReason {
    AdminDown,
    RouterIdConflict,
    NoInterfaces,
    Resetting,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceStart(router_id) => {
                // Parent span(s): ospf6ac-instance
                debug!(%router_id, "{}", self);
            }
            Debug::InstanceStop(reason) => {
                // Parent span(s): ospf6ac-instance
                debug!(%reason, "{}", self);
            }
            Debug::RouterIdGenerate(router_id, fingerprint) => {
                // Parent span(s): ospf6ac-instance
                debug!(%router_id, %fingerprint, "{}", self);
            }
            Debug::RouterIdCollision(name, router_id, source) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%router_id, %source, "{}", self);
                })
            }
            Debug::FingerprintConflict(ours, theirs) => {
                // Parent span(s): ospf6ac-instance
                debug!(%ours, %theirs, "{}", self);
            }
            Debug::InterfaceCreate(name) | Debug::InterfaceDelete(name) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::HistoryLoad(name, count) | Debug::HistoryStore(name, count) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%count, "{}", self);
                })
            }
            Debug::NeighborCreate(name, router_id)
            | Debug::NeighborDelete(name, router_id) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug_span!("neighbor", %router_id).in_scope(|| {
                        debug!("{}", self);
                    })
                })
            }
            Debug::NeighborStateChange(name, router_id, state) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug_span!("neighbor", %router_id).in_scope(|| {
                        debug!(?state, "{}", self);
                    })
                })
            }
            Debug::LsaInstall(hdr) => {
                // Parent span(s): ospf6ac-instance
                debug!(adv_rtr = %hdr.adv_rtr, lsa_id = %hdr.lsa_id, seq_no = %format!("{:#010x}", hdr.seq_no), "{}", self);
            }
            Debug::LsaDelete(lsa_key) => {
                // Parent span(s): ospf6ac-instance
                debug!(adv_rtr = %lsa_key.adv_rtr, lsa_id = %lsa_key.lsa_id, "{}", self);
            }
            Debug::LsaOriginate(body) => {
                // Parent span(s): ospf6ac-instance
                debug!(
                    aggregated = %body.aggregated.len(),
                    assigned = %body.assigned.len(),
                    "{}", self
                );
            }
            Debug::CycleStart(aggregates) => {
                // Parent span(s): ospf6ac-instance
                debug!(%aggregates, "{}", self);
            }
            Debug::CycleAbort(name, router_id) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(neighbor = %router_id, "{}", self);
                })
            }
            Debug::PrefixMint(name, prefix) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%prefix, "{}", self);
                })
            }
            Debug::PrefixAdopt(name, key)
            | Debug::PrefixActivate(name, key)
            | Debug::PrefixRefresh(name, key)
            | Debug::PrefixInvalidate(name, key)
            | Debug::PrefixRemove(name, key) => {
                // Parent span(s): ospf6ac-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(prefix = %key.prefix, assigning_router = %key.assigning_rtr, "{}", self);
                })
            }
            Debug::UlaGenerationStart | Debug::UlaGenerationCancel => {
                // Parent span(s): ospf6ac-instance
                debug!("{}", self);
            }
            Debug::UlaCreate(prefix)
            | Debug::UlaTerminationStart(prefix)
            | Debug::UlaTerminationCancel(prefix)
            | Debug::UlaRemove(prefix) => {
                // Parent span(s): ospf6ac-instance
                debug!(%prefix, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceStart(..) => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop(..) => {
                write!(f, "stopping instance")
            }
            Debug::RouterIdGenerate(..) => {
                write!(f, "router-id generated")
            }
            Debug::RouterIdCollision(..) => {
                write!(f, "router-id collision detected")
            }
            Debug::FingerprintConflict(..) => {
                write!(f, "hardware fingerprint mismatch in self-originated LSA")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceDelete(..) => {
                write!(f, "interface deleted")
            }
            Debug::HistoryLoad(..) => {
                write!(f, "associated prefix history loaded")
            }
            Debug::HistoryStore(..) => {
                write!(f, "associated prefix history stored")
            }
            Debug::NeighborCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NeighborDelete(..) => {
                write!(f, "neighbor deleted")
            }
            Debug::NeighborStateChange(..) => {
                write!(f, "neighbor state change")
            }
            Debug::LsaInstall(..) => {
                write!(f, "installing LSA")
            }
            Debug::LsaDelete(..) => {
                write!(f, "deleting LSA")
            }
            Debug::LsaOriginate(..) => {
                write!(f, "requesting LSA origination")
            }
            Debug::CycleStart(..) => {
                write!(f, "running prefix assignment")
            }
            Debug::CycleAbort(..) => {
                write!(f, "prefix assignment aborted: neighbor LSA not reachable")
            }
            Debug::PrefixMint(..) => {
                write!(f, "prefix assigned")
            }
            Debug::PrefixAdopt(..) => {
                write!(f, "neighbor's prefix adopted")
            }
            Debug::PrefixActivate(..) => {
                write!(f, "prefix activated")
            }
            Debug::PrefixRefresh(..) => {
                write!(f, "prefix refreshed")
            }
            Debug::PrefixInvalidate(..) => {
                write!(f, "prefix invalidated")
            }
            Debug::PrefixRemove(..) => {
                write!(f, "prefix removed")
            }
            Debug::UlaGenerationStart => {
                write!(f, "scheduling ULA prefix generation")
            }
            Debug::UlaGenerationCancel => {
                write!(f, "ULA prefix generation canceled")
            }
            Debug::UlaCreate(..) => {
                write!(f, "ULA prefix created")
            }
            Debug::UlaTerminationStart(..) => {
                write!(f, "scheduling ULA prefix removal")
            }
            Debug::UlaTerminationCancel(..) => {
                write!(f, "ULA prefix removal canceled")
            }
            Debug::UlaRemove(..) => {
                write!(f, "ULA prefix removed")
            }
        }
    }
}

// ===== impl InstanceInactiveReason =====

impl std::fmt::Display for InstanceInactiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceInactiveReason::AdminDown => {
                write!(f, "administrative status down")
            }
            InstanceInactiveReason::RouterIdConflict => {
                write!(f, "router-id conflict")
            }
            InstanceInactiveReason::NoInterfaces => {
                write!(f, "no eligible interfaces")
            }
            InstanceInactiveReason::Resetting => {
                write!(f, "resetting")
            }
        }
    }
}
