//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;
use ospf6ac_utils::mac_addr::MacAddr;
use ospf6ac_utils::southbound::InterfaceFlags;
use ospf6ac_utils::task::TimeoutTask;

use crate::debug::Debug;
use crate::history::AssociatedPrefixHistory;
use crate::instance::InstanceUpView;
use crate::neighbor::Neighbor;
use crate::prefix::{AssignmentKey, LocalAssignment};
use crate::tasks;

// Useful type definition(s).
pub type Interfaces = BTreeMap<String, Interface>;

// Delay before persisting the history after a self-assigned prefix.
pub const HISTORY_WRITE_DELAY_OWN: Duration = Duration::from_secs(1);
// Delay before persisting the history after an adopted prefix.
pub const HISTORY_WRITE_DELAY_ADOPTED: Duration = Duration::from_secs(60);

// Interface taking part in the autoconfiguration.
#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub ifindex: u32,
    pub area_id: Ipv4Addr,
    pub neighbors: BTreeMap<Ipv4Addr, Neighbor>,
    pub assignments: Vec<LocalAssignment>,
    pub history: AssociatedPrefixHistory,
    pub history_write_timer: Option<TimeoutTask>,
}

// Interface data learned from the address plane.
#[derive(Clone, Debug, Default)]
pub struct InterfaceSys {
    pub ifindex: u32,
    pub flags: InterfaceFlags,
    pub mac_address: Option<MacAddr>,
    pub linklocal: BTreeSet<Ipv6Addr>,
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(
        name: String,
        ifindex: u32,
        area_id: Ipv4Addr,
        history: AssociatedPrefixHistory,
    ) -> Interface {
        Debug::InterfaceCreate(&name).log();

        Interface {
            name,
            ifindex,
            area_id,
            neighbors: Default::default(),
            assignments: Default::default(),
            history,
            history_write_timer: None,
        }
    }

    // Only backbone interfaces take part in prefix assignment.
    pub fn is_backbone(&self) -> bool {
        self.area_id.is_unspecified()
    }

    pub fn active_neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values().filter(|nbr| nbr.is_active())
    }

    pub fn assignment(&self, key: &AssignmentKey) -> Option<&LocalAssignment> {
        self.assignments.iter().find(|record| record.key() == *key)
    }

    pub(crate) fn assignment_idx(&self, key: &AssignmentKey) -> Option<usize> {
        self.assignments.iter().position(|record| record.key() == *key)
    }

    // Returns our own assignment inside the given aggregate, preferring a
    // valid one when an invalid record is still being deprecated.
    pub(crate) fn own_assignment(
        &self,
        aggregate: &Ipv6Network,
        router_id: Ipv4Addr,
    ) -> Option<AssignmentKey> {
        let mut records = self.assignments.iter().filter(|record| {
            record.is_own(router_id) && aggregate.covers(&record.prefix)
        });
        let first = records.clone().next()?;
        Some(
            records
                .find(|record| record.valid)
                .unwrap_or(first)
                .key(),
        )
    }

    // Returns whether an interface address is currently installed for any
    // of the assignments.
    pub fn has_installed(&self) -> bool {
        self.assignments
            .iter()
            .any(|record| record.installed.is_some())
    }

    // Schedules a write of the history to stable storage. An already
    // scheduled write that expires sooner is kept.
    pub(crate) fn history_write_schedule(
        &mut self,
        delay: Duration,
        instance: &InstanceUpView<'_>,
    ) {
        if let Some(timer) = &self.history_write_timer
            && timer.remaining() <= delay
        {
            return;
        }

        let task = tasks::history_write_timer(
            &self.name,
            delay,
            &instance.tx.protocol_input.history_write,
        );
        self.history_write_timer = Some(task);
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        Debug::InterfaceDelete(&self.name).log();
    }
}

// ===== impl InterfaceSys =====

impl InterfaceSys {
    // Returns whether the interface can be used for autoconfiguration.
    pub fn is_eligible(&self) -> bool {
        self.flags.contains(InterfaceFlags::OPERATIVE)
            && !self.flags.contains(InterfaceFlags::LOOPBACK)
    }

    // Returns the lowest link-local address of the interface.
    pub fn linklocal(&self) -> Option<&Ipv6Addr> {
        self.linklocal.iter().next()
    }
}
