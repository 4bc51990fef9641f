//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//
// Assignment lifecycle.
//
// Mint/Adopt -> Pending --(pending timer, still valid)--> Active
//                  |                                        |
//                  | invalidated                            | invalidated
//                  V                                        V
//               Removed <--(deprecation timer)------- Deprecating
//                                                           |
//                                                           | refreshed
//                                                           V
//                                                         Active
//

use ipnetwork::Ipv6Network;

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceUpView;
use crate::interface::{
    HISTORY_WRITE_DELAY_ADOPTED, HISTORY_WRITE_DELAY_OWN, Interface,
};
use crate::prefix::{
    AssignedPrefix, AssignmentKey, AssignmentState, LocalAssignment,
};
use crate::snapshot::Snapshot;
use crate::{southbound, tasks};

// ===== global functions =====

// Claims a new prefix for the interface.
pub(crate) fn mint(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    prefix: Ipv6Network,
) {
    Debug::PrefixMint(&iface.name, &prefix).log();

    let router_id = instance.state.router_id;
    let record = LocalAssignment::new(prefix, router_id, iface.ifindex);
    pending_start(iface, instance, record, HISTORY_WRITE_DELAY_OWN);
}

// Takes over a prefix a neighbor with a higher Router ID assigned to the
// link.
pub(crate) fn adopt(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    assignment: &AssignedPrefix,
) {
    let record = LocalAssignment::new(
        assignment.prefix,
        assignment.assigning_rtr,
        assignment.assigning_iface_id,
    );
    Debug::PrefixAdopt(&iface.name, &record.key()).log();

    pending_start(iface, instance, record, HISTORY_WRITE_DELAY_ADOPTED);
}

// Marks an assignment as confirmed by the current cycle.
pub(crate) fn refresh(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    key: &AssignmentKey,
) {
    let router_id = instance.state.router_id;
    let Some(record) = iface
        .assignments
        .iter_mut()
        .find(|record| record.key() == *key)
    else {
        return;
    };

    record.refreshed = true;
    record.valid = true;
    if record.state == AssignmentState::Deprecating {
        Debug::PrefixRefresh(&iface.name, key).log();

        record.deprecation_timer = None;
        record.state = AssignmentState::Active;
        if record.is_own(router_id) {
            instance.state.lsa_orig_pending = true;
        }
    }
}

// Invalidates an assignment. Pending assignments are dropped right away while
// active ones start their deprecation.
pub(crate) fn invalidate(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    key: &AssignmentKey,
) {
    let router_id = instance.state.router_id;
    let Some(idx) = iface.assignment_idx(key) else {
        return;
    };

    match iface.assignments[idx].state {
        AssignmentState::Pending => {
            Debug::PrefixInvalidate(&iface.name, key).log();
            remove(iface, instance, idx);
        }
        AssignmentState::Active => {
            Debug::PrefixInvalidate(&iface.name, key).log();

            let timeout = instance.config.timers.prefix_deprecation;
            let record = &mut iface.assignments[idx];
            record.valid = false;
            record.state = AssignmentState::Deprecating;
            if record.deprecation_timer.is_none() {
                let task = tasks::prefix_deprecation_timer(
                    &iface.name,
                    *key,
                    timeout,
                    &instance.tx.protocol_input.prefix_deprecation,
                );
                record.deprecation_timer = Some(task);
            }
            if record.is_own(router_id) {
                instance.state.lsa_orig_pending = true;
            }
        }
        AssignmentState::Deprecating => {}
    }
}

// Handles the expiry of the stabilization timer.
pub(crate) fn process_pending_expiry(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    key: &AssignmentKey,
    snapshot: &Snapshot,
) {
    let Some(idx) = iface.assignment_idx(key) else {
        return;
    };
    let record = &mut iface.assignments[idx];
    if record.state != AssignmentState::Pending {
        return;
    }
    record.pending_timer = None;

    if record.valid
        && snapshot.is_valid_network_wide(&record.prefix, record.assigning_rtr)
    {
        activate(iface, instance, idx);
    } else {
        remove(iface, instance, idx);
    }
}

// Handles the expiry of the deprecation timer.
pub(crate) fn process_deprecation_expiry(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    key: &AssignmentKey,
) {
    let router_id = instance.state.router_id;
    let Some(idx) = iface.assignment_idx(key) else {
        return;
    };
    if iface.assignments[idx].state != AssignmentState::Deprecating {
        return;
    }

    let own = iface.assignments[idx].is_own(router_id);
    remove(iface, instance, idx);
    if own {
        iface.history_write_schedule(HISTORY_WRITE_DELAY_OWN, instance);
    }
}

// Drops all assignments of the interface, uninstalling their addresses.
pub(crate) fn flush(iface: &mut Interface, instance: &mut InstanceUpView<'_>) {
    let router_id = instance.state.router_id;
    let mut uninstalled = false;

    for record in iface.assignments.drain(..) {
        if let Some(addr) = record.installed {
            southbound::tx::address_uninstall(
                &instance.tx.ibus,
                &iface.name,
                iface.ifindex,
                addr,
            );
            instance
                .tx
                .ibus
                .ra_prefix_del(iface.name.clone(), record.prefix);
            uninstalled = true;
        }
        if record.is_advertised(router_id) {
            instance.state.lsa_orig_pending = true;
        }
    }
    if uninstalled {
        instance.tx.ibus.ra_suppress(iface.name.clone(), true);
    }

    // Don't lose a pending history update.
    if iface.history_write_timer.take().is_some()
        && let Some(dir) = &instance.config.storage_dir
    {
        match iface.history.store(dir, &iface.name) {
            Ok(()) => Debug::HistoryStore(&iface.name, iface.history.len()).log(),
            Err(error) => Error::from(error).log(),
        }
    }
}

// ===== helper functions =====

// Adds a new pending record to the interface.
fn pending_start(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    mut record: LocalAssignment,
    history_delay: std::time::Duration,
) {
    // Remember the prefix for future reuse.
    iface.history.push(record.prefix);
    iface.history_write_schedule(history_delay, instance);

    let task = tasks::prefix_pending_timer(
        &iface.name,
        record.key(),
        instance.config.timers.prefix_pending,
        &instance.tx.protocol_input.prefix_pending,
    );
    record.pending_timer = Some(task);
    iface.assignments.push(record);

    instance.state.lsa_orig_pending = true;
}

// Moves a pending record to the active state, configuring the prefix on the
// link.
fn activate(iface: &mut Interface, instance: &mut InstanceUpView<'_>, idx: usize) {
    let first = !iface.has_installed();
    let mac_address = instance
        .system
        .interfaces
        .get(&iface.name)
        .and_then(|sys| sys.mac_address);

    let record = &mut iface.assignments[idx];
    Debug::PrefixActivate(&iface.name, &record.key()).log();
    record.state = AssignmentState::Active;

    let addr = southbound::interface_address(&record.prefix, mac_address);
    southbound::tx::address_install(
        &instance.tx.ibus,
        &iface.name,
        iface.ifindex,
        addr,
    );
    record.installed = Some(addr);
    instance
        .tx
        .ibus
        .ra_prefix_add(iface.name.clone(), record.prefix);
    if first {
        instance.tx.ibus.ra_suppress(iface.name.clone(), false);
    }
}

// Removes a record, undoing its address configuration.
fn remove(iface: &mut Interface, instance: &mut InstanceUpView<'_>, idx: usize) {
    let router_id = instance.state.router_id;
    let record = iface.assignments.remove(idx);
    Debug::PrefixRemove(&iface.name, &record.key()).log();

    if let Some(addr) = record.installed {
        southbound::tx::address_uninstall(
            &instance.tx.ibus,
            &iface.name,
            iface.ifindex,
            addr,
        );
        instance
            .tx
            .ibus
            .ra_prefix_del(iface.name.clone(), record.prefix);
        if !iface.has_installed() {
            instance.tx.ibus.ra_suppress(iface.name.clone(), true);
        }
    }

    if record.is_own(router_id) {
        instance.state.lsa_orig_pending = true;
    }
}
