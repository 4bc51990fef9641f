//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceUpView;
use crate::interface::{Interface, Interfaces};
use crate::prefix::{AssignedPrefix, AssignmentKey};
use crate::snapshot::Snapshot;
use crate::{lifecycle, tasks, ula};

// Length of the prefixes minted out of an aggregate.
pub const ASSIGNED_PREFIX_LEN: u8 = 64;

// Assignment that controls an aggregate/interface pair.
#[derive(Debug)]
enum Controlling {
    // Our own local record.
    Own(AssignmentKey),
    // Assignment of a neighbor with a higher Router ID.
    Neighbor(AssignedPrefix),
}

// ===== global functions =====

// Schedules an assignment cycle, unless one is already scheduled.
pub(crate) fn cycle_schedule(instance: &mut InstanceUpView<'_>) {
    if instance.state.assign_timer.is_none() {
        let task =
            tasks::assign_timer(&instance.tx.protocol_input.assign_cycle);
        instance.state.assign_timer = Some(task);
    }
}

// Runs the prefix assignment algorithm over all backbone interfaces.
pub(crate) fn run_cycle(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
) {
    let router_id = instance.state.router_id;
    let snapshot = Snapshot::build(
        &instance.state.lsdb,
        router_id,
        &instance.state.aggregated,
    );

    // Don't act on a partial view of the backbone: every known neighbor
    // must have a reachable AC-LSA.
    if let Some((iface, nbr)) = interfaces
        .values()
        .filter(|iface| iface.is_backbone())
        .flat_map(|iface| {
            iface.neighbors.values().map(move |nbr| (iface, nbr))
        })
        .find(|(_, nbr)| !snapshot.reachable.contains(&nbr.router_id))
    {
        Debug::CycleAbort(&iface.name, nbr.router_id).log();
        ula::generation_cancel(instance);
        return;
    }

    // Replace the working list of aggregated prefixes.
    instance.state.aggregated = snapshot.aggregated.clone();

    // Schedule or cancel the ULA timers.
    ula::update(instance, &snapshot);

    // Every record must be confirmed again by this cycle.
    for record in interfaces
        .values_mut()
        .filter(|iface| iface.is_backbone())
        .flat_map(|iface| iface.assignments.iter_mut())
    {
        record.refreshed = false;
    }

    let aggregates = allocation_units(&snapshot);
    Debug::CycleStart(aggregates.len()).log();

    let ifnames = interfaces
        .values()
        .filter(|iface| iface.is_backbone())
        .map(|iface| iface.name.clone())
        .collect::<Vec<_>>();
    for aggregate in &aggregates {
        for ifname in &ifnames {
            if let Err(error) = process_pair(
                instance,
                interfaces,
                &snapshot,
                aggregate,
                ifname,
            ) {
                error.log();
            }
        }
    }

    // Records that weren't confirmed are no longer valid.
    for iface in interfaces.values_mut().filter(|iface| iface.is_backbone()) {
        let stale = iface
            .assignments
            .iter()
            .filter(|record| !record.refreshed)
            .map(|record| record.key())
            .collect::<Vec<_>>();
        for key in stale {
            lifecycle::invalidate(iface, instance, &key);
        }
    }
}

// Returns the aggregates that prefixes are carved out of.
//
// An aggregate that contains another one isn't used, and aggregates
// advertised by several routers are considered only once.
pub(crate) fn allocation_units(snapshot: &Snapshot) -> Vec<Ipv6Network> {
    let prefixes = snapshot
        .aggregated
        .iter()
        .map(|aggregate| aggregate.prefix)
        .collect::<BTreeSet<_>>();

    prefixes
        .iter()
        .filter(|prefix| {
            !prefixes.iter().any(|other| prefix.strictly_covers(other))
        })
        .copied()
        .collect()
}

// ===== helper functions =====

// Runs the assignment decision for one aggregate on one interface.
fn process_pair(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
    snapshot: &Snapshot,
    aggregate: &Ipv6Network,
    ifname: &str,
) -> Result<(), Error> {
    let router_id = instance.state.router_id;
    let iface = interfaces
        .get(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    // Check whether we have the highest Router ID on the link.
    let has_highest_rid = iface
        .active_neighbors()
        .all(|nbr| nbr.router_id <= router_id);

    // Find the highest assignment made by a neighbor for this link.
    let highest_assignment = iface
        .active_neighbors()
        .flat_map(|nbr| {
            snapshot.assigned.iter().filter(move |assignment| {
                assignment.assigning_rtr == nbr.router_id
                    && assignment.assigning_iface_id == nbr.iface_id
                    && aggregate.covers(&assignment.prefix)
            })
        })
        .max_by_key(|assignment| assignment.assigning_rtr)
        .copied();

    let controlling = match highest_assignment {
        Some(assignment) if assignment.assigning_rtr > router_id => {
            Some(Controlling::Neighbor(assignment))
        }
        _ => iface
            .own_assignment(aggregate, router_id)
            .map(Controlling::Own),
    };

    match controlling {
        Some(Controlling::Own(key)) => {
            let iface = iface_mut(interfaces, ifname)?;
            if snapshot.is_valid_network_wide(&key.prefix, key.assigning_rtr) {
                lifecycle::refresh(iface, instance, &key);
            } else {
                lifecycle::invalidate(iface, instance, &key);
            }
        }
        Some(Controlling::Neighbor(assignment)) => {
            let key = AssignmentKey::new(
                assignment.prefix,
                assignment.assigning_rtr,
            );
            if iface.assignment(&key).is_some() {
                let iface = iface_mut(interfaces, ifname)?;
                lifecycle::refresh(iface, instance, &key);
            } else if validate_locally(instance, interfaces, &assignment) {
                let iface = iface_mut(interfaces, ifname)?;
                lifecycle::adopt(iface, instance, &assignment);
            }
        }
        None if has_highest_rid => {
            let prefix =
                mint_candidate(interfaces, snapshot, aggregate, ifname)?;
            let iface = iface_mut(interfaces, ifname)?;
            lifecycle::mint(iface, instance, prefix);
        }
        None => {}
    }

    Ok(())
}

// Checks a neighbor's assignment against our local records before adopting
// it. Local records of the same prefix made by routers with a lower Router
// ID are invalidated along the way.
fn validate_locally(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
    assignment: &AssignedPrefix,
) -> bool {
    let mut valid = true;

    for iface in interfaces.values_mut().filter(|iface| iface.is_backbone()) {
        let lower = iface
            .assignments
            .iter()
            .filter(|record| record.prefix == assignment.prefix)
            .filter_map(|record| {
                if record.assigning_rtr > assignment.assigning_rtr {
                    valid = false;
                    None
                } else if record.assigning_rtr < assignment.assigning_rtr {
                    Some(record.key())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        for key in lower {
            lifecycle::invalidate(iface, instance, &key);
        }
    }

    valid
}

// Picks a prefix to claim inside the aggregate, preferring one recently
// used by the interface.
fn mint_candidate(
    interfaces: &Interfaces,
    snapshot: &Snapshot,
    aggregate: &Ipv6Network,
    ifname: &str,
) -> Result<Ipv6Network, Error> {
    let iface = interfaces
        .get(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    // Prefixes already claimed, including our claims that weren't echoed
    // back by the LSDB yet.
    let in_use = snapshot
        .assigned
        .iter()
        .map(|assignment| assignment.prefix)
        .chain(
            interfaces
                .values()
                .flat_map(|iface| iface.assignments.iter())
                .map(|record| record.prefix),
        )
        .filter(|prefix| aggregate.covers(prefix))
        .collect::<BTreeSet<_>>();

    let is_free = |prefix: &Ipv6Network| {
        !in_use
            .iter()
            .any(|used| used.covers(prefix) || prefix.covers(used))
    };

    // Stability: reuse a prefix from the history if possible.
    if let Some(prefix) = iface.history.iter().find(|prefix| {
        prefix.prefix() == ASSIGNED_PREFIX_LEN
            && aggregate.covers(prefix)
            && is_free(prefix)
    }) {
        return Ok(*prefix);
    }

    // Otherwise take the first free /64.
    (0u128..)
        .map_while(|n| aggregate.nth_subnet(ASSIGNED_PREFIX_LEN, n))
        .find(is_free)
        .ok_or_else(|| {
            Error::PrefixSpaceExhausted(ifname.to_owned(), *aggregate)
        })
}

fn iface_mut<'a>(
    interfaces: &'a mut Interfaces,
    ifname: &str,
) -> Result<&'a mut Interface, Error> {
    interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))
}

// ===== unit tests =====
