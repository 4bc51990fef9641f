//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

use crate::assignment;
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::{Instance, InstanceUpView};
use crate::interface::Interfaces;
use crate::lifecycle;
use crate::lsdb::Lsdb;
use crate::neighbor::{Neighbor, nsm};
use crate::packet::lsa::{Lsa, LsaHdr, LsaKey};
use crate::prefix::AssignmentKey;
use crate::router_id;
use crate::snapshot::Snapshot;
use crate::ula;

// ===== AC-LSA update =====

pub(crate) fn process_lsa_update(
    instance: &mut Instance,
    raw: Bytes,
    reachable: bool,
) -> Result<(), Error> {
    // Decode LSA.
    let lsa = match Lsa::decode(&mut raw.clone()) {
        Ok(lsa) => lsa,
        Err(error) => {
            // A malformed LSA must not be used by the next cycles.
            let key = LsaHdr::decode(&mut raw.clone())
                .ok()
                .map(|hdr| hdr.key());
            if let Some(key) = &key
                && let Some((mut instance, _)) = instance.as_up()
                && instance.state.lsdb.remove(key).is_some()
            {
                assignment::cycle_schedule(&mut instance);
            }
            return Err(Error::LsaDecodeError(key, error));
        }
    };

    // Check for a Router ID collision. The LSA is dropped when we lose the
    // tie-break, since our Router ID is about to change.
    if router_id::check_fingerprint(instance, &lsa) {
        return Ok(());
    }

    let Some((mut instance, _)) = instance.as_up() else {
        return Ok(());
    };

    // Refreshes that don't change anything don't need a new cycle.
    let changed = lsa_changed(&instance.state.lsdb, &lsa, reachable);
    instance.state.lsdb.insert(lsa, reachable);
    if changed {
        assignment::cycle_schedule(&mut instance);
    }

    Ok(())
}

// ===== AC-LSA delete =====

pub(crate) fn process_lsa_delete(
    instance: &mut Instance,
    adv_rtr: Ipv4Addr,
    lsa_id: Ipv4Addr,
) {
    let Some((mut instance, _)) = instance.as_up() else {
        return;
    };

    let key = LsaKey::new(adv_rtr, lsa_id);
    if instance.state.lsdb.remove(&key).is_some() {
        assignment::cycle_schedule(&mut instance);
    }
}

// ===== router reachability change =====

pub(crate) fn process_router_reachability(
    instance: &mut Instance,
    router_id: Ipv4Addr,
    reachable: bool,
) {
    let Some((mut instance, _)) = instance.as_up() else {
        return;
    };

    if instance.state.lsdb.set_reachable(router_id, reachable) {
        assignment::cycle_schedule(&mut instance);
    }
}

// ===== neighbor update =====

pub(crate) fn process_nbr_update(
    instance: &mut Instance,
    ifname: &str,
    router_id: Ipv4Addr,
    iface_id: u32,
    src: Ipv6Addr,
    state: nsm::State,
) -> Result<(), Error> {
    let Some((mut instance, interfaces)) = instance.as_up() else {
        return Ok(());
    };

    // Lookup interface.
    let iface = interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    // A neighbor going down is no longer known.
    if state == nsm::State::Down {
        if iface.neighbors.remove(&router_id).is_some() {
            Debug::NeighborDelete(&iface.name, router_id).log();
            assignment::cycle_schedule(&mut instance);
        }
        return Ok(());
    }

    match iface.neighbors.get_mut(&router_id) {
        Some(nbr) => {
            let changed = nbr.state != state || nbr.iface_id != iface_id;
            if nbr.state != state {
                Debug::NeighborStateChange(&iface.name, router_id, state)
                    .log();
            }
            nbr.state = state;
            nbr.iface_id = iface_id;
            nbr.src = src;
            if !changed {
                return Ok(());
            }
        }
        None => {
            Debug::NeighborCreate(&iface.name, router_id).log();
            let nbr = Neighbor::new(router_id, iface_id, src, state);
            iface.neighbors.insert(router_id, nbr);
        }
    }

    assignment::cycle_schedule(&mut instance);

    Ok(())
}

// ===== neighbor delete =====

pub(crate) fn process_nbr_delete(
    instance: &mut Instance,
    ifname: &str,
    router_id: Ipv4Addr,
) -> Result<(), Error> {
    let Some((mut instance, interfaces)) = instance.as_up() else {
        return Ok(());
    };

    // Lookup interface.
    let iface = interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    if iface.neighbors.remove(&router_id).is_some() {
        Debug::NeighborDelete(&iface.name, router_id).log();
        assignment::cycle_schedule(&mut instance);
    }

    Ok(())
}

// ===== Hello packet reception =====

pub(crate) fn process_hello_rx(
    instance: &mut Instance,
    ifname: &str,
    router_id: Ipv4Addr,
    src: Ipv6Addr,
    dst: Ipv6Addr,
) -> Result<(), Error> {
    let ours = instance.state.as_ref().map(|state| state.router_id);
    if ours != Some(router_id) {
        return Ok(());
    }

    router_id::check_router_id(instance, ifname, router_id, src, dst)
}

// ===== timeout: assignment cycle =====

pub(crate) fn process_assign_cycle(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
) {
    instance.state.assign_timer = None;
    assignment::run_cycle(instance, interfaces);
}

// ===== timeout: assignment stabilization =====

pub(crate) fn process_prefix_pending(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
    ifname: &str,
    key: AssignmentKey,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    // The network-wide validity is checked again against a fresh view.
    let snapshot = Snapshot::build(
        &instance.state.lsdb,
        instance.state.router_id,
        &instance.state.aggregated,
    );
    lifecycle::process_pending_expiry(iface, instance, &key, &snapshot);

    Ok(())
}

// ===== timeout: assignment deprecation =====

pub(crate) fn process_prefix_deprecation(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
    ifname: &str,
    key: AssignmentKey,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;

    lifecycle::process_deprecation_expiry(iface, instance, &key);

    Ok(())
}

// ===== timeout: history write =====

pub(crate) fn process_history_write(
    instance: &mut InstanceUpView<'_>,
    interfaces: &mut Interfaces,
    ifname: &str,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = interfaces
        .get_mut(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;
    iface.history_write_timer = None;

    if let Some(dir) = &instance.config.storage_dir {
        iface.history.store(dir, &iface.name)?;
        Debug::HistoryStore(&iface.name, iface.history.len()).log();
    }

    Ok(())
}

// ===== timeout: ULA generation =====

pub(crate) fn process_ula_generation(
    instance: &mut InstanceUpView<'_>,
    interfaces: &Interfaces,
) -> Result<(), Error> {
    ula::process_generation_expiry(instance, interfaces)
}

// ===== timeout: ULA termination =====

pub(crate) fn process_ula_termination(instance: &mut InstanceUpView<'_>) {
    ula::process_termination_expiry(instance);
}

// ===== timeout: Router ID reconfiguration =====

pub(crate) fn process_router_id_reconfig(
    instance: &mut Instance,
) -> Result<(), Error> {
    let Some(state) = &mut instance.state else {
        return Ok(());
    };
    state.router_id_reconfig_timer = None;

    instance.router_id_reset();

    Ok(())
}

// ===== helper functions =====

fn lsa_changed(lsdb: &Lsdb, lsa: &Lsa, reachable: bool) -> bool {
    match lsdb.get(&lsa.hdr.key()) {
        Some(lse) => lse.reachable != reachable || lse.lsa.body != lsa.body,
        None => true,
    }
}
