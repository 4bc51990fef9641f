//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Instance;
use crate::interface::InterfaceSys;
use crate::packet::lsa::Lsa;
use crate::tasks;

// Router identity, kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct RouterIdentity {
    // Last generated Router ID.
    pub router_id: Option<Ipv4Addr>,
    // Hardware fingerprint advertised in the AC-LSA.
    pub fingerprint: u32,
    // Random generator, seeded from the fingerprint on first use.
    rng: Option<StdRng>,
}

// ===== impl RouterIdentity =====

impl RouterIdentity {
    // Draws a new Router ID. Never returns 0.0.0.0.
    pub fn generate_id(&mut self) -> Ipv4Addr {
        let fingerprint = self.fingerprint;
        let rng = self
            .rng
            .get_or_insert_with(|| StdRng::seed_from_u64(fingerprint.into()));
        loop {
            let router_id = rng.random::<u32>();
            if router_id != 0 {
                return Ipv4Addr::from(router_id);
            }
        }
    }
}

// ===== global functions =====

// Folds the hardware addresses of all operative non-loopback interfaces into
// a 32-bit value.
//
// Addresses are normalized to their modified EUI-64 form and summed, so the
// result doesn't depend on the interface ordering.
pub fn fingerprint<'a>(
    interfaces: impl IntoIterator<Item = &'a InterfaceSys>,
) -> u32 {
    interfaces
        .into_iter()
        .filter(|sys| sys.is_eligible())
        .filter_map(|sys| sys.mac_address)
        .fold(0u32, |fingerprint, mac_addr| {
            let value = mac_addr.interface_id() % u64::from(u32::MAX);
            fingerprint.wrapping_add(value as u32)
        })
}

// Handles a Hello packet advertising our own Router ID.
//
// When both routers are genuinely distinct, the one with the lower
// link-local address on the shared link picks a new Router ID.
pub(crate) fn check_router_id(
    instance: &mut Instance,
    ifname: &str,
    router_id: Ipv4Addr,
    src: Ipv6Addr,
    dst: Ipv6Addr,
) -> Result<(), Error> {
    // Our own packet looped back to us.
    if src == dst
        || instance
            .system
            .interfaces
            .values()
            .any(|sys| sys.linklocal.contains(&src))
    {
        return Ok(());
    }

    let sys = instance
        .system
        .interfaces
        .get(ifname)
        .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;
    let Some(linklocal) = sys.linklocal().copied() else {
        warn!(%ifname, "no link-local address, ignoring router-id collision");
        return Ok(());
    };

    Debug::RouterIdCollision(ifname, router_id, &src).log();
    if linklocal < src {
        reconfig_schedule(instance);
    }

    Ok(())
}

// Checks whether an AC-LSA that looks self-originated was really originated
// by another router using our Router ID.
//
// Returns true when our Router ID must change, in which case the LSA must be
// dropped.
pub(crate) fn check_fingerprint(instance: &mut Instance, lsa: &Lsa) -> bool {
    let Some(router_id) = instance.state.as_ref().map(|state| state.router_id)
    else {
        return false;
    };
    if lsa.hdr.adv_rtr != router_id || !lsa.hdr.lsa_id.is_unspecified() {
        return false;
    }

    let ours = instance.identity.fingerprint;
    match &lsa.body.fingerprint {
        Some(tlv) if tlv.fingerprint == ours => {
            return false;
        }
        Some(tlv) => {
            Debug::FingerprintConflict(ours, tlv.fingerprint).log();

            // The router with the higher fingerprint changes its Router ID.
            if ours < tlv.fingerprint {
                return false;
            }
        }
        None => {
            Error::MissingFingerprintTlv(lsa.hdr.key()).log();
        }
    }

    reconfig_schedule(instance);
    true
}

// ===== helper functions =====

// Schedules a Router ID regeneration, unless one is already scheduled.
fn reconfig_schedule(instance: &mut Instance) {
    if let Some((instance, _)) = instance.as_up()
        && instance.state.router_id_reconfig_timer.is_none()
    {
        let task = tasks::router_id_reconfig_timer(
            &instance.tx.protocol_input.router_id_reconfig,
        );
        instance.state.router_id_reconfig_timer = Some(task);
    }
}

// ===== unit tests =====
