//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use ospf6ac_utils::ip::Ipv6AddrExt;
use ospf6ac_utils::southbound::{AddressMsg, InterfaceUpdateMsg};

use crate::instance::Instance;

// ===== global functions =====

pub(crate) fn process_iface_update(
    instance: &mut Instance,
    msg: InterfaceUpdateMsg,
) {
    let sys = instance.system.interfaces.entry(msg.ifname).or_default();
    sys.ifindex = msg.ifindex;
    sys.flags = msg.flags;
    sys.mac_address = msg.mac_address.filter(|mac_addr| !mac_addr.is_zero());

    // Check if the instance needs to be started, stopped, or if the set of
    // autoconfiguration interfaces changed.
    instance.update();
}

pub(crate) fn process_iface_delete(instance: &mut Instance, ifname: String) {
    if instance.system.interfaces.remove(&ifname).is_none() {
        return;
    }

    instance.update();
}

pub(crate) fn process_addr_add(instance: &mut Instance, msg: AddressMsg) {
    // Only link-local addresses are of interest (Router ID collisions).
    let IpNetwork::V6(addr) = msg.addr else {
        return;
    };
    if !addr.ip().is_link_local() {
        return;
    }

    if let Some(sys) = instance.system.interfaces.get_mut(&msg.ifname) {
        sys.linklocal.insert(addr.ip());
    }
}

pub(crate) fn process_addr_del(instance: &mut Instance, msg: AddressMsg) {
    let IpNetwork::V6(addr) = msg.addr else {
        return;
    };

    if let Some(sys) = instance.system.interfaces.get_mut(&msg.ifname) {
        sys.linklocal.remove(&addr.ip());
    }
}
