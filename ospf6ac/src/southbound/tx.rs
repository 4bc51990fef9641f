//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ibus::IbusChannelsTx;

// ===== global functions =====

pub(crate) fn address_install(
    ibus_tx: &IbusChannelsTx,
    ifname: &str,
    ifindex: u32,
    addr: Ipv6Network,
) {
    ibus_tx.interface_ip_add(ifname.to_owned(), ifindex, addr);
}

pub(crate) fn address_uninstall(
    ibus_tx: &IbusChannelsTx,
    ifname: &str,
    ifindex: u32,
    addr: Ipv6Network,
) {
    ibus_tx.interface_ip_del(ifname.to_owned(), ifindex, addr);
}
