//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod rx;
pub mod tx;

use std::net::Ipv6Addr;

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;
use ospf6ac_utils::mac_addr::MacAddr;

// Prefixes up to this length leave room for an EUI-64 interface identifier.
const EUI64_MAX_PREFIXLEN: u8 = 64;

// ===== global functions =====

// Returns the interface address derived from an assigned prefix.
//
// The interface identifier is the modified EUI-64 of the interface's hardware
// address when the prefix leaves room for it, and ::1 otherwise.
pub fn interface_address(
    prefix: &Ipv6Network,
    mac_address: Option<MacAddr>,
) -> Ipv6Network {
    let iid = match mac_address {
        Some(mac_address) if prefix.prefix() <= EUI64_MAX_PREFIXLEN => {
            u128::from(mac_address.interface_id())
        }
        _ => 1,
    };
    let addr = Ipv6Addr::from(prefix.network_bits() | iid);
    Ipv6Network::new(addr, prefix.prefix()).unwrap()
}

// ===== unit tests =====
