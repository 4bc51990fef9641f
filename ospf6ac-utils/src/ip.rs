//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use ipnetwork::Ipv6Network;

// Extension methods for Ipv6Addr.
pub trait Ipv6AddrExt {
    // Returns true if this is a link-local unicast address (fe80::/10).
    fn is_link_local(&self) -> bool;
}

// Extension methods for Ipv6Network.
//
// All prefix arithmetic is done on 128-bit integers.
pub trait Ipv6NetworkExt {
    const MAX_PREFIXLEN: u8;

    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> Ipv6Network;

    // Returns true if this is a routable network.
    fn is_routable(&self) -> bool;

    // Returns true if this prefix falls within the Unique Local range
    // (fc00::/7).
    fn is_ula(&self) -> bool;

    // Returns the network address as a 128-bit integer.
    fn network_bits(&self) -> u128;

    // Returns true if `other` lies entirely within `self` (equal prefixes
    // included).
    fn covers(&self, other: &Ipv6Network) -> bool;

    // Returns true if `other` lies within `self` and is more specific.
    fn strictly_covers(&self, other: &Ipv6Network) -> bool;

    // Returns the n-th subnet of length `prefix` carved out of `self`, or
    // `None` if there is no such subnet.
    fn nth_subnet(&self, prefix: u8, n: u128) -> Option<Ipv6Network>;
}

// ===== impl Ipv6Addr =====

impl Ipv6AddrExt for Ipv6Addr {
    fn is_link_local(&self) -> bool {
        self.is_unicast_link_local()
    }
}

// ===== impl Ipv6Network =====

impl Ipv6NetworkExt for Ipv6Network {
    const MAX_PREFIXLEN: u8 = 128;

    fn apply_mask(&self) -> Ipv6Network {
        Ipv6Network::new(self.network(), self.prefix()).unwrap()
    }

    fn is_routable(&self) -> bool {
        !self.ip().is_loopback()
            && !self.ip().is_multicast()
            && !self.ip().is_unicast_link_local()
    }

    fn is_ula(&self) -> bool {
        self.prefix() >= 7 && self.ip().octets()[0] & 0xfe == 0xfc
    }

    fn network_bits(&self) -> u128 {
        u128::from(self.network())
    }

    fn covers(&self, other: &Ipv6Network) -> bool {
        if other.prefix() < self.prefix() {
            return false;
        }
        let mask = prefix_mask(self.prefix());
        other.network_bits() & mask == self.network_bits()
    }

    fn strictly_covers(&self, other: &Ipv6Network) -> bool {
        other.prefix() > self.prefix() && self.covers(other)
    }

    fn nth_subnet(&self, prefix: u8, n: u128) -> Option<Ipv6Network> {
        if prefix < self.prefix() || prefix > Self::MAX_PREFIXLEN {
            return None;
        }

        // Make sure the index fits in the available subnet bits.
        let subnet_bits = u32::from(prefix - self.prefix());
        if subnet_bits < 128 && n >= (1u128 << subnet_bits) {
            return None;
        }

        let offset = n
            .checked_shl(u32::from(Self::MAX_PREFIXLEN - prefix))
            .unwrap_or(0);
        let addr = Ipv6Addr::from(self.network_bits() | offset);
        Ipv6Network::new(addr, prefix).ok()
    }
}

// ===== helper functions =====

fn prefix_mask(prefix: u8) -> u128 {
    match prefix {
        0 => 0,
        _ => u128::MAX << (128 - u32::from(prefix)),
    }
}

// ===== unit tests =====
