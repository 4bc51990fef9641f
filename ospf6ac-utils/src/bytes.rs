//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ipnetwork::Ipv6Network;

use crate::ip::Ipv6NetworkExt;

// Scratch buffer reused by every LSA encoding on the current thread.
thread_local!(
    pub static TLS_BUF: RefCell<BytesMut> =
        RefCell::new(BytesMut::with_capacity(1024))
);

// Encoded size of an IPv6 prefix field: length octet plus full address.
pub const IPV6_PREFIX_SIZE: usize = 17;

// Extension methods for Bytes.
pub trait BytesExt {
    /// Gets an IPv4 addr (router ID, LSA ID) in big-endian byte order.
    fn get_ipv4(&mut self) -> Ipv4Addr;

    /// Gets an IPv6 prefix field: one octet of prefix length followed by the
    /// 16-octet address. Host bits are cleared.
    ///
    /// On failure the offending prefix length is returned. The caller must
    /// ensure at least [`IPV6_PREFIX_SIZE`] bytes remain.
    fn get_ipv6_prefix(&mut self) -> Result<Ipv6Network, u8>;
}

// Extension methods for BytesMut.
pub trait BytesMutExt {
    /// Writes an IPv4 addr in big-endian byte order.
    fn put_ipv4(&mut self, addr: &Ipv4Addr);

    /// Writes an IPv6 prefix field in the layout read by
    /// [`BytesExt::get_ipv6_prefix`].
    fn put_ipv6_prefix(&mut self, prefix: &Ipv6Network);
}

// ===== impl Bytes =====

impl BytesExt for Bytes {
    fn get_ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_u32())
    }

    fn get_ipv6_prefix(&mut self) -> Result<Ipv6Network, u8> {
        let plen = self.get_u8();
        let addr = Ipv6Addr::from(self.get_u128());
        Ipv6Network::new(addr, plen)
            .map(|prefix| prefix.apply_mask())
            .map_err(|_| plen)
    }
}

// ===== impl BytesMut =====

impl BytesMutExt for BytesMut {
    fn put_ipv4(&mut self, addr: &Ipv4Addr) {
        self.put_u32((*addr).into())
    }

    fn put_ipv6_prefix(&mut self, prefix: &Ipv6Network) {
        self.put_u8(prefix.prefix());
        self.put_slice(&prefix.network().octets());
    }
}

// ===== unit tests =====
