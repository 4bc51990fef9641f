//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use ipnetwork::Ipv6Network;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use ospf6ac_utils::bytes::{BytesExt, BytesMutExt};
use serde::{Deserialize, Serialize};

use crate::packet::error::{DecodeError, DecodeResult};

pub const TLV_HDR_SIZE: u16 = 4;

// Autoconfiguration LSA TLV types.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum AcTlvType {
    RouterHwFingerprint = 1,
    AggregatedPrefix = 2,
    AssignedPrefix = 3,
}

//
// Router-Hardware-Fingerprint TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          Fingerprint                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouterHwFingerprintTlv {
    pub fingerprint: u32,
}

//
// Aggregated-Prefix TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Prefix Length |                                               |
// +-+-+-+-+-+-+-+-+                                               +
// |                                                               |
// +                                                               +
// |                          IPv6 Prefix                          |
// +                                                               +
// |                                                               |
// +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |               |
// +-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AggregatedPrefixTlv {
    pub prefix: Ipv6Network,
}

//
// Assigned-Prefix TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Prefix Length |                                               |
// +-+-+-+-+-+-+-+-+                                               +
// |                                                               |
// +                                                               +
// |                          IPv6 Prefix                          |
// +                                                               +
// |                                                               |
// +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |               |               Interface ID ...                |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |      ...      |
// +-+-+-+-+-+-+-+-+
//
// The Interface ID identifies the advertising router's interface the prefix
// was assigned to.
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AssignedPrefixTlv {
    pub prefix: Ipv6Network,
    pub iface_id: u32,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct UnknownTlv {
    pub tlv_type: u16,
    pub length: u16,
    pub value: Bytes,
}

// ===== impl RouterHwFingerprintTlv =====

impl RouterHwFingerprintTlv {
    pub const LENGTH: u16 = 4;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        if tlv_len != Self::LENGTH {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }
        let fingerprint = buf.get_u32();

        Ok(RouterHwFingerprintTlv { fingerprint })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, AcTlvType::RouterHwFingerprint);
        buf.put_u32(self.fingerprint);
        tlv_encode_end(buf, start_pos);
    }
}

// ===== impl AggregatedPrefixTlv =====

impl AggregatedPrefixTlv {
    pub const LENGTH: u16 = 17;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        if tlv_len != Self::LENGTH {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }
        let prefix = buf
            .get_ipv6_prefix()
            .map_err(DecodeError::InvalidIpPrefix)?;

        Ok(AggregatedPrefixTlv { prefix })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, AcTlvType::AggregatedPrefix);
        buf.put_ipv6_prefix(&self.prefix);
        tlv_encode_end(buf, start_pos);
    }
}

// ===== impl AssignedPrefixTlv =====

impl AssignedPrefixTlv {
    pub const LENGTH: u16 = 21;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        if tlv_len != Self::LENGTH {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }
        let prefix = buf
            .get_ipv6_prefix()
            .map_err(DecodeError::InvalidIpPrefix)?;
        let iface_id = buf.get_u32();

        Ok(AssignedPrefixTlv { prefix, iface_id })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, AcTlvType::AssignedPrefix);
        buf.put_ipv6_prefix(&self.prefix);
        buf.put_u32(self.iface_id);
        tlv_encode_end(buf, start_pos);
    }
}

// ===== impl UnknownTlv =====

impl UnknownTlv {
    // Unknown TLVs are written back as received.
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tlv_type);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }
}

// ===== global functions =====

// AC-LSA TLVs aren't padded, the length field covers the value only.
pub(crate) fn tlv_encode_start(buf: &mut BytesMut, tlv_type: AcTlvType) -> usize {
    let start_pos = buf.len();
    buf.put_u16(tlv_type.to_u16().unwrap_or_default());
    // The TLV length will be rewritten later.
    buf.put_u16(0);
    start_pos
}

pub(crate) fn tlv_encode_end(buf: &mut BytesMut, start_pos: usize) {
    let tlv_len = (buf.len() - start_pos) as u16 - TLV_HDR_SIZE;

    // Rewrite TLV length.
    buf[start_pos + 2..start_pos + 4].copy_from_slice(&tlv_len.to_be_bytes());
}
