//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use num_traits::FromPrimitive;
use ospf6ac_utils::bytes::{BytesExt, BytesMutExt, TLS_BUF};
use serde::{Deserialize, Serialize};

use crate::packet::error::{DecodeError, DecodeResult};
use crate::packet::tlv::{
    AcTlvType, AggregatedPrefixTlv, AssignedPrefixTlv, RouterHwFingerprintTlv,
    TLV_HDR_SIZE, UnknownTlv,
};

// OSPFv3 LSA type.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaType(pub u16);

// LSA key. Only one autoconfiguration LSA is expected per router, but the
// Link State ID is kept in the key so that stray instances don't shadow the
// well-known one.
#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaKey {
    pub adv_rtr: Ipv4Addr,
    pub lsa_id: Ipv4Addr,
}

//
// OSPFv3 LSA header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           LS Age              |           LS Type             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Link State ID                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Advertising Router                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    LS Sequence Number                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |        LS Checksum            |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaHdr {
    pub age: u16,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
    pub cksum: u16,
    pub length: u16,
}

//
// Autoconfiguration LSA body.
//
// Sequence of TLVs up to the LSA length. At most one Router-Hardware-
// Fingerprint TLV is kept; unknown TLVs are skipped and preserved as opaque
// data.
//
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AcLsaBody {
    pub fingerprint: Option<RouterHwFingerprintTlv>,
    pub aggregated: Vec<AggregatedPrefixTlv>,
    pub assigned: Vec<AssignedPrefixTlv>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<UnknownTlv>,
}

// Autoconfiguration LSA.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Lsa {
    // LSA raw bytes.
    #[serde(skip)]
    pub raw: Bytes,
    // LSA header.
    pub hdr: LsaHdr,
    // LSA body.
    pub body: AcLsaBody,
}

// ===== impl LsaType =====

impl LsaType {
    pub const U_BIT_MASK: u16 = 0x8000;
    pub const SCOPE_MASK: u16 = 0x6000;
    pub const FUNCTION_CODE_MASK: u16 = 0x1fff;

    pub const SCOPE_AREA: u16 = 0x2000;
    pub const FUNCTION_CODE_AC: u16 = 16;

    // Autoconfiguration LSA: area flooding scope, U-bit set so that routers
    // not supporting it still flood it.
    pub const AC: LsaType = LsaType(
        Self::U_BIT_MASK | Self::SCOPE_AREA | Self::FUNCTION_CODE_AC,
    );

    pub fn function_code(&self) -> u16 {
        self.0 & Self::FUNCTION_CODE_MASK
    }

    pub fn is_ac(&self) -> bool {
        self.function_code() == Self::FUNCTION_CODE_AC
            && self.0 & Self::SCOPE_MASK == Self::SCOPE_AREA
    }
}

impl std::fmt::Display for LsaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// ===== impl LsaKey =====

impl std::fmt::Display for LsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.adv_rtr, self.lsa_id)
    }
}

// ===== impl LsaHdr =====

impl LsaHdr {
    pub const LENGTH: u16 = 20;

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.remaining() as u16));
        }

        let age = buf.get_u16();
        let lsa_type = LsaType(buf.get_u16());
        let lsa_id = buf.get_ipv4();
        let adv_rtr = buf.get_ipv4();
        let seq_no = buf.get_u32();
        let cksum = buf.get_u16();
        let length = buf.get_u16();

        Ok(LsaHdr {
            age,
            lsa_type,
            lsa_id,
            adv_rtr,
            seq_no,
            cksum,
            length,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.age);
        buf.put_u16(self.lsa_type.0);
        buf.put_ipv4(&self.lsa_id);
        buf.put_ipv4(&self.adv_rtr);
        buf.put_u32(self.seq_no);
        buf.put_u16(self.cksum);
        buf.put_u16(self.length);
    }

    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.adv_rtr, self.lsa_id)
    }
}

// ===== impl AcLsaBody =====

impl AcLsaBody {
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let mut body = AcLsaBody::default();

        while buf.has_remaining() {
            // A partial TLV header can't be skipped safely.
            if buf.remaining() < TLV_HDR_SIZE as usize {
                return Err(DecodeError::TruncatedTlvHeader(
                    buf.remaining() as u16,
                ));
            }

            // Parse TLV type.
            let tlv_type = buf.get_u16();

            // Parse and validate TLV length.
            let tlv_len = buf.get_u16();
            if tlv_len as usize > buf.remaining() {
                return Err(DecodeError::InvalidTlvLength(tlv_len));
            }

            // Parse TLV value.
            let mut buf_tlv = buf.copy_to_bytes(tlv_len as usize);
            match AcTlvType::from_u16(tlv_type) {
                Some(AcTlvType::RouterHwFingerprint) => {
                    let tlv =
                        RouterHwFingerprintTlv::decode(tlv_len, &mut buf_tlv)?;
                    body.fingerprint.get_or_insert(tlv);
                }
                Some(AcTlvType::AggregatedPrefix) => {
                    let tlv =
                        AggregatedPrefixTlv::decode(tlv_len, &mut buf_tlv)?;
                    body.aggregated.push(tlv);
                }
                Some(AcTlvType::AssignedPrefix) => {
                    let tlv = AssignedPrefixTlv::decode(tlv_len, &mut buf_tlv)?;
                    body.assigned.push(tlv);
                }
                None => {
                    body.unknown
                        .push(UnknownTlv::new(tlv_type, tlv_len, buf_tlv));
                }
            }
        }

        Ok(body)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        if let Some(fingerprint) = &self.fingerprint {
            fingerprint.encode(buf);
        }
        for tlv in &self.aggregated {
            tlv.encode(buf);
        }
        for tlv in &self.assigned {
            tlv.encode(buf);
        }
        for tlv in &self.unknown {
            tlv.encode(buf);
        }
    }
}

// ===== impl Lsa =====

impl Lsa {
    pub fn new(
        age: u16,
        lsa_id: Ipv4Addr,
        adv_rtr: Ipv4Addr,
        seq_no: u32,
        body: AcLsaBody,
    ) -> Self {
        // Build LSA header (the length and checksum are computed later).
        let hdr = LsaHdr {
            age,
            lsa_type: LsaType::AC,
            lsa_id,
            adv_rtr,
            seq_no,
            cksum: 0,
            length: 0,
        };

        // Build full LSA and encode it.
        let mut lsa = Lsa {
            raw: Default::default(),
            hdr,
            body,
        };
        lsa.encode();
        lsa
    }

    // Decodes LSA from a bytes buffer.
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        // Decode LSA header.
        let buf_orig = buf.clone();
        let hdr = LsaHdr::decode(buf)?;
        if !hdr.lsa_type.is_ac() {
            return Err(DecodeError::UnknownLsaType(hdr.lsa_type.0));
        }
        let lsa_len = hdr.length;
        if lsa_len < LsaHdr::LENGTH {
            return Err(DecodeError::InvalidLsaLength(lsa_len));
        }
        let lsa_body_len = lsa_len - LsaHdr::LENGTH;

        // Decode LSA body, stopping exactly at the declared LSA length.
        if buf.remaining() < lsa_body_len as usize {
            return Err(DecodeError::InvalidLsaLength(lsa_len));
        }
        let mut buf_lsa = buf.copy_to_bytes(lsa_body_len as usize);
        let body = AcLsaBody::decode(&mut buf_lsa)?;

        Ok(Lsa {
            raw: buf_orig.slice(0..lsa_len as usize),
            hdr,
            body,
        })
    }

    // Encodes LSA into a bytes buffer.
    pub(crate) fn encode(&mut self) {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            self.hdr.encode(&mut buf);
            self.body.encode(&mut buf);

            // Rewrite LSA length.
            let lsa_len = buf.len() as u16;
            buf[18..20].copy_from_slice(&lsa_len.to_be_bytes());
            self.hdr.length = lsa_len;

            // Compute LSA checksum.
            let cksum = Self::checksum(&buf[2..(lsa_len as usize)]);
            buf[16..18].copy_from_slice(&cksum);
            self.hdr.cksum = u16::from_be_bytes(cksum);

            // Store LSA raw data.
            self.raw = buf.clone().freeze();
        });
    }

    // Returns true if the LSA checksum is valid (the LS Age field isn't
    // covered).
    pub fn is_checksum_valid(&self) -> bool {
        fletcher::calc_fletcher16(&self.raw[2..(self.hdr.length as usize)])
            == 0
    }

    // Fletcher checksum with the check bytes placed at offset 16 of the
    // LSA (RFC 905, Annex B).
    fn checksum(data: &[u8]) -> [u8; 2] {
        let checksum = fletcher::calc_fletcher16(data);
        let mut checkbyte0 = (checksum & 0x00FF) as i32;
        let mut checkbyte1 = ((checksum >> 8) & 0x00FF) as i32;

        // Adjust checksum value using scaling factor.
        let sop = data.len() as u16 - 15;
        let mut x = (sop as i32 * checkbyte0 - checkbyte1) % 255;
        if x <= 0 {
            x += 255;
        }
        checkbyte1 = 510 - checkbyte0 - x;
        if checkbyte1 > 255 {
            checkbyte1 -= 255;
        }
        checkbyte0 = x;
        [checkbyte0 as u8, checkbyte1 as u8]
    }
}
