//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// AC-LSA decode errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    InvalidLength(u16),
    InvalidLsaLength(u16),
    UnknownLsaType(u16),
    TruncatedTlvHeader(u16),
    InvalidTlvLength(u16),
    InvalidIpPrefix(u8),
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(len) => {
                write!(f, "invalid buffer length: {len}")
            }
            DecodeError::InvalidLsaLength(len) => {
                write!(f, "invalid LSA length: {len}")
            }
            DecodeError::UnknownLsaType(lsa_type) => {
                write!(f, "not an autoconfiguration LSA: {lsa_type:#06x}")
            }
            DecodeError::TruncatedTlvHeader(remaining) => {
                write!(f, "truncated TLV header: {remaining} trailing bytes")
            }
            DecodeError::InvalidTlvLength(tlv_len) => {
                write!(f, "invalid TLV length: {tlv_len}")
            }
            DecodeError::InvalidIpPrefix(plen) => {
                write!(f, "invalid IPv6 prefix length: {plen}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
