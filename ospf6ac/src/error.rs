//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use tracing::{error, warn, warn_span};

use crate::packet::error::DecodeError;
use crate::packet::lsa::LsaKey;

// Autoconfiguration errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Inter-task communication
    InterfaceNotFound(String),
    // LSA input
    LsaDecodeError(Option<LsaKey>, DecodeError),
    MissingFingerprintTlv(LsaKey),
    // Prefix assignment
    PrefixSpaceExhausted(String, Ipv6Network),
    // Configuration
    InvalidAggregate(Ipv6Network),
}

// Persistent storage errors.
#[derive(Debug)]
pub enum IoError {
    HistoryReadError(String, std::io::Error),
    HistoryWriteError(String, std::io::Error),
    UlaReadError(std::io::Error),
    UlaWriteError(std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::InterfaceNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::LsaDecodeError(Some(lsa_key), error) => {
                warn_span!("lsa", adv_rtr = %lsa_key.adv_rtr, lsa_id = %lsa_key.lsa_id)
                    .in_scope(|| {
                        warn!(%error, "{}", self);
                    })
            }
            Error::LsaDecodeError(None, error) => {
                warn!(%error, "{}", self);
            }
            Error::MissingFingerprintTlv(lsa_key) => {
                warn_span!("lsa", adv_rtr = %lsa_key.adv_rtr, lsa_id = %lsa_key.lsa_id)
                    .in_scope(|| {
                        error!("{}", self);
                    })
            }
            Error::PrefixSpaceExhausted(name, aggregate) => {
                warn_span!("interface", %name).in_scope(|| {
                    warn!(%aggregate, "{}", self);
                })
            }
            Error::InvalidAggregate(prefix) => {
                warn!(%prefix, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            Error::LsaDecodeError(..) => {
                write!(f, "failed to decode autoconfiguration LSA")
            }
            Error::MissingFingerprintTlv(..) => {
                write!(
                    f,
                    "self-originated LSA lacks the hardware fingerprint TLV"
                )
            }
            Error::PrefixSpaceExhausted(..) => {
                write!(f, "no free prefix left in the aggregated prefix")
            }
            Error::InvalidAggregate(..) => {
                write!(f, "invalid aggregated prefix")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::LsaDecodeError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::HistoryReadError(name, error)
            | IoError::HistoryWriteError(name, error) => {
                warn_span!("interface", %name).in_scope(|| {
                    warn!(error = %with_source(error), "{}", self);
                })
            }
            IoError::UlaReadError(error) | IoError::UlaWriteError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::HistoryReadError(..) => {
                write!(f, "failed to read associated prefix history")
            }
            IoError::HistoryWriteError(..) => {
                write!(f, "failed to write associated prefix history")
            }
            IoError::UlaReadError(..) => {
                write!(f, "failed to read ULA prefix")
            }
            IoError::UlaWriteError(..) => {
                write!(f, "failed to write ULA prefix")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::HistoryReadError(_, error)
            | IoError::HistoryWriteError(_, error)
            | IoError::UlaReadError(error)
            | IoError::UlaWriteError(error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
