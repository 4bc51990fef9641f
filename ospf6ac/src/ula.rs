//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::assignment;
use crate::debug::Debug;
use crate::error::{Error, IoError};
use crate::instance::InstanceUpView;
use crate::interface::Interfaces;
use crate::prefix::{AggregatedPrefix, PrefixSource};
use crate::snapshot::Snapshot;
use crate::tasks;

// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

// Length of the generated ULA prefixes.
pub const ULA_PREFIX_LEN: u8 = 48;

// ===== global functions =====

// Schedules or cancels the generation and termination of the ULA prefix
// according to the current snapshot.
pub(crate) fn update(instance: &mut InstanceUpView<'_>, snapshot: &Snapshot) {
    let router_id = instance.state.router_id;

    // Generate a ULA prefix when no aggregate is available and we have the
    // highest Router ID.
    let generate = snapshot.aggregated.is_empty()
        && snapshot.reachable.iter().all(|rtr| *rtr <= router_id)
        && instance.state.ula.is_none();
    if generate {
        if instance.state.ula_generation_timer.is_none() {
            Debug::UlaGenerationStart.log();
            let task = tasks::ula_generation_timer(
                instance.config.timers.ula_generation,
                &instance.tx.protocol_input.ula_generation,
            );
            instance.state.ula_generation_timer = Some(task);
        }
    } else {
        generation_cancel(instance);
    }

    // Withdraw our ULA prefix when another aggregate becomes available.
    let Some(ula) = instance.state.ula else {
        return;
    };
    let terminate = snapshot.aggregated.iter().any(|aggregate| {
        aggregate.prefix != ula
            && (!is_generated_ula(&aggregate.prefix)
                || aggregate.adv_rtr > router_id)
    });
    if terminate {
        if instance.state.ula_termination_timer.is_none() {
            Debug::UlaTerminationStart(&ula).log();
            let task = tasks::ula_termination_timer(
                instance.config.timers.ula_termination,
                &instance.tx.protocol_input.ula_termination,
            );
            instance.state.ula_termination_timer = Some(task);
        }
    } else if instance.state.ula_termination_timer.take().is_some() {
        Debug::UlaTerminationCancel(&ula).log();
    }
}

// Cancels the pending ULA generation, if any.
pub(crate) fn generation_cancel(instance: &mut InstanceUpView<'_>) {
    if instance.state.ula_generation_timer.take().is_some() {
        Debug::UlaGenerationCancel.log();
    }
}

// Handles the expiry of the ULA generation timer.
pub(crate) fn process_generation_expiry(
    instance: &mut InstanceUpView<'_>,
    interfaces: &Interfaces,
) -> Result<(), Error> {
    instance.state.ula_generation_timer = None;
    if instance.state.ula.is_some() {
        return Ok(());
    }

    // Reuse the persisted ULA prefix, if any.
    let dir = instance.config.storage_dir.as_deref();
    let mut result = Ok(());
    let stored = match dir.map(load).transpose() {
        Ok(stored) => stored.flatten(),
        Err(error) => {
            result = Err(Error::from(error));
            None
        }
    };
    let prefix = match stored {
        Some(prefix) => prefix,
        None => {
            // Use the hardware address of the first backbone interface.
            let eui64 = interfaces
                .values()
                .filter(|iface| iface.is_backbone())
                .find_map(|iface| {
                    instance
                        .system
                        .interfaces
                        .get(&iface.name)
                        .and_then(|sys| sys.mac_address)
                })
                .map(|mac_addr| mac_addr.to_eui64())
                .unwrap_or_default();
            let prefix = generate(ntp_timestamp(Utc::now()), eui64);

            if let Some(dir) = dir
                && let Err(error) = store(dir, &prefix)
            {
                result = Err(Error::from(error));
            }
            prefix
        }
    };

    Debug::UlaCreate(&prefix).log();
    let router_id = instance.state.router_id;
    instance.state.ula = Some(prefix);
    instance.state.aggregated.push(AggregatedPrefix::new(
        prefix,
        PrefixSource::Generated,
        router_id,
    ));
    instance.state.lsa_orig_pending = true;
    assignment::cycle_schedule(instance);

    result
}

// Handles the expiry of the ULA termination timer. The persisted prefix is
// kept for later reuse.
pub(crate) fn process_termination_expiry(instance: &mut InstanceUpView<'_>) {
    instance.state.ula_termination_timer = None;
    let Some(ula) = instance.state.ula.take() else {
        return;
    };

    Debug::UlaRemove(&ula).log();
    instance
        .state
        .aggregated
        .retain(|aggregate| aggregate.prefix != ula);
    instance.state.lsa_orig_pending = true;
    assignment::cycle_schedule(instance);
}

// Derives a ULA prefix (RFC 4193, section 3.2.2): the least significant 40
// bits of the SHA-1 digest of the time of day and an EUI-64 identifier are
// used as the Global ID.
pub fn generate(ntp_timestamp: u64, eui64: [u8; 8]) -> Ipv6Network {
    let mut hasher = Sha1::new();
    hasher.update(ntp_timestamp.to_be_bytes());
    hasher.update(eui64);
    let digest = hasher.finalize();

    let mut octets = [0; 16];
    octets[0] = 0xfd;
    octets[1..6].copy_from_slice(&digest[15..20]);
    Ipv6Network::new(Ipv6Addr::from(octets), ULA_PREFIX_LEN).unwrap()
}

// Returns the 64-bit NTP timestamp of the given time.
pub fn ntp_timestamp(time: DateTime<Utc>) -> u64 {
    let secs = (time.timestamp() as u64).wrapping_add(NTP_UNIX_OFFSET);
    let frac = (u64::from(time.timestamp_subsec_nanos()) << 32) / 1_000_000_000;
    (secs << 32) | frac
}

// Returns whether the prefix has the shape of a generated ULA prefix.
//
// The Aggregated-Prefix TLV doesn't carry the source of the aggregate, so
// the shape is all a remote aggregate can be judged by.
pub fn is_generated_ula(prefix: &Ipv6Network) -> bool {
    prefix.prefix() == ULA_PREFIX_LEN && prefix.ip().octets()[0] == 0xfd
}

// Returns the location of the persisted ULA prefix.
pub fn path(dir: &Path) -> PathBuf {
    dir.join("ospf6ac-ula")
}

// Reads the persisted ULA prefix. A missing or unusable file yields `None`.
pub fn load(dir: &Path) -> Result<Option<Ipv6Network>, IoError> {
    let data = match std::fs::read_to_string(path(dir)) {
        Ok(data) => data,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(error) => return Err(IoError::UlaReadError(error)),
    };

    let line = data.lines().next().unwrap_or_default().trim();
    match line.parse::<Ipv6Network>() {
        Ok(prefix) if prefix.is_ula() => Ok(Some(prefix.apply_mask())),
        _ => {
            warn!(%line, "ignoring invalid ULA prefix");
            Ok(None)
        }
    }
}

// Persists the ULA prefix.
pub fn store(dir: &Path, prefix: &Ipv6Network) -> Result<(), IoError> {
    std::fs::write(path(dir), format!("{prefix}\n"))
        .map_err(IoError::UlaWriteError)
}

// ===== unit tests =====
