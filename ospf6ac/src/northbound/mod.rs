//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod configuration;
pub mod state;

use std::net::Ipv4Addr;

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ip::Ipv6NetworkExt;
use serde::{Deserialize, Serialize};

use crate::assignment::{self, ASSIGNED_PREFIX_LEN};
use crate::debug::InstanceInactiveReason;
use crate::error::Error;
use crate::instance::Instance;
use crate::northbound::state::ShowKind;
use crate::prefix::{AggregatedPrefix, PrefixSource};
use crate::tasks::messages::ProtocolOutputMsg;
use crate::tasks::messages::output::RouterIdUpdateMsg;

// Operator requests.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum NbMsg {
    // Allocate an aggregated prefix.
    AggregateAdd(Ipv6Network),
    // Deallocate an aggregated prefix.
    AggregateDel(Ipv6Network),
    // Configure a static Router ID, or go back to an autoconfigured one.
    RouterIdSet(Option<Ipv4Addr>),
    Enable(bool),
    Show(ShowKind),
}

// ===== global functions =====

pub(crate) fn process_nb_msg(
    instance: &mut Instance,
    msg: NbMsg,
) -> Result<(), Error> {
    match msg {
        NbMsg::AggregateAdd(prefix) => {
            // There must be room for at least one assignment.
            if !prefix.is_routable() || prefix.prefix() > ASSIGNED_PREFIX_LEN {
                return Err(Error::InvalidAggregate(prefix));
            }

            let prefix = prefix.apply_mask();
            if !instance.config.aggregates.insert(prefix) {
                return Ok(());
            }

            if let Some((mut instance, _)) = instance.as_up() {
                let router_id = instance.state.router_id;
                if !instance.state.aggregated.iter().any(|aggregate| {
                    aggregate.prefix == prefix && aggregate.adv_rtr == router_id
                }) {
                    instance.state.aggregated.push(AggregatedPrefix::new(
                        prefix,
                        PrefixSource::Configured,
                        router_id,
                    ));
                }
                instance.state.lsa_orig_pending = true;
                assignment::cycle_schedule(&mut instance);
            }
        }
        NbMsg::AggregateDel(prefix) => {
            let prefix = prefix.apply_mask();
            if !instance.config.aggregates.remove(&prefix) {
                return Ok(());
            }

            if let Some((mut instance, _)) = instance.as_up() {
                let router_id = instance.state.router_id;
                instance.state.aggregated.retain(|aggregate| {
                    aggregate.prefix != prefix || aggregate.adv_rtr != router_id
                });
                instance.state.lsa_orig_pending = true;
                assignment::cycle_schedule(&mut instance);
            }
        }
        NbMsg::RouterIdSet(router_id) => {
            if instance.config.router_id == router_id
                && !instance.router_id_conflict
            {
                return Ok(());
            }

            // Restart the instance using the new Router ID.
            instance.config.router_id = router_id;
            instance.router_id_conflict = false;
            instance.stop(InstanceInactiveReason::Resetting);

            // A Router ID that still needs to be generated is notified once
            // it's known.
            if let Some(router_id) = instance.get_router_id() {
                let msg = RouterIdUpdateMsg { router_id };
                instance.tx.output(ProtocolOutputMsg::RouterIdUpdate(msg));
            }
            instance.update();
        }
        NbMsg::Enable(enabled) => {
            instance.config.enabled = enabled;
            instance.update();
        }
        NbMsg::Show(kind) => {
            let output = state::show(instance, kind);
            instance.tx.output(ProtocolOutputMsg::Show(output));
        }
    }

    Ok(())
}
