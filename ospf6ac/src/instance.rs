//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv6Network;
use ospf6ac_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use ospf6ac_utils::task::TimeoutTask;
use ospf6ac_utils::{UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::debug::{Debug, InstanceInactiveReason};
use crate::error::Error;
use crate::event_recorder::EventRecorder;
use crate::history::AssociatedPrefixHistory;
use crate::interface::{Interface, InterfaceSys, Interfaces};
use crate::lsdb::Lsdb;
use crate::northbound::NbMsg;
use crate::northbound::configuration::InstanceCfg;
use crate::packet::lsa::AcLsaBody;
use crate::prefix::{AggregatedPrefix, PrefixSource};
use crate::router_id::RouterIdentity;
use crate::tasks::messages::input::{
    AssignCycleMsg, HistoryWriteMsg, OspfMsg, PrefixDeprecationMsg,
    PrefixPendingMsg, RouterIdReconfigMsg, UlaGenerationMsg, UlaTerminationMsg,
};
use crate::tasks::messages::output::RouterIdUpdateMsg;
use crate::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use crate::{assignment, events, lifecycle, lsdb, northbound, router_id, southbound};

pub struct Instance {
    // Instance system data.
    pub system: InstanceSys,
    // Instance configuration data.
    pub config: InstanceCfg,
    // Router identity. Survives instance restarts.
    pub identity: RouterIdentity,
    // Instance state data.
    pub state: Option<InstanceState>,
    // Autoconfiguration interfaces.
    pub interfaces: Interfaces,
    // Instance Tx channels.
    pub tx: InstanceChannelsTx,
    // Set when a Router ID collision is detected while the Router ID is
    // statically configured.
    pub router_id_conflict: bool,
}

#[derive(Debug, Default)]
pub struct InstanceSys {
    pub interfaces: BTreeMap<String, InterfaceSys>,
}

#[derive(Debug)]
pub struct InstanceState {
    // Instance Router ID.
    pub router_id: Ipv4Addr,
    // Backbone AC-LSAs.
    pub lsdb: Lsdb,
    // Working list of aggregated prefixes.
    pub aggregated: Vec<AggregatedPrefix>,
    // Locally generated ULA prefix, if in use.
    pub ula: Option<Ipv6Network>,
    // Timers.
    pub assign_timer: Option<TimeoutTask>,
    pub ula_generation_timer: Option<TimeoutTask>,
    pub ula_termination_timer: Option<TimeoutTask>,
    pub router_id_reconfig_timer: Option<TimeoutTask>,
    // AC-LSA origination.
    pub lsa_orig_pending: bool,
    pub last_originated: Option<AcLsaBody>,
}

#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    pub ibus: IbusChannelsTx,
    pub protocol_input: ProtocolInputChannelsTx,
    pub protocol_output: UnboundedSender<ProtocolOutputMsg>,
}

#[derive(Debug)]
pub struct InstanceChannelsRx {
    pub nb: UnboundedReceiver<NbMsg>,
    pub ibus: IbusReceiver,
    pub ospf: UnboundedReceiver<OspfMsg>,
    pub protocol_input: ProtocolInputChannelsRx,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Assignment cycle.
    pub assign_cycle: UnboundedSender<AssignCycleMsg>,
    // Assignment stabilization timeout.
    pub prefix_pending: UnboundedSender<PrefixPendingMsg>,
    // Assignment deprecation timeout.
    pub prefix_deprecation: UnboundedSender<PrefixDeprecationMsg>,
    // History write timeout.
    pub history_write: UnboundedSender<HistoryWriteMsg>,
    // ULA generation timeout.
    pub ula_generation: UnboundedSender<UlaGenerationMsg>,
    // ULA termination timeout.
    pub ula_termination: UnboundedSender<UlaTerminationMsg>,
    // Router ID reconfiguration timeout.
    pub router_id_reconfig: UnboundedSender<RouterIdReconfigMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Assignment cycle.
    pub assign_cycle: UnboundedReceiver<AssignCycleMsg>,
    // Assignment stabilization timeout.
    pub prefix_pending: UnboundedReceiver<PrefixPendingMsg>,
    // Assignment deprecation timeout.
    pub prefix_deprecation: UnboundedReceiver<PrefixDeprecationMsg>,
    // History write timeout.
    pub history_write: UnboundedReceiver<HistoryWriteMsg>,
    // ULA generation timeout.
    pub ula_generation: UnboundedReceiver<UlaGenerationMsg>,
    // ULA termination timeout.
    pub ula_termination: UnboundedReceiver<UlaTerminationMsg>,
    // Router ID reconfiguration timeout.
    pub router_id_reconfig: UnboundedReceiver<RouterIdReconfigMsg>,
}

// Instance input message.
#[derive(Debug, Deserialize, Serialize)]
pub enum InstanceMsg {
    Northbound(NbMsg),
    Ibus(IbusMsg),
    Ospf(OspfMsg),
    Protocol(ProtocolInputMsg),
}

pub struct InstanceUpView<'a> {
    pub system: &'a InstanceSys,
    pub config: &'a InstanceCfg,
    pub identity: &'a RouterIdentity,
    pub state: &'a mut InstanceState,
    pub tx: &'a InstanceChannelsTx,
}

// ===== impl Instance =====

impl Instance {
    pub fn new(config: InstanceCfg, tx: InstanceChannelsTx) -> Instance {
        Instance {
            system: Default::default(),
            config,
            identity: Default::default(),
            state: None,
            interfaces: Default::default(),
            tx,
            router_id_conflict: false,
        }
    }

    // Checks if the instance needs to be started or stopped in response to a
    // northbound or southbound event.
    pub(crate) fn update(&mut self) {
        match self.is_ready() {
            Ok(()) if !self.is_active() => {
                self.start();
            }
            Ok(()) => {
                self.interfaces_sync();
            }
            Err(reason) if self.is_active() => {
                self.stop(reason);
            }
            _ => (),
        }
    }

    fn start(&mut self) {
        // The fingerprint follows the current set of hardware addresses, but
        // the random generator is seeded only once.
        self.identity.fingerprint =
            router_id::fingerprint(self.system.interfaces.values());

        let router_id = match self.get_router_id() {
            Some(router_id) => router_id,
            None => self.router_id_generate(),
        };
        Debug::InstanceStart(router_id).log();

        // Store instance initial state.
        let mut state = InstanceState::new(router_id);
        state.aggregated = self
            .config
            .aggregates
            .iter()
            .map(|prefix| {
                AggregatedPrefix::new(
                    *prefix,
                    PrefixSource::Configured,
                    router_id,
                )
            })
            .collect();
        self.state = Some(state);

        // Create interfaces.
        self.interfaces_sync();

        // Originate the initial AC-LSA and run the first assignment cycle.
        if let Some((mut instance, _)) = self.as_up() {
            instance.state.lsa_orig_pending = true;
            assignment::cycle_schedule(&mut instance);
        }
    }

    pub(crate) fn stop(&mut self, reason: InstanceInactiveReason) {
        if !self.is_active() {
            return;
        }

        Debug::InstanceStop(reason).log();

        // Drop all assignments, uninstalling their addresses.
        if let Some((mut instance, interfaces)) = self.as_up() {
            for iface in interfaces.values_mut() {
                lifecycle::flush(iface, &mut instance);
            }
            interfaces.clear();
        }

        // Clear instance state (timers included).
        self.state = None;
    }

    // Picks a new Router ID after a collision.
    pub(crate) fn router_id_reset(&mut self) {
        // A statically configured Router ID can't be changed. Stay down
        // until the operator intervenes.
        if self.config.router_id.is_some() {
            self.router_id_conflict = true;
            self.stop(InstanceInactiveReason::RouterIdConflict);
            return;
        }

        self.stop(InstanceInactiveReason::Resetting);
        self.router_id_generate();
        self.update();
    }

    fn router_id_generate(&mut self) -> Ipv4Addr {
        let router_id = self.identity.generate_id();
        Debug::RouterIdGenerate(router_id, self.identity.fingerprint).log();
        self.identity.router_id = Some(router_id);

        // Notify the OSPFv3 collaborator.
        let msg = RouterIdUpdateMsg { router_id };
        self.tx.output(ProtocolOutputMsg::RouterIdUpdate(msg));

        router_id
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    // Returns whether the instance is ready for autoconfiguration.
    fn is_ready(&self) -> Result<(), InstanceInactiveReason> {
        if !self.config.enabled {
            return Err(InstanceInactiveReason::AdminDown);
        }

        if self.router_id_conflict {
            return Err(InstanceInactiveReason::RouterIdConflict);
        }

        if self.eligible_interfaces().is_empty() {
            return Err(InstanceInactiveReason::NoInterfaces);
        }

        Ok(())
    }

    pub fn get_router_id(&self) -> Option<Ipv4Addr> {
        self.config.router_id.or(self.identity.router_id)
    }

    // Returns the interfaces that should take part in the autoconfiguration,
    // along with their ifindex and area.
    //
    // Without an explicit interface list, every operative non-loopback
    // interface is attached to the backbone.
    fn eligible_interfaces(&self) -> BTreeMap<String, (u32, Ipv4Addr)> {
        if self.config.interfaces.is_empty() {
            self.system
                .interfaces
                .iter()
                .filter(|(_, sys)| sys.is_eligible())
                .map(|(name, sys)| {
                    (name.clone(), (sys.ifindex, Ipv4Addr::UNSPECIFIED))
                })
                .collect()
        } else {
            self.config
                .interfaces
                .iter()
                .filter_map(|(name, cfg)| {
                    let sys = self.system.interfaces.get(name)?;
                    sys.is_eligible()
                        .then(|| (name.clone(), (sys.ifindex, cfg.area_id)))
                })
                .collect()
        }
    }

    // Creates, updates and removes interfaces according to the current
    // system and configuration data.
    pub(crate) fn interfaces_sync(&mut self) {
        let eligible = self.eligible_interfaces();
        let Some((mut instance, interfaces)) = self.as_up() else {
            return;
        };
        let mut changed = false;

        // Remove interfaces that are gone or were moved to another area.
        let stale = interfaces
            .values()
            .filter(|iface| {
                eligible
                    .get(&iface.name)
                    .is_none_or(|(_, area_id)| *area_id != iface.area_id)
            })
            .map(|iface| iface.name.clone())
            .collect::<Vec<_>>();
        for name in stale {
            if let Some(mut iface) = interfaces.remove(&name) {
                lifecycle::flush(&mut iface, &mut instance);
                changed = true;
            }
        }

        // Create new interfaces, seeding them from their history.
        for (name, (ifindex, area_id)) in eligible {
            if let Some(iface) = interfaces.get_mut(&name) {
                if iface.ifindex != ifindex {
                    iface.ifindex = ifindex;

                    // Our claims are identified by the interface ID.
                    let router_id = instance.state.router_id;
                    for record in iface
                        .assignments
                        .iter_mut()
                        .filter(|record| record.is_own(router_id))
                    {
                        record.assigning_iface_id = ifindex;
                    }
                    changed = true;
                }
                continue;
            }

            let history = history_load(instance.config, &name);
            let iface = Interface::new(name.clone(), ifindex, area_id, history);
            interfaces.insert(name, iface);
            changed = true;
        }

        if changed {
            instance.state.lsa_orig_pending = true;
            assignment::cycle_schedule(&mut instance);
        }
    }

    pub(crate) fn as_up(
        &mut self,
    ) -> Option<(InstanceUpView<'_>, &mut Interfaces)> {
        if let Some(state) = &mut self.state {
            let instance = InstanceUpView {
                system: &self.system,
                config: &self.config,
                identity: &self.identity,
                state,
                tx: &self.tx,
            };
            Some((instance, &mut self.interfaces))
        } else {
            None
        }
    }

    // Processes an instance input message.
    pub fn process_msg(&mut self, msg: InstanceMsg) {
        let result = match msg {
            InstanceMsg::Northbound(msg) => {
                northbound::process_nb_msg(self, msg)
            }
            InstanceMsg::Ibus(msg) => process_ibus_msg(self, msg),
            InstanceMsg::Ospf(msg) => process_ospf_msg(self, msg),
            InstanceMsg::Protocol(msg) => process_protocol_msg(self, msg),
        };
        if let Err(error) = result {
            error.log();
        }

        // Send the AC-LSA origination request, if any.
        if let Some((mut instance, interfaces)) = self.as_up()
            && instance.state.lsa_orig_pending
        {
            lsdb::originate(&mut instance, interfaces);
        }
    }

    // Runs the instance event loop until the northbound channel is closed.
    pub async fn run(
        mut self,
        mut channels_rx: InstanceChannelsRx,
        mut event_recorder: Option<EventRecorder>,
    ) {
        self.update();

        loop {
            let msg = tokio::select! {
                msg = channels_rx.nb.recv() => match msg {
                    Some(msg) => InstanceMsg::Northbound(msg),
                    None => break,
                },
                Some(msg) = channels_rx.ibus.recv() => {
                    InstanceMsg::Ibus(msg)
                }
                Some(msg) = channels_rx.ospf.recv() => {
                    InstanceMsg::Ospf(msg)
                }
                Some(msg) = channels_rx.protocol_input.recv() => {
                    InstanceMsg::Protocol(msg)
                }
            };

            // Record event message.
            if let Some(event_recorder) = &mut event_recorder {
                event_recorder.record(&msg);
            }

            self.process_msg(msg);
        }

        // Ensure instance is disabled before exiting.
        self.stop(InstanceInactiveReason::AdminDown);
    }

    // Creates channels for all protocol input events.
    pub fn protocol_input_channels()
    -> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
        let (assign_cyclep, assign_cyclec) = mpsc::unbounded_channel();
        let (prefix_pendingp, prefix_pendingc) = mpsc::unbounded_channel();
        let (prefix_deprecationp, prefix_deprecationc) =
            mpsc::unbounded_channel();
        let (history_writep, history_writec) = mpsc::unbounded_channel();
        let (ula_generationp, ula_generationc) = mpsc::unbounded_channel();
        let (ula_terminationp, ula_terminationc) = mpsc::unbounded_channel();
        let (router_id_reconfigp, router_id_reconfigc) =
            mpsc::unbounded_channel();

        let tx = ProtocolInputChannelsTx {
            assign_cycle: assign_cyclep,
            prefix_pending: prefix_pendingp,
            prefix_deprecation: prefix_deprecationp,
            history_write: history_writep,
            ula_generation: ula_generationp,
            ula_termination: ula_terminationp,
            router_id_reconfig: router_id_reconfigp,
        };
        let rx = ProtocolInputChannelsRx {
            assign_cycle: assign_cyclec,
            prefix_pending: prefix_pendingc,
            prefix_deprecation: prefix_deprecationc,
            history_write: history_writec,
            ula_generation: ula_generationc,
            ula_termination: ula_terminationc,
            router_id_reconfig: router_id_reconfigc,
        };

        (tx, rx)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

// ===== impl InstanceState =====

impl InstanceState {
    fn new(router_id: Ipv4Addr) -> InstanceState {
        InstanceState {
            router_id,
            lsdb: Default::default(),
            aggregated: Default::default(),
            ula: None,
            assign_timer: None,
            ula_generation_timer: None,
            ula_termination_timer: None,
            router_id_reconfig_timer: None,
            lsa_orig_pending: false,
            last_originated: None,
        }
    }
}

// ===== impl InstanceChannelsTx =====

impl InstanceChannelsTx {
    // Sends a message to the protocol output channel.
    pub(crate) fn output(&self, msg: ProtocolOutputMsg) {
        if self.protocol_output.send(msg).is_err() {
            warn!("protocol output channel closed");
        }
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            biased;
            msg = self.assign_cycle.recv() => {
                msg.map(ProtocolInputMsg::AssignCycle)
            }
            msg = self.prefix_pending.recv() => {
                msg.map(ProtocolInputMsg::PrefixPending)
            }
            msg = self.prefix_deprecation.recv() => {
                msg.map(ProtocolInputMsg::PrefixDeprecation)
            }
            msg = self.history_write.recv() => {
                msg.map(ProtocolInputMsg::HistoryWrite)
            }
            msg = self.ula_generation.recv() => {
                msg.map(ProtocolInputMsg::UlaGeneration)
            }
            msg = self.ula_termination.recv() => {
                msg.map(ProtocolInputMsg::UlaTermination)
            }
            msg = self.router_id_reconfig.recv() => {
                msg.map(ProtocolInputMsg::RouterIdReconfig)
            }
        }
    }
}

// ===== helper functions =====

// Loads the history of an interface, falling back to an empty one when
// persistence is disabled or the file can't be read.
fn history_load(config: &InstanceCfg, ifname: &str) -> AssociatedPrefixHistory {
    let Some(dir) = &config.storage_dir else {
        return Default::default();
    };

    match AssociatedPrefixHistory::load(dir, ifname) {
        Ok(history) => {
            Debug::HistoryLoad(ifname, history.len()).log();
            history
        }
        Err(error) => {
            Error::from(error).log();
            Default::default()
        }
    }
}

fn process_ibus_msg(instance: &mut Instance, msg: IbusMsg) -> Result<(), Error> {
    match msg {
        // Interface update notification.
        IbusMsg::InterfaceUpd(msg) => {
            southbound::rx::process_iface_update(instance, msg);
        }
        // Interface delete notification.
        IbusMsg::InterfaceDel(ifname) => {
            southbound::rx::process_iface_delete(instance, ifname);
        }
        // Interface address addition notification.
        IbusMsg::InterfaceAddressAdd(msg) => {
            southbound::rx::process_addr_add(instance, msg);
        }
        // Interface address delete notification.
        IbusMsg::InterfaceAddressDel(msg) => {
            southbound::rx::process_addr_del(instance, msg);
        }
        // Requests sent by ourselves.
        _ => {}
    }

    Ok(())
}

fn process_ospf_msg(instance: &mut Instance, msg: OspfMsg) -> Result<(), Error> {
    // Ignore event if the instance isn't active.
    if !instance.is_active() {
        return Ok(());
    }

    match msg {
        OspfMsg::LsaUpdate { raw, reachable } => {
            events::process_lsa_update(instance, raw, reachable)?;
        }
        OspfMsg::LsaDelete { adv_rtr, lsa_id } => {
            events::process_lsa_delete(instance, adv_rtr, lsa_id);
        }
        OspfMsg::RouterReachability {
            router_id,
            reachable,
        } => {
            events::process_router_reachability(instance, router_id, reachable);
        }
        OspfMsg::NbrUpdate {
            ifname,
            router_id,
            iface_id,
            src,
            state,
        } => {
            events::process_nbr_update(
                instance, &ifname, router_id, iface_id, src, state,
            )?;
        }
        OspfMsg::NbrDelete { ifname, router_id } => {
            events::process_nbr_delete(instance, &ifname, router_id)?;
        }
        OspfMsg::HelloRx {
            ifname,
            router_id,
            src,
            dst,
        } => {
            events::process_hello_rx(instance, &ifname, router_id, src, dst)?;
        }
    }

    Ok(())
}

fn process_protocol_msg(
    instance: &mut Instance,
    msg: ProtocolInputMsg,
) -> Result<(), Error> {
    // The Router ID reconfiguration restarts the whole instance.
    if let ProtocolInputMsg::RouterIdReconfig(_) = msg {
        return events::process_router_id_reconfig(instance);
    }

    // Ignore event if the instance isn't active.
    let Some((mut instance, interfaces)) = instance.as_up() else {
        return Ok(());
    };

    match msg {
        // Assignment cycle.
        ProtocolInputMsg::AssignCycle(_) => {
            events::process_assign_cycle(&mut instance, interfaces);
        }
        // Assignment stabilization timeout.
        ProtocolInputMsg::PrefixPending(msg) => {
            events::process_prefix_pending(
                &mut instance,
                interfaces,
                &msg.ifname,
                msg.key,
            )?;
        }
        // Assignment deprecation timeout.
        ProtocolInputMsg::PrefixDeprecation(msg) => {
            events::process_prefix_deprecation(
                &mut instance,
                interfaces,
                &msg.ifname,
                msg.key,
            )?;
        }
        // History write timeout.
        ProtocolInputMsg::HistoryWrite(msg) => {
            events::process_history_write(
                &mut instance,
                interfaces,
                &msg.ifname,
            )?;
        }
        // ULA generation timeout.
        ProtocolInputMsg::UlaGeneration(_) => {
            events::process_ula_generation(&mut instance, interfaces)?;
        }
        // ULA termination timeout.
        ProtocolInputMsg::UlaTermination(_) => {
            events::process_ula_termination(&mut instance);
        }
        ProtocolInputMsg::RouterIdReconfig(_) => unreachable!(),
    }

    Ok(())
}
