//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use bytes::Bytes;
use const_addrs::{ip4, ip6, net6};
use ipnetwork::{IpNetwork, Ipv6Network};
use maplit::btreeset;
use ospf6ac::instance::{
    Instance, InstanceChannelsTx, InstanceMsg, ProtocolInputChannelsRx,
};
use ospf6ac::neighbor::nsm;
use ospf6ac::northbound::NbMsg;
use ospf6ac::northbound::configuration::InstanceCfg;
use ospf6ac::northbound::state::{ShowKind, ShowOutput};
use ospf6ac::packet::lsa::{AcLsaBody, Lsa};
use ospf6ac::packet::tlv::{
    AggregatedPrefixTlv, AssignedPrefixTlv, RouterHwFingerprintTlv,
};
use ospf6ac::prefix::{AssignmentKey, AssignmentState, PrefixSource};
use ospf6ac::tasks::messages::input::{
    AssignCycleMsg, HistoryWriteMsg, OspfMsg, PrefixDeprecationMsg,
    PrefixPendingMsg, RouterIdReconfigMsg, UlaGenerationMsg, UlaTerminationMsg,
};
use ospf6ac::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use ospf6ac::{history, ula};
use ospf6ac_utils::ibus::{IbusChannelsTx, IbusMsg};
use ospf6ac_utils::mac_addr::MacAddr;
use ospf6ac_utils::southbound::{
    AddressMsg, InterfaceFlags, InterfaceUpdateMsg,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

//
// Test router.
//

struct Router {
    instance: Instance,
    ibus_rx: UnboundedReceiver<IbusMsg>,
    output_rx: UnboundedReceiver<ProtocolOutputMsg>,
    _protocol_input_rx: ProtocolInputChannelsRx,
    seq_no: u32,
}

impl Router {
    fn new(config: InstanceCfg) -> Router {
        let (ibus_tx, ibus_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (protocol_input_tx, protocol_input_rx) =
            Instance::protocol_input_channels();
        let tx = InstanceChannelsTx {
            ibus: IbusChannelsTx::new(ibus_tx),
            protocol_input: protocol_input_tx,
            protocol_output: output_tx,
        };

        Router {
            instance: Instance::new(config, tx),
            ibus_rx,
            output_rx,
            _protocol_input_rx: protocol_input_rx,
            seq_no: 0x80000000,
        }
    }

    // Router with a static Router ID and the given aggregates.
    fn with_router_id(router_id: Ipv4Addr, aggregates: &[Ipv6Network]) -> Router {
        let mut config = InstanceCfg::default();
        config.router_id = Some(router_id);
        config.aggregates = aggregates.iter().copied().collect();
        Router::new(config)
    }

    fn process(&mut self, msg: InstanceMsg) {
        self.instance.process_msg(msg);
    }

    fn iface_add(&mut self, ifname: &str, ifindex: u32, mac: [u8; 6]) {
        let msg = InterfaceUpdateMsg {
            ifname: ifname.to_owned(),
            ifindex,
            flags: InterfaceFlags::OPERATIVE | InterfaceFlags::BROADCAST,
            mac_address: Some(MacAddr::from(mac)),
        };
        self.process(InstanceMsg::Ibus(IbusMsg::InterfaceUpd(msg)));
    }

    fn linklocal_add(&mut self, ifname: &str, addr: Ipv6Addr) {
        let msg = AddressMsg {
            ifname: ifname.to_owned(),
            addr: IpNetwork::V6(Ipv6Network::new(addr, 64).unwrap()),
        };
        self.process(InstanceMsg::Ibus(IbusMsg::InterfaceAddressAdd(msg)));
    }

    fn nbr_up(&mut self, ifname: &str, router_id: Ipv4Addr, iface_id: u32) {
        let msg = OspfMsg::NbrUpdate {
            ifname: ifname.to_owned(),
            router_id,
            iface_id,
            src: ip6!("fe80::99"),
            state: nsm::State::Full,
        };
        self.process(InstanceMsg::Ospf(msg));
    }

    fn lsa_update(&mut self, raw: Bytes) {
        let msg = OspfMsg::LsaUpdate {
            raw,
            reachable: true,
        };
        self.process(InstanceMsg::Ospf(msg));
    }

    fn router_id(&self) -> Ipv4Addr {
        self.instance.state.as_ref().unwrap().router_id
    }

    fn lsa_body(&self) -> Option<AcLsaBody> {
        self.instance.state.as_ref()?.last_originated.clone()
    }

    // Returns the current AC-LSA of this router, as flooded by OSPFv3.
    fn lsa(&mut self) -> Option<Bytes> {
        let body = self.lsa_body()?;
        self.seq_no += 1;
        let lsa = Lsa::new(
            1,
            Ipv4Addr::UNSPECIFIED,
            self.router_id(),
            self.seq_no,
            body,
        );
        Some(lsa.raw)
    }

    // Feeds our own AC-LSA back, as the OSPFv3 LSDB would.
    fn echo(&mut self) {
        if let Some(raw) = self.lsa() {
            self.lsa_update(raw);
        }
    }

    fn cycle(&mut self) {
        let msg = ProtocolInputMsg::AssignCycle(AssignCycleMsg {});
        self.process(InstanceMsg::Protocol(msg));
    }

    fn echo_and_cycle(&mut self) {
        self.echo();
        self.cycle();
    }

    fn keys(&self, state: AssignmentState) -> Vec<(String, AssignmentKey)> {
        self.instance
            .interfaces
            .values()
            .flat_map(|iface| {
                iface
                    .assignments
                    .iter()
                    .filter(move |record| record.state == state)
                    .map(|record| (iface.name.clone(), record.key()))
            })
            .collect()
    }

    fn pending_expire_all(&mut self) {
        for (ifname, key) in self.keys(AssignmentState::Pending) {
            let msg = PrefixPendingMsg { ifname, key };
            let msg = ProtocolInputMsg::PrefixPending(msg);
            self.process(InstanceMsg::Protocol(msg));
        }
    }

    fn deprecation_expire_all(&mut self) {
        for (ifname, key) in self.keys(AssignmentState::Deprecating) {
            let msg = PrefixDeprecationMsg { ifname, key };
            let msg = ProtocolInputMsg::PrefixDeprecation(msg);
            self.process(InstanceMsg::Protocol(msg));
        }
    }

    fn assignments(
        &self,
        ifname: &str,
    ) -> Vec<(Ipv6Network, Ipv4Addr, AssignmentState)> {
        self.instance.interfaces[ifname]
            .assignments
            .iter()
            .map(|record| (record.prefix, record.assigning_rtr, record.state))
            .collect()
    }

    fn ibus_msgs(&mut self) -> Vec<IbusMsg> {
        let mut msgs = vec![];
        while let Ok(msg) = self.ibus_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    fn outputs(&mut self) -> Vec<ProtocolOutputMsg> {
        let mut msgs = vec![];
        while let Ok(msg) = self.output_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    fn originated(&mut self) -> Vec<AcLsaBody> {
        self.outputs()
            .into_iter()
            .filter_map(|msg| msg.into_lsa_originate().ok())
            .map(|msg| msg.body)
            .collect()
    }
}

//
// Helper functions.
//

// Builds the AC-LSA of a router that isn't simulated.
fn ac_lsa(
    adv_rtr: Ipv4Addr,
    fingerprint: u32,
    aggregated: &[Ipv6Network],
    assigned: &[(Ipv6Network, u32)],
) -> Bytes {
    let body = AcLsaBody {
        fingerprint: Some(RouterHwFingerprintTlv::new(fingerprint)),
        aggregated: aggregated
            .iter()
            .map(|prefix| AggregatedPrefixTlv::new(*prefix))
            .collect(),
        assigned: assigned
            .iter()
            .map(|(prefix, iface_id)| AssignedPrefixTlv::new(*prefix, *iface_id))
            .collect(),
        unknown: vec![],
    };
    Lsa::new(1, Ipv4Addr::UNSPECIFIED, adv_rtr, 0x80000001, body).raw
}

// Delivers the current AC-LSA of every router to every router.
fn flood(routers: &mut [&mut Router]) {
    let lsas = routers
        .iter_mut()
        .filter_map(|router| router.lsa())
        .collect::<Vec<_>>();
    for router in routers.iter_mut() {
        for raw in &lsas {
            router.lsa_update(raw.clone());
        }
    }
}

fn cycle_all(routers: &mut [&mut Router]) {
    for router in routers.iter_mut() {
        router.cycle();
    }
}

fn advertised(body: &AcLsaBody) -> Vec<Ipv6Network> {
    body.assigned.iter().map(|tlv| tlv.prefix).collect()
}

fn installed_addrs(msgs: &[IbusMsg]) -> Vec<(String, Ipv6Network)> {
    msgs.iter()
        .filter_map(|msg| match msg {
            IbusMsg::InterfaceIpAddRequest { ifname, addr, .. } => {
                Some((ifname.clone(), *addr))
            }
            _ => None,
        })
        .collect()
}

fn uninstalled_addrs(msgs: &[IbusMsg]) -> Vec<(String, Ipv6Network)> {
    msgs.iter()
        .filter_map(|msg| match msg {
            IbusMsg::InterfaceIpDelRequest { ifname, addr, .. } => {
                Some((ifname.clone(), *addr))
            }
            _ => None,
        })
        .collect()
}

const MAC1: [u8; 6] = [0x52, 0x54, 0x00, 0x00, 0x01, 0x01];
const MAC2: [u8; 6] = [0x52, 0x54, 0x00, 0x00, 0x01, 0x02];
const MAC3: [u8; 6] = [0x52, 0x54, 0x00, 0x00, 0x02, 0x01];
const MAC4: [u8; 6] = [0x52, 0x54, 0x00, 0x00, 0x02, 0x02];

//
// Tests.
//

#[test]
fn test_single_router() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    assert!(rtr.instance.is_active());

    // The initial AC-LSA carries the aggregate and the fingerprint.
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0].aggregated,
        vec![AggregatedPrefixTlv::new(net6!("fc00::/48"))]
    );
    assert!(bodies[0].fingerprint.is_some());
    assert!(bodies[0].assigned.is_empty());

    // The first /64 of the aggregate is claimed and advertised right away.
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("1.1.1.1"), AssignmentState::Pending)]
    );
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert_eq!(advertised(&bodies[0]), vec![net6!("fc00::/64")]);
    assert_eq!(bodies[0].assigned[0].iface_id, 1);
    assert!(rtr.ibus_msgs().is_empty());

    // Stabilization: the address is installed and RAs are enabled.
    rtr.echo_and_cycle();
    rtr.pending_expire_all();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("1.1.1.1"), AssignmentState::Active)]
    );
    let msgs = rtr.ibus_msgs();
    assert_eq!(
        installed_addrs(&msgs),
        vec![("eth0".to_owned(), net6!("fc00::5054:ff:fe00:101/64"))]
    );
    assert!(msgs.iter().any(|msg| matches!(
        msg,
        IbusMsg::RaPrefixAdd { ifname, prefix }
            if ifname == "eth0" && *prefix == net6!("fc00::/64")
    )));
    assert!(msgs.iter().any(|msg| matches!(
        msg,
        IbusMsg::RaSuppress { ifname, suppress: false } if ifname == "eth0"
    )));

    // No ULA is generated while an aggregate exists.
    assert!(
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .ula_generation_timer
            .is_none()
    );
}

#[test]
fn test_show() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();
    rtr.outputs();

    rtr.process(InstanceMsg::Northbound(NbMsg::Show(ShowKind::Aggregated)));
    let output = rtr.outputs().pop().unwrap().into_show().unwrap();
    let ShowOutput::Aggregated(aggregates) = output else {
        panic!("unexpected show output");
    };
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].prefix, net6!("fc00::/48"));
    assert_eq!(aggregates[0].source, PrefixSource::Configured);
    assert_eq!(aggregates[0].adv_rtr, ip4!("1.1.1.1"));

    rtr.process(InstanceMsg::Northbound(NbMsg::Show(ShowKind::Assigned)));
    let output = rtr.outputs().pop().unwrap().into_show().unwrap();
    let ShowOutput::Assigned(entries) = output else {
        panic!("unexpected show output");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ifname, "eth0");
    assert_eq!(entries[0].prefix, net6!("fc00::/64"));
    assert_eq!(entries[0].state, AssignmentState::Pending);
}

#[test]
fn test_aggregate_config() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.outputs();

    // Aggregates must leave room for a /64.
    rtr.process(InstanceMsg::Northbound(NbMsg::AggregateAdd(net6!(
        "fc00::/80"
    ))));
    assert!(rtr.instance.config.aggregates.is_empty());

    // Host bits are masked.
    rtr.process(InstanceMsg::Northbound(NbMsg::AggregateAdd(net6!(
        "fc00::1/48"
    ))));
    assert_eq!(rtr.instance.config.aggregates, btreeset![net6!("fc00::/48")]);
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].aggregated.len(), 1);

    rtr.echo_and_cycle();
    assert_eq!(rtr.assignments("eth0").len(), 1);

    // Deallocating withdraws the aggregate and invalidates the assignment.
    rtr.process(InstanceMsg::Northbound(NbMsg::AggregateDel(net6!(
        "fc00::/48"
    ))));
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].aggregated.is_empty());
    rtr.echo_and_cycle();
    assert!(rtr.assignments("eth0").is_empty());
}

// Two routers sharing eth0. The router with the highest Router ID assigns the
// prefix of the shared link, the other one adopts it.
#[test]
fn test_two_routers_adoption() {
    let mut rtr1 = Router::with_router_id(ip4!("2.2.2.2"), &[net6!("fc00::/48")]);
    let mut rtr2 = Router::with_router_id(ip4!("1.1.1.1"), &[]);
    rtr1.iface_add("eth0", 10, MAC1);
    rtr2.iface_add("eth0", 20, MAC3);
    rtr1.nbr_up("eth0", ip4!("1.1.1.1"), 20);
    rtr2.nbr_up("eth0", ip4!("2.2.2.2"), 10);

    flood(&mut [&mut rtr1, &mut rtr2]);
    cycle_all(&mut [&mut rtr1, &mut rtr2]);
    assert_eq!(
        rtr1.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("2.2.2.2"), AssignmentState::Pending)]
    );
    assert!(rtr2.assignments("eth0").is_empty());

    flood(&mut [&mut rtr1, &mut rtr2]);
    cycle_all(&mut [&mut rtr1, &mut rtr2]);
    assert_eq!(
        rtr2.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("2.2.2.2"), AssignmentState::Pending)]
    );

    // Adopted prefixes aren't advertised.
    assert!(advertised(&rtr2.lsa_body().unwrap()).is_empty());

    rtr1.pending_expire_all();
    rtr2.pending_expire_all();
    assert_eq!(
        installed_addrs(&rtr1.ibus_msgs()),
        vec![("eth0".to_owned(), net6!("fc00::5054:ff:fe00:101/64"))]
    );
    assert_eq!(
        installed_addrs(&rtr2.ibus_msgs()),
        vec![("eth0".to_owned(), net6!("fc00::5054:ff:fe00:201/64"))]
    );
}

// A lower Router ID holding active prefixes meets a neighbor that assigned
// another prefix to their shared link.
#[test]
fn test_two_routers_takeover() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.iface_add("eth1", 2, MAC2);
    rtr.echo_and_cycle();
    rtr.echo_and_cycle();
    rtr.pending_expire_all();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("1.1.1.1"), AssignmentState::Active)]
    );
    assert_eq!(
        rtr.assignments("eth1"),
        vec![(
            net6!("fc00:0:0:1::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Active
        )]
    );
    rtr.ibus_msgs();

    // Neighbor with a higher Router ID on eth0.
    rtr.nbr_up("eth0", ip4!("2.2.2.2"), 7);
    rtr.lsa_update(ac_lsa(
        ip4!("2.2.2.2"),
        1,
        &[],
        &[(net6!("fc00:0:0:3::/64"), 7)],
    ));
    rtr.echo_and_cycle();

    // Our own eth0 prefix is deprecated in favor of the neighbor's.
    assert_eq!(
        rtr.assignments("eth0"),
        vec![
            (
                net6!("fc00::/64"),
                ip4!("1.1.1.1"),
                AssignmentState::Deprecating
            ),
            (
                net6!("fc00:0:0:3::/64"),
                ip4!("2.2.2.2"),
                AssignmentState::Pending
            ),
        ]
    );
    assert_eq!(
        rtr.assignments("eth1"),
        vec![(
            net6!("fc00:0:0:1::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Active
        )]
    );
    assert_eq!(
        advertised(&rtr.lsa_body().unwrap()),
        vec![net6!("fc00:0:0:1::/64")]
    );

    // Addresses are only removed when the deprecation expires.
    assert!(uninstalled_addrs(&rtr.ibus_msgs()).is_empty());
    rtr.deprecation_expire_all();
    let msgs = rtr.ibus_msgs();
    assert_eq!(
        uninstalled_addrs(&msgs),
        vec![("eth0".to_owned(), net6!("fc00::5054:ff:fe00:101/64"))]
    );
    assert!(msgs.iter().any(|msg| matches!(
        msg,
        IbusMsg::RaSuppress { ifname, suppress: true } if ifname == "eth0"
    )));

    rtr.pending_expire_all();
    assert_eq!(
        installed_addrs(&rtr.ibus_msgs()),
        vec![("eth0".to_owned(), net6!("fc00:0:0:3:5054:ff:fe00:101/64"))]
    );
}

// A deprecating prefix that becomes valid again goes back to active.
#[test]
fn test_deprecation_refresh() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();
    rtr.echo_and_cycle();
    rtr.pending_expire_all();

    // A higher Router ID claims the same prefix elsewhere in the backbone.
    let raw = ac_lsa(ip4!("3.3.3.3"), 1, &[], &[(net6!("fc00::/64"), 4)]);
    rtr.lsa_update(raw);
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(
            net6!("fc00::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Deprecating
        )]
    );

    // The conflicting claim goes away before the deprecation expires.
    let msg = OspfMsg::LsaDelete {
        adv_rtr: ip4!("3.3.3.3"),
        lsa_id: Ipv4Addr::UNSPECIFIED,
    };
    rtr.process(InstanceMsg::Ospf(msg));
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("1.1.1.1"), AssignmentState::Active)]
    );
    assert!(uninstalled_addrs(&rtr.ibus_msgs()).is_empty());
    assert_eq!(
        advertised(&rtr.lsa_body().unwrap()),
        vec![net6!("fc00::/64")]
    );
}

// A higher Router ID claims, under a broader aggregate, one of the prefixes
// we already assigned. Only the conflicting assignment is deprecated.
#[test]
fn test_network_wide_conflict() {
    let mut rtr = Router::with_router_id(
        ip4!("0.0.0.50"),
        &[net6!("fc00::/48"), net6!("fc01::/48")],
    );
    rtr.iface_add("eth0", 1, MAC1);
    rtr.iface_add("eth1", 2, MAC2);
    rtr.iface_add("eth2", 3, MAC3);
    rtr.echo_and_cycle();
    rtr.echo_and_cycle();
    rtr.pending_expire_all();
    assert_eq!(
        advertised(&rtr.lsa_body().unwrap()),
        vec![
            net6!("fc00::/64"),
            net6!("fc01::/64"),
            net6!("fc00:0:0:1::/64"),
            net6!("fc01:0:0:1::/64"),
            net6!("fc00:0:0:2::/64"),
            net6!("fc01:0:0:2::/64"),
        ]
    );
    rtr.ibus_msgs();

    // Router 51 shares eth0 with us and assigned fc00:0:0:1::/64 to another
    // of its links.
    rtr.nbr_up("eth0", ip4!("0.0.0.51"), 7);
    let raw = ac_lsa(
        ip4!("0.0.0.51"),
        1,
        &[net6!("fc00::/47")],
        &[(net6!("fc00:0:0:1::/64"), 9)],
    );
    rtr.lsa_update(raw);
    rtr.echo_and_cycle();

    let active = AssignmentState::Active;
    let rtr50 = ip4!("0.0.0.50");
    assert_eq!(
        rtr.assignments("eth0"),
        vec![
            (net6!("fc00::/64"), rtr50, active),
            (net6!("fc01::/64"), rtr50, active),
        ]
    );
    assert_eq!(
        rtr.assignments("eth1"),
        vec![
            (
                net6!("fc00:0:0:1::/64"),
                rtr50,
                AssignmentState::Deprecating
            ),
            (net6!("fc01:0:0:1::/64"), rtr50, active),
        ]
    );
    assert_eq!(
        rtr.assignments("eth2"),
        vec![
            (net6!("fc00:0:0:2::/64"), rtr50, active),
            (net6!("fc01:0:0:2::/64"), rtr50, active),
        ]
    );
    assert_eq!(
        advertised(&rtr.lsa_body().unwrap()),
        vec![
            net6!("fc00::/64"),
            net6!("fc01::/64"),
            net6!("fc01:0:0:1::/64"),
            net6!("fc00:0:0:2::/64"),
            net6!("fc01:0:0:2::/64"),
        ]
    );
    assert!(uninstalled_addrs(&rtr.ibus_msgs()).is_empty());

    // Once deprecated, the address goes away and eth1 gets a free prefix.
    rtr.deprecation_expire_all();
    assert_eq!(
        uninstalled_addrs(&rtr.ibus_msgs()),
        vec![(
            "eth1".to_owned(),
            net6!("fc00:0:0:1:5054:ff:fe00:102/64")
        )]
    );
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth1"),
        vec![
            (net6!("fc01:0:0:1::/64"), rtr50, active),
            (net6!("fc00:0:0:3::/64"), rtr50, AssignmentState::Pending),
        ]
    );
}

// Two routers claim the same prefix on different links before hearing from
// each other. Only the claim of the highest Router ID survives.
#[test]
fn test_single_owner() {
    let mut rtr1 = Router::with_router_id(ip4!("2.2.2.2"), &[net6!("fc00::/48")]);
    let mut rtr2 = Router::with_router_id(ip4!("1.1.1.1"), &[]);
    rtr1.iface_add("eth0", 1, MAC1);
    rtr1.iface_add("eth1", 2, MAC2);
    rtr2.iface_add("eth0", 1, MAC3);
    rtr2.iface_add("eth1", 2, MAC4);
    rtr1.nbr_up("eth0", ip4!("1.1.1.1"), 1);
    rtr2.nbr_up("eth0", ip4!("2.2.2.2"), 1);

    flood(&mut [&mut rtr1, &mut rtr2]);
    cycle_all(&mut [&mut rtr1, &mut rtr2]);
    assert_eq!(
        rtr1.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("2.2.2.2"), AssignmentState::Pending)]
    );
    assert_eq!(
        rtr2.assignments("eth1"),
        vec![(net6!("fc00::/64"), ip4!("1.1.1.1"), AssignmentState::Pending)]
    );

    // Run until convergence.
    for _ in 0..3 {
        flood(&mut [&mut rtr1, &mut rtr2]);
        cycle_all(&mut [&mut rtr1, &mut rtr2]);
    }
    rtr1.pending_expire_all();
    rtr2.pending_expire_all();
    flood(&mut [&mut rtr1, &mut rtr2]);
    cycle_all(&mut [&mut rtr1, &mut rtr2]);

    assert_eq!(
        rtr1.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("2.2.2.2"), AssignmentState::Active)]
    );
    assert_eq!(
        rtr1.assignments("eth1"),
        vec![(
            net6!("fc00:0:0:1::/64"),
            ip4!("2.2.2.2"),
            AssignmentState::Active
        )]
    );
    assert_eq!(
        rtr2.assignments("eth0"),
        vec![(net6!("fc00::/64"), ip4!("2.2.2.2"), AssignmentState::Active)]
    );
    assert_eq!(
        rtr2.assignments("eth1"),
        vec![(
            net6!("fc00:0:0:2::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Active
        )]
    );

    // Every advertised prefix has a single owner.
    let mut prefixes = advertised(&rtr1.lsa_body().unwrap());
    prefixes.extend(advertised(&rtr2.lsa_body().unwrap()));
    let unique = prefixes.iter().collect::<BTreeSet<_>>();
    assert_eq!(prefixes.len(), unique.len());
    assert_eq!(prefixes.len(), 3);
}

#[test]
fn test_most_specific_aggregate() {
    let mut rtr = Router::with_router_id(
        ip4!("1.1.1.1"),
        &[net6!("fc00::/48"), net6!("fc00:0:0:100::/56")],
    );
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();

    assert_eq!(
        rtr.assignments("eth0"),
        vec![(
            net6!("fc00:0:0:100::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Pending
        )]
    );
}

#[test]
fn test_idempotence() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.iface_add("eth1", 2, MAC2);
    rtr.echo_and_cycle();
    rtr.echo_and_cycle();
    rtr.pending_expire_all();
    rtr.echo_and_cycle();
    rtr.outputs();
    rtr.ibus_msgs();

    let before = (rtr.assignments("eth0"), rtr.assignments("eth1"));
    for _ in 0..3 {
        rtr.echo_and_cycle();
    }
    let after = (rtr.assignments("eth0"), rtr.assignments("eth1"));
    assert_eq!(before, after);
    assert!(rtr.originated().is_empty());
    assert!(rtr.ibus_msgs().is_empty());
}

// The history is preferred over a brand-new prefix, and it's persisted.
#[test]
fn test_stability() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        history::path(dir.path(), "eth0"),
        "2001:db8::/64\nfc00:0:0:42::/64\n",
    )
    .unwrap();

    let mut config = InstanceCfg::default();
    config.router_id = Some(ip4!("1.1.1.1"));
    config.aggregates = btreeset![net6!("fc00::/48")];
    config.storage_dir = Some(dir.path().to_owned());
    let mut rtr = Router::new(config);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(
            net6!("fc00:0:0:42::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Pending
        )]
    );

    // Persist the history.
    let msg = ProtocolInputMsg::HistoryWrite(HistoryWriteMsg {
        ifname: "eth0".to_owned(),
    });
    rtr.process(InstanceMsg::Protocol(msg));
    let data = std::fs::read_to_string(history::path(dir.path(), "eth0"))
        .unwrap();
    assert_eq!(data, "fc00:0:0:42::/64\n2001:db8::/64\n");
}

// History entries other than /64s are never handed out to an interface.
#[test]
fn test_stability_non_64_history() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        history::path(dir.path(), "eth0"),
        "fc00::/48\nfc00::/56\nfc00:0:0:7::/64\n",
    )
    .unwrap();

    let mut config = InstanceCfg::default();
    config.router_id = Some(ip4!("1.1.1.1"));
    config.aggregates = btreeset![net6!("fc00::/48")];
    config.storage_dir = Some(dir.path().to_owned());
    let mut rtr = Router::new(config);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.assignments("eth0"),
        vec![(
            net6!("fc00:0:0:7::/64"),
            ip4!("1.1.1.1"),
            AssignmentState::Pending
        )]
    );
}

// Nothing happens until every neighbor's AC-LSA is known.
#[test]
fn test_liveness_gate() {
    let mut rtr = Router::with_router_id(ip4!("2.2.2.2"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.nbr_up("eth0", ip4!("1.1.1.1"), 5);
    rtr.echo_and_cycle();
    assert!(rtr.assignments("eth0").is_empty());

    rtr.lsa_update(ac_lsa(ip4!("1.1.1.1"), 1, &[], &[]));
    rtr.cycle();
    assert_eq!(rtr.assignments("eth0").len(), 1);

    // An unreachable neighbor stops the cycles again.
    let msg = OspfMsg::RouterReachability {
        router_id: ip4!("1.1.1.1"),
        reachable: false,
    };
    rtr.process(InstanceMsg::Ospf(msg));
    rtr.cycle();
    assert_eq!(rtr.assignments("eth0").len(), 1);
    assert_eq!(
        rtr.assignments("eth0")[0].2,
        AssignmentState::Pending
    );
}

// A malformed AC-LSA is removed from the view of the cycles.
#[test]
fn test_malformed_lsa() {
    let mut rtr = Router::with_router_id(ip4!("2.2.2.2"), &[]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.nbr_up("eth0", ip4!("1.1.1.1"), 5);
    rtr.lsa_update(ac_lsa(ip4!("1.1.1.1"), 1, &[net6!("fc00::/48")], &[]));
    rtr.echo_and_cycle();
    assert_eq!(rtr.assignments("eth0").len(), 1);

    let mut raw = ac_lsa(ip4!("1.1.1.1"), 1, &[net6!("fc00::/48")], &[]).to_vec();
    raw[32] = 200;
    rtr.lsa_update(Bytes::from(raw));
    assert_eq!(rtr.instance.state.as_ref().unwrap().lsdb.len(), 1);

    // Without the neighbor's AC-LSA the liveness gate holds the cycles.
    rtr.cycle();
    assert_eq!(rtr.assignments("eth0").len(), 1);
}

#[test]
fn test_ula() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = InstanceCfg::default();
    config.router_id = Some(ip4!("1.1.1.1"));
    config.storage_dir = Some(dir.path().to_owned());
    let mut rtr = Router::new(config);
    rtr.iface_add("eth0", 1, MAC1);

    // Highest Router ID without any aggregate: schedule the ULA generation.
    rtr.echo_and_cycle();
    assert!(
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .ula_generation_timer
            .is_some()
    );
    rtr.outputs();

    let msg = ProtocolInputMsg::UlaGeneration(UlaGenerationMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    let ula = rtr.instance.state.as_ref().unwrap().ula.unwrap();
    assert!(ula::is_generated_ula(&ula));
    assert_eq!(ula::load(dir.path()).unwrap(), Some(ula));
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].aggregated, vec![AggregatedPrefixTlv::new(ula)]);

    // Prefixes are assigned out of the ULA.
    rtr.echo_and_cycle();
    let assignments = rtr.assignments("eth0");
    assert_eq!(assignments.len(), 1);
    assert!(ula.contains(assignments[0].0.network()));

    // An operator-supplied aggregate retires the ULA after a grace period.
    rtr.process(InstanceMsg::Northbound(NbMsg::AggregateAdd(net6!(
        "2001:db8::/48"
    ))));
    rtr.echo_and_cycle();
    assert!(
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .ula_termination_timer
            .is_some()
    );
    rtr.outputs();

    let msg = ProtocolInputMsg::UlaTermination(UlaTerminationMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    assert!(rtr.instance.state.as_ref().unwrap().ula.is_none());
    let bodies = rtr.originated();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0].aggregated,
        vec![AggregatedPrefixTlv::new(net6!("2001:db8::/48"))]
    );

    // The persisted ULA is kept for later reuse.
    assert_eq!(ula::load(dir.path()).unwrap(), Some(ula));
}

#[test]
fn test_ula_reuse() {
    let dir = tempfile::tempdir().unwrap();
    ula::store(dir.path(), &net6!("fd12:3456:789a::/48")).unwrap();

    let mut config = InstanceCfg::default();
    config.router_id = Some(ip4!("1.1.1.1"));
    config.storage_dir = Some(dir.path().to_owned());
    let mut rtr = Router::new(config);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();

    let msg = ProtocolInputMsg::UlaGeneration(UlaGenerationMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    assert_eq!(
        rtr.instance.state.as_ref().unwrap().ula,
        Some(net6!("fd12:3456:789a::/48"))
    );
}

// Only the router with the highest Router ID generates a ULA.
#[test]
fn test_ula_not_highest() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.nbr_up("eth0", ip4!("2.2.2.2"), 5);
    rtr.lsa_update(ac_lsa(ip4!("2.2.2.2"), 1, &[], &[]));
    rtr.echo_and_cycle();
    assert!(
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .ula_generation_timer
            .is_none()
    );
}

// Another router advertising our Router ID with a lower fingerprint: we
// pick a new Router ID.
#[test]
fn test_fingerprint_collision() {
    let mut rtr = Router::new(InstanceCfg::default());
    rtr.iface_add("eth0", 1, MAC1);
    let old_router_id = rtr.router_id();
    let outputs = rtr.outputs();
    assert!(outputs.iter().any(|msg| matches!(
        msg,
        ProtocolOutputMsg::RouterIdUpdate(msg) if msg.router_id == old_router_id
    )));

    // Higher fingerprint: the other router moves.
    let fingerprint = rtr.instance.identity.fingerprint;
    rtr.lsa_update(ac_lsa(old_router_id, fingerprint.wrapping_add(1), &[], &[]));
    assert_eq!(rtr.router_id(), old_router_id);
    assert_eq!(rtr.instance.state.as_ref().unwrap().lsdb.len(), 1);

    // Lower fingerprint: we move, once the reconfiguration timer expires.
    // A burst of conflicting LSAs leads to a single regeneration.
    rtr.lsa_update(ac_lsa(old_router_id, fingerprint.wrapping_sub(1), &[], &[]));
    rtr.lsa_update(ac_lsa(old_router_id, fingerprint.wrapping_sub(2), &[], &[]));
    assert_eq!(rtr.router_id(), old_router_id);
    assert_eq!(rtr.instance.state.as_ref().unwrap().lsdb.len(), 1);
    assert!(
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .router_id_reconfig_timer
            .is_some()
    );

    let msg = ProtocolInputMsg::RouterIdReconfig(RouterIdReconfigMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    let new_router_id = rtr.router_id();
    assert_ne!(new_router_id, old_router_id);
    assert!(rtr.instance.state.as_ref().unwrap().lsdb.is_empty());
    let updates = rtr
        .outputs()
        .into_iter()
        .filter_map(|msg| msg.into_router_id_update().ok())
        .map(|msg| msg.router_id)
        .collect::<Vec<_>>();
    assert_eq!(updates, vec![new_router_id]);
}

// A collision with a static Router ID keeps the instance down.
#[test]
fn test_fingerprint_collision_static() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[]);
    rtr.iface_add("eth0", 1, MAC1);
    let fingerprint = rtr.instance.identity.fingerprint;
    rtr.lsa_update(ac_lsa(ip4!("1.1.1.1"), fingerprint.wrapping_sub(1), &[], &[]));
    assert!(rtr.instance.is_active());
    let msg = ProtocolInputMsg::RouterIdReconfig(RouterIdReconfigMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    assert!(!rtr.instance.is_active());

    // Reconfiguring the Router ID brings it back.
    rtr.process(InstanceMsg::Northbound(NbMsg::RouterIdSet(Some(ip4!(
        "1.1.1.9"
    )))));
    assert!(rtr.instance.is_active());
    assert_eq!(rtr.router_id(), ip4!("1.1.1.9"));
}

#[test]
fn test_router_id_collision() {
    let mut rtr = Router::new(InstanceCfg::default());
    rtr.iface_add("eth0", 1, MAC1);
    rtr.linklocal_add("eth0", ip6!("fe80::10"));
    let router_id = rtr.router_id();
    let hello = |src: &str| {
        InstanceMsg::Ospf(OspfMsg::HelloRx {
            ifname: "eth0".to_owned(),
            router_id,
            src: Ipv6Addr::from_str(src).unwrap(),
            dst: ip6!("ff02::5"),
        })
    };
    let reconfig_pending = |rtr: &Router| {
        rtr.instance
            .state
            .as_ref()
            .unwrap()
            .router_id_reconfig_timer
            .is_some()
    };

    // Our own Hello looped back.
    rtr.process(hello("fe80::10"));
    assert!(!reconfig_pending(&rtr));

    // The other router has the lower link-local address and moves.
    rtr.process(hello("fe80::1"));
    assert!(!reconfig_pending(&rtr));

    // We have the lower link-local address.
    rtr.process(hello("fe80::20"));
    assert!(reconfig_pending(&rtr));

    let msg = ProtocolInputMsg::RouterIdReconfig(RouterIdReconfigMsg {});
    rtr.process(InstanceMsg::Protocol(msg));
    assert_ne!(rtr.router_id(), router_id);
    assert!(!reconfig_pending(&rtr));

    // Interfaces are recreated with the new Router ID.
    assert!(rtr.instance.interfaces.contains_key("eth0"));
}

#[test]
fn test_iface_delete() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.iface_add("eth1", 2, MAC2);
    rtr.echo_and_cycle();
    rtr.echo_and_cycle();
    rtr.pending_expire_all();
    rtr.ibus_msgs();

    rtr.process(InstanceMsg::Ibus(IbusMsg::InterfaceDel("eth1".to_owned())));
    assert!(!rtr.instance.interfaces.contains_key("eth1"));
    assert_eq!(
        uninstalled_addrs(&rtr.ibus_msgs()),
        vec![(
            "eth1".to_owned(),
            net6!("fc00:0:0:1:5054:ff:fe00:102/64")
        )]
    );
    assert_eq!(
        advertised(&rtr.lsa_body().unwrap()),
        vec![net6!("fc00::/64")]
    );

    // Without interfaces the instance goes down.
    rtr.process(InstanceMsg::Ibus(IbusMsg::InterfaceDel("eth0".to_owned())));
    assert!(!rtr.instance.is_active());
}

// Our claims follow the interface ID when the interface is renumbered.
#[test]
fn test_iface_ifindex_change() {
    let mut rtr = Router::with_router_id(ip4!("1.1.1.1"), &[net6!("fc00::/48")]);
    rtr.iface_add("eth0", 1, MAC1);
    rtr.echo_and_cycle();
    assert_eq!(
        rtr.lsa_body().unwrap().assigned,
        vec![AssignedPrefixTlv::new(net6!("fc00::/64"), 1)]
    );

    rtr.iface_add("eth0", 5, MAC1);
    let record = &rtr.instance.interfaces["eth0"].assignments[0];
    assert_eq!(record.assigning_iface_id, 5);
    assert_eq!(
        rtr.lsa_body().unwrap().assigned,
        vec![AssignedPrefixTlv::new(net6!("fc00::/64"), 5)]
    );
}
