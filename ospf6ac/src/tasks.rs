//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use ospf6ac_utils::UnboundedSender;
use ospf6ac_utils::task::TimeoutTask;

use crate::prefix::AssignmentKey;

//
// Autoconfiguration tasks diagram:
//                                      +---------------+
//                                      |   northbound  |
//                                      +---------------+
//                                            | ^
//                                            | |
//                                 nb_rx (1x) V | (1x) protocol_output
//                                      +---------------+
//                      ospf_rx (1x) -> |               | -> (1x) protocol_output
//                                      |               |
//                 assign_timer (1x) -> |               |
//         prefix_pending_timer (Nx) -> |               |
//     prefix_deprecation_timer (Nx) -> |    instance   |
//          history_write_timer (Nx) -> |               |
//         ula_generation_timer (1x) -> |               |
//        ula_termination_timer (1x) -> |               |
//     router_id_reconfig_timer (1x) -> |               |
//                                      +---------------+
//                               ibus_tx (1x) | ^ (1x) ibus_rx
//                                            | |
//                                            V |
//                                      +---------------+
//                                      | address plane |
//                                      +---------------+
//

// Autoconfiguration inter-task message types.
pub mod messages {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use bytes::Bytes;
    use enum_as_inner::EnumAsInner;
    use serde::{Deserialize, Serialize};

    use crate::neighbor::nsm;
    use crate::northbound::state::ShowOutput;
    use crate::packet::lsa::AcLsaBody;
    use crate::prefix::AssignmentKey;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;
    pub type ProtocolOutputMsg = output::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use super::*;

        #[derive(Debug, Deserialize, Serialize)]
        pub enum ProtocolMsg {
            AssignCycle(AssignCycleMsg),
            PrefixPending(PrefixPendingMsg),
            PrefixDeprecation(PrefixDeprecationMsg),
            HistoryWrite(HistoryWriteMsg),
            UlaGeneration(UlaGenerationMsg),
            UlaTermination(UlaTerminationMsg),
            RouterIdReconfig(RouterIdReconfigMsg),
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct AssignCycleMsg {}

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct PrefixPendingMsg {
            pub ifname: String,
            pub key: AssignmentKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct PrefixDeprecationMsg {
            pub ifname: String,
            pub key: AssignmentKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct HistoryWriteMsg {
            pub ifname: String,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct UlaGenerationMsg {}

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct UlaTerminationMsg {}

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct RouterIdReconfigMsg {}

        // Messages from the OSPFv3 collaborator (LSDB, neighbor state
        // machine and Hello reception).
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub enum OspfMsg {
            // An AC-LSA was installed or refreshed in the backbone LSDB.
            LsaUpdate {
                raw: Bytes,
                reachable: bool,
            },
            // An AC-LSA was removed from the backbone LSDB.
            LsaDelete {
                adv_rtr: Ipv4Addr,
                lsa_id: Ipv4Addr,
            },
            // The reachability of a router changed after an SPF run.
            RouterReachability {
                router_id: Ipv4Addr,
                reachable: bool,
            },
            NbrUpdate {
                ifname: String,
                router_id: Ipv4Addr,
                iface_id: u32,
                src: Ipv6Addr,
                state: nsm::State,
            },
            NbrDelete {
                ifname: String,
                router_id: Ipv4Addr,
            },
            // A Hello packet advertising our own Router ID was received.
            HelloRx {
                ifname: String,
                router_id: Ipv4Addr,
                src: Ipv6Addr,
                dst: Ipv6Addr,
            },
        }
    }

    // Output messages (main task -> collaborators).
    pub mod output {
        use super::*;

        #[derive(Clone, Debug, EnumAsInner, Serialize)]
        pub enum ProtocolMsg {
            LsaOriginate(LsaOriginateMsg),
            RouterIdUpdate(RouterIdUpdateMsg),
            Show(ShowOutput),
        }

        // Request to (re)originate this router's AC-LSA. The OSPFv3
        // collaborator owns sequence numbers and flooding.
        #[derive(Clone, Debug, Serialize)]
        pub struct LsaOriginateMsg {
            pub lsa_id: Ipv4Addr,
            pub body: AcLsaBody,
        }

        // Notification that the Router ID changed. The OSPFv3 collaborator
        // is expected to flush its LSDB and restart.
        #[derive(Clone, Debug, Serialize)]
        pub struct RouterIdUpdateMsg {
            pub router_id: Ipv4Addr,
        }
    }
}

// ===== autoconfiguration tasks =====

// Assignment cycle debounce timer.
pub(crate) fn assign_timer(
    assign_cyclep: &UnboundedSender<messages::input::AssignCycleMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_millis(100);
        let assign_cyclep = assign_cyclep.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ = assign_cyclep.send(messages::input::AssignCycleMsg {});
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Assignment stabilization timer.
pub(crate) fn prefix_pending_timer(
    ifname: &str,
    key: AssignmentKey,
    timeout: u16,
    prefix_pendingp: &UnboundedSender<messages::input::PrefixPendingMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(timeout.into());
        let ifname = ifname.to_owned();
        let prefix_pendingp = prefix_pendingp.clone();

        TimeoutTask::new(timeout, move || async move {
            let msg = messages::input::PrefixPendingMsg { ifname, key };
            let _ = prefix_pendingp.send(msg);
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Assignment deprecation timer.
pub(crate) fn prefix_deprecation_timer(
    ifname: &str,
    key: AssignmentKey,
    timeout: u16,
    prefix_deprecationp: &UnboundedSender<
        messages::input::PrefixDeprecationMsg,
    >,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(timeout.into());
        let ifname = ifname.to_owned();
        let prefix_deprecationp = prefix_deprecationp.clone();

        TimeoutTask::new(timeout, move || async move {
            let msg = messages::input::PrefixDeprecationMsg { ifname, key };
            let _ = prefix_deprecationp.send(msg);
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Associated prefix history write timer.
pub(crate) fn history_write_timer(
    ifname: &str,
    timeout: Duration,
    history_writep: &UnboundedSender<messages::input::HistoryWriteMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let ifname = ifname.to_owned();
        let history_writep = history_writep.clone();

        TimeoutTask::new(timeout, move || async move {
            let msg = messages::input::HistoryWriteMsg { ifname };
            let _ = history_writep.send(msg);
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// ULA prefix generation timer.
pub(crate) fn ula_generation_timer(
    timeout: u16,
    ula_generationp: &UnboundedSender<messages::input::UlaGenerationMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(timeout.into());
        let ula_generationp = ula_generationp.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ = ula_generationp.send(messages::input::UlaGenerationMsg {});
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// ULA prefix termination timer.
pub(crate) fn ula_termination_timer(
    timeout: u16,
    ula_terminationp: &UnboundedSender<messages::input::UlaTerminationMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(timeout.into());
        let ula_terminationp = ula_terminationp.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ =
                ula_terminationp.send(messages::input::UlaTerminationMsg {});
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Router ID reconfiguration timer.
pub(crate) fn router_id_reconfig_timer(
    router_id_reconfigp: &UnboundedSender<
        messages::input::RouterIdReconfigMsg,
    >,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(1);
        let router_id_reconfigp = router_id_reconfigp.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ = router_id_reconfigp
                .send(messages::input::RouterIdReconfigMsg {});
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}
