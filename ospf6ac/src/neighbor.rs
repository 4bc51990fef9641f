//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use derive_new::new;

// OSPFv3 neighbor as reported by the adjacency state machine.
#[derive(Debug, new)]
pub struct Neighbor {
    pub router_id: Ipv4Addr,
    // Interface ID advertised in the neighbor's Hello packets.
    pub iface_id: u32,
    pub src: Ipv6Addr,
    pub state: nsm::State,
}

// OSPF neighbor state machine states.
pub mod nsm {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }
}

// ===== impl Neighbor =====

impl Neighbor {
    // Neighbors beyond the Init state have bidirectional communication with
    // us and take part in the prefix assignment decisions.
    pub fn is_active(&self) -> bool {
        self.state > nsm::State::Init
    }
}
