//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnetwork::Ipv6Network;

use crate::lsdb::Lsdb;
use crate::prefix::{AggregatedPrefix, AssignedPrefix, PrefixSource};

// Immutable view of the backbone AC-LSAs used by one assignment cycle.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub assigned: Vec<AssignedPrefix>,
    pub aggregated: Vec<AggregatedPrefix>,
    pub reachable: BTreeSet<Ipv4Addr>,
}

// ===== impl Snapshot =====

impl Snapshot {
    // Walks the reachable AC-LSAs of the backbone.
    //
    // Aggregates advertised by this router keep the source they had in the
    // previous working list. One that can't be found there is assumed to
    // have been learned from the network.
    pub fn build(
        lsdb: &Lsdb,
        router_id: Ipv4Addr,
        prev: &[AggregatedPrefix],
    ) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for lse in lsdb.iter().filter(|lse| lse.reachable) {
            let adv_rtr = lse.lsa.hdr.adv_rtr;
            snapshot.reachable.insert(adv_rtr);

            for tlv in &lse.lsa.body.aggregated {
                let source = if adv_rtr == router_id {
                    prev.iter()
                        .find(|aggregate| aggregate.prefix == tlv.prefix)
                        .map(|aggregate| aggregate.source)
                        .unwrap_or(PrefixSource::Network)
                } else {
                    PrefixSource::Network
                };
                snapshot.aggregated.push(AggregatedPrefix::new(
                    tlv.prefix, source, adv_rtr,
                ));
            }

            for tlv in &lse.lsa.body.assigned {
                snapshot.assigned.push(AssignedPrefix::new(
                    tlv.prefix,
                    adv_rtr,
                    tlv.iface_id,
                ));
            }
        }

        snapshot
    }

    // Returns whether no router with a higher Router ID claims the same
    // prefix anywhere in the backbone.
    pub fn is_valid_network_wide(
        &self,
        prefix: &Ipv6Network,
        assigning_rtr: Ipv4Addr,
    ) -> bool {
        !self.assigned.iter().any(|assignment| {
            assignment.prefix == *prefix
                && assignment.assigning_rtr > assigning_rtr
        })
    }
}
