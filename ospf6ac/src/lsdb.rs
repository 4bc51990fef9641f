//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::debug::Debug;
use crate::instance::InstanceUpView;
use crate::interface::Interfaces;
use crate::packet::lsa::{AcLsaBody, Lsa, LsaKey};
use crate::packet::tlv::{
    AggregatedPrefixTlv, AssignedPrefixTlv, RouterHwFingerprintTlv,
};
use crate::tasks::messages::ProtocolOutputMsg;
use crate::tasks::messages::output::LsaOriginateMsg;

// Mirror of the backbone AC-LSAs maintained by the OSPFv3 LSDB.
#[derive(Debug, Default)]
pub struct Lsdb {
    entries: BTreeMap<LsaKey, LsaEntry>,
}

#[derive(Debug)]
pub struct LsaEntry {
    pub lsa: Lsa,
    // Whether the advertising router is reachable in the backbone.
    pub reachable: bool,
}

// ===== impl Lsdb =====

impl Lsdb {
    pub fn get(&self, key: &LsaKey) -> Option<&LsaEntry> {
        self.entries.get(key)
    }

    pub(crate) fn insert(&mut self, lsa: Lsa, reachable: bool) {
        Debug::LsaInstall(&lsa.hdr).log();

        let key = lsa.hdr.key();
        self.entries.insert(key, LsaEntry { lsa, reachable });
    }

    pub(crate) fn remove(&mut self, key: &LsaKey) -> Option<LsaEntry> {
        let lse = self.entries.remove(key);
        if lse.is_some() {
            Debug::LsaDelete(key).log();
        }
        lse
    }

    // Updates the reachability of all LSAs originated by the given router.
    // Returns whether anything changed.
    pub(crate) fn set_reachable(
        &mut self,
        adv_rtr: Ipv4Addr,
        reachable: bool,
    ) -> bool {
        let mut changed = false;
        for lse in self
            .entries
            .values_mut()
            .filter(|lse| lse.lsa.hdr.adv_rtr == adv_rtr)
        {
            changed |= lse.reachable != reachable;
            lse.reachable = reachable;
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &LsaEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ===== global functions =====

// Builds the body of this router's AC-LSA out of the configured and
// generated aggregates and the currently advertised assignments.
pub(crate) fn lsa_body(
    instance: &InstanceUpView<'_>,
    interfaces: &Interfaces,
) -> AcLsaBody {
    let router_id = instance.state.router_id;
    let fingerprint =
        RouterHwFingerprintTlv::new(instance.identity.fingerprint);

    let aggregated = instance
        .config
        .aggregates
        .iter()
        .chain(instance.state.ula.iter())
        .map(|prefix| AggregatedPrefixTlv::new(*prefix))
        .collect();

    let assigned = interfaces
        .values()
        .filter(|iface| iface.is_backbone())
        .flat_map(|iface| {
            iface
                .assignments
                .iter()
                .filter(move |record| record.is_advertised(router_id))
                .map(|record| {
                    AssignedPrefixTlv::new(
                        record.prefix,
                        record.assigning_iface_id,
                    )
                })
        })
        .collect();

    AcLsaBody {
        fingerprint: Some(fingerprint),
        aggregated,
        assigned,
        unknown: vec![],
    }
}

// Requests the origination of this router's AC-LSA, unless its content
// didn't change since the last request.
pub(crate) fn originate(
    instance: &mut InstanceUpView<'_>,
    interfaces: &Interfaces,
) {
    instance.state.lsa_orig_pending = false;

    let body = lsa_body(instance, interfaces);
    if instance.state.last_originated.as_ref() == Some(&body) {
        return;
    }

    Debug::LsaOriginate(&body).log();
    let msg = LsaOriginateMsg {
        lsa_id: Ipv4Addr::UNSPECIFIED,
        body: body.clone(),
    };
    instance.state.last_originated = Some(body);
    instance.tx.output(ProtocolOutputMsg::LsaOriginate(msg));
}
