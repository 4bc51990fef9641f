//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::southbound::{AddressMsg, InterfaceUpdateMsg};

// Useful type definition(s).
pub type IbusReceiver = UnboundedReceiver<IbusMsg>;
pub type IbusSender = UnboundedSender<IbusMsg>;

/// Transmit channel towards the address plane (the component that owns the
/// kernel interfaces and the router advertisement daemon).
#[derive(Clone, Debug)]
pub struct IbusChannelsTx {
    address_plane: IbusSender,
}

/// Messages exchanged with the address plane.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum IbusMsg {
    /// Interface update notification.
    InterfaceUpd(InterfaceUpdateMsg),
    /// Interface delete notification.
    InterfaceDel(String),
    /// Interface address addition notification.
    InterfaceAddressAdd(AddressMsg),
    /// Interface address delete notification.
    InterfaceAddressDel(AddressMsg),
    /// Request to add an address to an interface.
    InterfaceIpAddRequest {
        ifname: String,
        ifindex: u32,
        addr: Ipv6Network,
    },
    /// Request to delete an address from an interface.
    InterfaceIpDelRequest {
        ifname: String,
        ifindex: u32,
        addr: Ipv6Network,
    },
    /// Request to advertise a prefix in Router Advertisements.
    RaPrefixAdd { ifname: String, prefix: Ipv6Network },
    /// Request to withdraw a prefix from Router Advertisements.
    RaPrefixDel { ifname: String, prefix: Ipv6Network },
    /// Request to start or stop suppressing Router Advertisements.
    RaSuppress { ifname: String, suppress: bool },
}

// ===== impl IbusChannelsTx =====

impl IbusChannelsTx {
    pub fn new(address_plane: IbusSender) -> IbusChannelsTx {
        IbusChannelsTx { address_plane }
    }

    /// Sends an [`IbusMsg::InterfaceIpAddRequest`] message.
    pub fn interface_ip_add(
        &self,
        ifname: String,
        ifindex: u32,
        addr: Ipv6Network,
    ) {
        self.send(IbusMsg::InterfaceIpAddRequest {
            ifname,
            ifindex,
            addr,
        });
    }

    /// Sends an [`IbusMsg::InterfaceIpDelRequest`] message.
    pub fn interface_ip_del(
        &self,
        ifname: String,
        ifindex: u32,
        addr: Ipv6Network,
    ) {
        self.send(IbusMsg::InterfaceIpDelRequest {
            ifname,
            ifindex,
            addr,
        });
    }

    /// Sends an [`IbusMsg::RaPrefixAdd`] message.
    pub fn ra_prefix_add(&self, ifname: String, prefix: Ipv6Network) {
        self.send(IbusMsg::RaPrefixAdd { ifname, prefix });
    }

    /// Sends an [`IbusMsg::RaPrefixDel`] message.
    pub fn ra_prefix_del(&self, ifname: String, prefix: Ipv6Network) {
        self.send(IbusMsg::RaPrefixDel { ifname, prefix });
    }

    /// Sends an [`IbusMsg::RaSuppress`] message.
    pub fn ra_suppress(&self, ifname: String, suppress: bool) {
        self.send(IbusMsg::RaSuppress { ifname, suppress });
    }

    fn send(&self, msg: IbusMsg) {
        if self.address_plane.send(msg).is_err() {
            warn!("address plane channel closed");
        }
    }
}
