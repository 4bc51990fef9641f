//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod assignment;
pub mod debug;
pub mod error;
pub mod event_recorder;
pub mod events;
pub mod history;
pub mod instance;
pub mod interface;
pub mod lifecycle;
pub mod lsdb;
pub mod neighbor;
pub mod northbound;
pub mod packet;
pub mod prefix;
pub mod router_id;
pub mod snapshot;
pub mod southbound;
pub mod tasks;
pub mod ula;
