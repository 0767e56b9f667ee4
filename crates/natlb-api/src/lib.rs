// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cmd;
pub mod flow;
pub mod ip;

pub use cmd::*;
pub use flow::*;
pub use ip::*;

/// The overall version of the API. Anytime a type shared between the
/// engine and a control-plane process is added, removed, or modified,
/// this number should increment. We attach no semantic meaning to the
/// number other than as a means to verify that two processes sharing
/// a table namespace were compiled for the same API.
pub const API_VERSION: u64 = 3;

/// The hook a frame entered the classifier from.
///
/// The classifier attaches to both directions of a device. A frame is
/// processed exactly once, at exactly one hook.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Hook {
    /// The frame is arriving from the network; this is the reply path
    /// from a backend toward a client.
    Ingress = 1,

    /// The frame is leaving toward the network; this is where client
    /// traffic addressed to the frontend is first seen.
    Egress = 2,
}

impl core::str::FromStr for Hook {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ingress" => Ok(Hook::Ingress),
            "egress" => Ok(Hook::Egress),
            _ => Err(format!("invalid hook: {}", s)),
        }
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hookstr = match self {
            Hook::Ingress => "INGRESS",
            Hook::Egress => "EGRESS",
        };

        write!(f, "{}", hookstr)
    }
}

/// Which packets of a tracked flow have their headers rewritten.
///
/// The redirect state for a flow is recorded once, when the flow is
/// created. Whether packets matching an existing entry are rewritten
/// again is a matter of where the classifier sits relative to the
/// forwarding path, so it is left to configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum RewriteMode {
    /// Rewrite only the packet that creates the flow; packets
    /// matching an existing entry pass through untouched.
    #[default]
    FlowCreate,

    /// Re-apply the recorded rewrite to every matching packet.
    EveryPacket,
}

/// The classifier configuration.
///
/// This is handed to the engine at construction time by whatever
/// loads it; the engine never mutates it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NatCfg {
    /// Clients address the frontend at this TCP port. Only egress
    /// traffic destined to this port is considered for redirection.
    pub frontend_port: u16,

    /// The address written into the source field of redirected
    /// packets, so the backend replies through us.
    pub nat_addr: Ipv4Addr,

    /// The backend registry slot consulted for new flows.
    pub backend_slot: u32,

    /// See [`RewriteMode`].
    pub rewrite_mode: RewriteMode,
}

impl NatCfg {
    pub fn new(frontend_port: u16, nat_addr: Ipv4Addr) -> Self {
        Self {
            frontend_port,
            nat_addr,
            backend_slot: flow::DEFAULT_BACKEND_SLOT,
            rewrite_mode: RewriteMode::default(),
        }
    }
}
