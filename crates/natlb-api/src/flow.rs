// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow tuples and backend targets.
//!
//! These are the key/value layouts shared between the engine and the
//! control plane through the table store. Their `repr(C)` form is the
//! table encoding; nothing else is ever written to a table.

use super::ip::Ipv4Addr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Maximum number of tracked flows, per direction.
pub const FLOW_TABLE_MAX_ENTRIES: u32 = 256;

/// Maximum number of configured backends.
pub const BACKEND_TABLE_MAX_ENTRIES: u32 = 256;

/// The registry slot consulted when none is configured. Slot 0 is
/// left unused so an all-zeroes key can never name a backend.
pub const DEFAULT_BACKEND_SLOT: u32 = 1;

pub const DNAT_TABLE_NAME: &str = "natlb_dnat";
pub const SNAT_TABLE_NAME: &str = "natlb_snat";
pub const BACKEND_TABLE_NAME: &str = "natlb_backends";

/// Paths under which the tables are published in the shared
/// namespace, so a control-plane process can reach tables the engine
/// created (and vice versa).
pub const DNAT_TABLE_PATH: &str = "/natlb/globals/dnat";
pub const SNAT_TABLE_PATH: &str = "/natlb/globals/snat";
pub const BACKEND_TABLE_PATH: &str = "/natlb/globals/backends";

/// One side of a connection: an address and a TCP port.
///
/// Immutable value type; two endpoints are equal iff both fields
/// match exactly. The port is held in host order.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromBytes,
    Hash,
    Immutable,
    IntoBytes,
    KnownLayout,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(C)]
pub struct Endpoint {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// A directional flow tuple.
///
/// A tuple and its [`mirror`] are distinct keys; the flow tables
/// never reverse a key implicitly.
///
/// [`mirror`]: FlowKey::mirror
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromBytes,
    Hash,
    Immutable,
    IntoBytes,
    KnownLayout,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(C)]
pub struct FlowKey {
    pub src: Endpoint,
    pub dst: Endpoint,
}

impl FlowKey {
    pub const fn new(src: Endpoint, dst: Endpoint) -> Self {
        Self { src, dst }
    }

    /// Swap source and destination.
    pub fn mirror(self) -> Self {
        Self { src: self.dst, dst: self.src }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// A configured upstream target.
///
/// Backends are written by the control plane only; the engine reads
/// them when it creates a flow.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromBytes,
    Hash,
    Immutable,
    IntoBytes,
    KnownLayout,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(C)]
pub struct Backend {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Backend {
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
