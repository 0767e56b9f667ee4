// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A minimal stateful NAT load balancer.
//!
//! The engine inspects TCP/IPv4 frames traversing a device, tracks
//! flows addressed to a configured frontend, and rewrites them in
//! place so traffic is transparently redirected to a backend and the
//! reply path restored to the client. It sits inline on a live
//! forwarding path, so it fails open: on any error a frame passes
//! unmodified, never dropped.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub use natlb_api as api;

pub mod engine;
pub mod print;
pub mod store;
