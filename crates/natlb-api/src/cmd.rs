// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Dump responses handed to operator tooling.
//!
//! The engine side fills these in by walking its tables; the wire
//! form is postcard, same as everything else crossing the
//! engine/control-plane boundary.

use super::flow::Backend;
use super::flow::FlowKey;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// One tracked session: the tuple as the client sent it and the
/// tuple it is rewritten to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionEntry {
    pub orig: FlowKey,
    pub rewritten: FlowKey,
}

/// The forward half of the session state.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DumpSessionsResp {
    pub entries: Vec<SessionEntry>,
}

/// One registry slot.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BackendEntry {
    pub slot: u32,
    pub backend: Backend,
}

/// The configured backend registry.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DumpBackendsResp {
    pub backends: Vec<BackendEntry>,
}

impl DumpSessionsResp {
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

impl DumpBackendsResp {
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
