// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-hook pipeline.
//!
//! Each frame runs to completion through one invocation of
//! [`Classifier::process`]: parse, classify, consult or create
//! session state, rewrite in place. Invocations on different queues
//! run concurrently with no ordering between them; everything shared
//! sits behind the store.
//!
//! The pipeline sits inline on a live interface, so it never drops:
//! every internal failure (short buffer, foreign traffic, missing
//! backend, store or rewrite trouble) converges on [`Verdict::Pass`]
//! with the frame untouched. Dropping on a parsing bug would be a far
//! worse failure than forwarding unmodified.

use super::nat::BackendRegistry;
use super::nat::SessionMap;
use super::parse::ClassifyErr;
use super::parse::PacketInfo;
use super::parse::parse_frame;
use super::rewrite::AddrField;
use super::rewrite::RewriteError;
use super::rewrite::rewrite_addr;
use crate::store::StoreError;
use crate::store::TableStore;
use core::fmt;
use core::fmt::Display;
use core::hash::Hash;
use natlb_api::Endpoint;
use natlb_api::FlowKey;
use natlb_api::Hook;
use natlb_api::NatCfg;
use natlb_api::RewriteMode;

/// The fate of one frame.
///
/// `Drop` exists because the hook's action vocabulary has it, but no
/// path in this pipeline produces it; failing open is the point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Forward the frame unmodified.
    Pass,

    /// Forward the frame; its headers were rewritten in place.
    Modified,

    /// Discard the frame.
    Drop,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Drop => write!(f, "DROP"),
        }
    }
}

/// Internal failure on the redirect path. Never escapes
/// [`Classifier::process`]; it exists so the fail-open conversion
/// happens in exactly one place.
#[derive(Clone, Debug)]
enum ProcessError {
    Store(StoreError),
    Rewrite(RewriteError),
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {}", e),
            Self::Rewrite(e) => write!(f, "rewrite: {}", e),
        }
    }
}

impl From<StoreError> for ProcessError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RewriteError> for ProcessError {
    fn from(e: RewriteError) -> Self {
        Self::Rewrite(e)
    }
}

/// A stable hash of the flow tuple, handed to backend selection.
fn flow_hint(flow: &FlowKey) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    flow.hash(&mut hasher);
    hasher.finalize()
}

/// The classifier: one per attachment, both hooks.
pub struct Classifier<S: TableStore> {
    cfg: NatCfg,
    sessions: SessionMap<S>,
    backends: BackendRegistry<S>,
}

impl<S: TableStore + Clone> Classifier<S> {
    /// Attach a classifier to `store`.
    ///
    /// The store is injected rather than ambient so the pipeline can
    /// run against anything satisfying [`TableStore`], an in-memory
    /// fake included.
    pub fn new(cfg: NatCfg, store: &S) -> Result<Self, StoreError> {
        Ok(Self {
            cfg,
            sessions: SessionMap::attach(store)?,
            backends: BackendRegistry::attach(store)?,
        })
    }

    pub fn cfg(&self) -> &NatCfg {
        &self.cfg
    }

    pub fn sessions(&self) -> &SessionMap<S> {
        &self.sessions
    }

    pub fn backends(&self) -> &BackendRegistry<S> {
        &self.backends
    }

    /// Process one frame at one hook.
    ///
    /// This is the whole contract: a verdict comes back and the frame
    /// is either untouched or completely rewritten. Diagnostic detail
    /// goes to the trace log, never into the verdict.
    pub fn process(&self, hook: Hook, frame: &mut [u8]) -> Verdict {
        let info = match parse_frame(frame) {
            Ok(info) => info,
            Err(ClassifyErr::NotApplicable) => return Verdict::Pass,
            Err(e) => {
                super::dbg!("{} frame ignored: {}", hook, e);
                return Verdict::Pass;
            }
        };

        let res = match hook {
            Hook::Egress => self.egress(&info, frame),
            Hook::Ingress => self.ingress(&info, frame),
        };

        match res {
            Ok(verdict) => verdict,
            Err(e) => {
                super::err!("{} {} fail open: {}", hook, info.flow, e);
                Verdict::Pass
            }
        }
    }

    /// The client-facing direction: track and redirect flows
    /// addressed to the frontend.
    fn egress(
        &self,
        info: &PacketInfo,
        frame: &mut [u8],
    ) -> Result<Verdict, ProcessError> {
        let flow = info.flow;

        if flow.dst.port != self.cfg.frontend_port {
            return Ok(Verdict::Pass);
        }

        if let Some(rewritten) = self.sessions.lookup_forward(&flow)? {
            return match self.cfg.rewrite_mode {
                // The flow was rewritten when it was created; later
                // packets of the flow are already tracked.
                RewriteMode::FlowCreate => Ok(Verdict::Pass),
                RewriteMode::EveryPacket => {
                    self.redirect(frame, &flow, &rewritten)?;
                    Ok(Verdict::Modified)
                }
            };
        }

        let hint = flow_hint(&flow);
        let Some(backend) =
            self.backends.select(self.cfg.backend_slot, hint)?
        else {
            super::dbg!("no backend for {} (slot {})", flow, self.cfg.backend_slot);
            return Ok(Verdict::Pass);
        };

        // Keep the client's port; swap in the NAT source address and
        // the backend as destination.
        let rewritten = FlowKey::new(
            Endpoint::new(self.cfg.nat_addr, flow.src.port),
            Endpoint::new(backend.addr, backend.port),
        );

        self.sessions.insert_pair(flow, rewritten)?;
        self.redirect(frame, &flow, &rewritten)?;

        super::dbg!("new flow {} => {} ({:?})", flow, rewritten, info.flags);
        Ok(Verdict::Modified)
    }

    /// The return path: restore tracked replies so the client sees
    /// the frontend answering.
    fn ingress(
        &self,
        info: &PacketInfo,
        frame: &mut [u8],
    ) -> Result<Verdict, ProcessError> {
        let flow = info.flow;

        let Some(restored) = self.sessions.lookup_reverse(&flow)? else {
            // Not ours; leave it alone.
            return Ok(Verdict::Pass);
        };

        rewrite_addr(
            frame,
            AddrField::Source,
            flow.src.addr,
            restored.src.addr,
        )?;
        rewrite_addr(
            frame,
            AddrField::Destination,
            flow.dst.addr,
            restored.dst.addr,
        )?;

        Ok(Verdict::Modified)
    }

    /// Apply the recorded rewrite to a frame holding `flow`.
    fn redirect(
        &self,
        frame: &mut [u8],
        flow: &FlowKey,
        rewritten: &FlowKey,
    ) -> Result<(), ProcessError> {
        rewrite_addr(
            frame,
            AddrField::Destination,
            flow.dst.addr,
            rewritten.dst.addr,
        )?;
        rewrite_addr(
            frame,
            AddrField::Source,
            flow.src.addr,
            rewritten.src.addr,
        )?;
        Ok(())
    }
}
