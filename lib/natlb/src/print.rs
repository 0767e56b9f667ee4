// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print dump responses in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both operator tooling and integration tests.

use natlb_api::DumpBackendsResp;
use natlb_api::DumpSessionsResp;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`DumpSessionsResp`].
pub fn print_sessions(resp: &DumpSessionsResp) -> std::io::Result<()> {
    print_sessions_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpSessionsResp`] into a given writer.
pub fn print_sessions_into(
    writer: &mut impl Write,
    resp: &DumpSessionsResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Sessions: {}", resp.entries.len())?;
    writeln!(t, "CLIENT\tFRONTEND\tNAT SRC\tBACKEND")?;
    for entry in &resp.entries {
        writeln!(
            t,
            "{}\t{}\t{}\t{}",
            entry.orig.src,
            entry.orig.dst,
            entry.rewritten.src,
            entry.rewritten.dst,
        )?;
    }

    t.flush()
}

/// Print a [`DumpBackendsResp`].
pub fn print_backends(resp: &DumpBackendsResp) -> std::io::Result<()> {
    print_backends_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpBackendsResp`] into a given writer.
pub fn print_backends_into(
    writer: &mut impl Write,
    resp: &DumpBackendsResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "SLOT\tBACKEND")?;
    for entry in &resp.backends {
        writeln!(t, "{}\t{}", entry.slot, entry.backend)?;
    }

    t.flush()
}
