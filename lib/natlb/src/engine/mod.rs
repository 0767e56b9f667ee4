// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-packet engine.
//!
//! Data flows strictly downward: parse the headers, classify the
//! flow, consult or create session state, rewrite in place. No module
//! here calls back up into the classifier.

pub mod checksum;
pub mod classifier;
pub mod ether;
pub mod ip4;
pub mod nat;
pub mod packet;
pub mod parse;
pub mod rewrite;
pub mod tcp;

pub use natlb_api::Hook;

use core::sync::atomic::AtomicBool;

/// When set, the packet path emits per-packet debug traces.
pub static DEBUG: AtomicBool = AtomicBool::new(false);

/// Debug trace for the packet path.
///
/// Diagnostic detail never travels with the verdict; these lines are
/// the only place a fail-open reason is observable.
#[macro_export]
macro_rules! dbg_macro {
    ($s:tt) => {
        if $crate::engine::DEBUG.load(::core::sync::atomic::Ordering::Relaxed) {
            println!($s);
        }
    };
    ($s:tt, $($arg:tt)*) => {
        if $crate::engine::DEBUG.load(::core::sync::atomic::Ordering::Relaxed) {
            println!($s, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! err_macro {
    ($s:tt) => {
        println!(concat!("ERROR: ", $s));
    };
    ($s:tt, $($arg:tt)*) => {
        println!(concat!("ERROR: ", $s), $($arg)*);
    };
}

pub use dbg_macro as dbg;
pub use err_macro as err;
