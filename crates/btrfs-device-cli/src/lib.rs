// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! btrfs member device administration
//!
//! Each verb resolves one handle (a mounted filesystem or the control
//! device), then issues one request per device. Per-device failures are
//! collected in a [`report::Report`]; only errors that make the whole
//! invocation meaningless abort it early.

pub mod cli;
pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod flows;
pub mod prepare;
pub mod probe;
pub mod report;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use clap::Parser;
