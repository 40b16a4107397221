// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tiny command-line front end for serial consoles.
//!
//! Two layers, usable separately:
//!
//! - [`matcher`]: stateless matching of one command line against one
//!   pattern like `"set led $n on"`, reporting where the parameter values
//!   sit in the line.
//! - [`console`]: line assembly from a byte-at-a-time source (UART
//!   interrupt, decoded frame payloads, a pipe in tests) plus dispatch of
//!   completed lines against a command table, with a two-slot buffer
//!   decoupling the two sides.
//!
//! Lines are ASCII, terminated by `\n` alone.

#![cfg_attr(not(test), no_std)]

pub mod console;
pub mod matcher;

pub use console::{Args, Command, Console, ProcessOutcome, MAX_ARGS};
pub use matcher::{match_command, match_command_trunc, MatchError};
