// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffered command console.
//!
//! Glues the [matcher](crate::matcher) to a byte source that delivers one
//! character at a time, typically a UART receive interrupt: bytes are
//! accumulated into a line, completed lines are handed through a
//! double-slot buffer to the foreground, and the foreground matches each
//! line against a command table and dispatches the first hit.
//!
//! The two-slot handoff means the interrupt side never waits: if the
//! foreground falls two whole lines behind, the oldest unprocessed line
//! is overwritten (and counted). Lines longer than a slot are dropped
//! whole rather than truncated into a half-command.

use crate::matcher;
use pingpong::{SlotReader, SlotStorage, SlotWriter};

/// Most parameters one command pattern can capture.
pub const MAX_ARGS: usize = 8;

/// One dispatchable command: a match pattern and its handler.
pub struct Command<C> {
    /// Pattern in [matcher](crate::matcher) syntax, e.g. `"set led $n"`.
    pub pattern: &'static str,
    pub handler: fn(&mut C, &Args<'_>),
}

/// The parameter values captured from a matched command line.
pub struct Args<'a> {
    line: &'a [u8],
    offsets: [usize; MAX_ARGS],
    count: usize,
}

impl<'a> Args<'a> {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The `i`th parameter as raw bytes.
    pub fn get(&self, i: usize) -> Option<&'a [u8]> {
        if i >= self.count {
            return None;
        }
        let start = self.offsets[i];
        let len = matcher::token_len(self.line, start);
        Some(&self.line[start..start + len])
    }

    /// The `i`th parameter as UTF-8, for handlers that go on to parse
    /// numbers or names.
    pub fn get_str(&self, i: usize) -> Option<&'a str> {
        core::str::from_utf8(self.get(i)?).ok()
    }
}

/// What [`Console::process`] did with a pending line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A command matched and its handler ran.
    Dispatched,
    /// No pattern in the table matched the line.
    NoMatch,
}

/// Line assembly plus dispatch, built over caller-provided slot storage.
///
/// `feed` belongs to the byte-source context and `process` to the
/// foreground; the slot buffer between them is what makes that split
/// safe. A `Console` used from a single context works just as well.
pub struct Console<'m, const S: usize> {
    line: heapless::Vec<u8, S>,
    /// Set when the current line no longer fits a slot; the whole line is
    /// discarded at the newline.
    overflowed: bool,
    dropped: u32,
    tx: SlotWriter<'m, S>,
    rx: SlotReader<'m, S>,
}

impl<'m, const S: usize> Console<'m, S> {
    pub fn new(storage: &'m mut SlotStorage<S>) -> Self {
        let (tx, rx) = storage.split();
        Self {
            line: heapless::Vec::new(),
            overflowed: false,
            dropped: 0,
            tx,
            rx,
        }
    }

    /// Accepts one received byte. On `\n` the assembled line is published
    /// for [`Self::process`] to pick up.
    pub fn feed(&mut self, byte: u8) {
        if self.line.push(byte).is_err() {
            self.overflowed = true;
        }
        if byte != b'\n' {
            return;
        }
        if self.overflowed {
            self.dropped = self.dropped.wrapping_add(1);
        } else {
            self.publish();
        }
        self.line.clear();
        self.overflowed = false;
    }

    fn publish(&mut self) {
        match self.tx.acquire() {
            Some(slot) => {
                // Bytes beyond the newline are stale slot content; every
                // consumer stops at the newline.
                slot[..self.line.len()].copy_from_slice(&self.line);
                self.tx.complete();
            }
            None => self.dropped = self.dropped.wrapping_add(1),
        }
    }

    /// Takes one pending line, if any, and dispatches it against
    /// `commands` (first matching pattern wins).
    ///
    /// Returns `None` when no line is pending. Call in a loop to drain.
    pub fn process<C>(
        &mut self,
        commands: &[Command<C>],
        ctx: &mut C,
    ) -> Option<ProcessOutcome> {
        let line = self.rx.acquire()?;
        let mut outcome = ProcessOutcome::NoMatch;
        for cmd in commands {
            let mut offsets = [0usize; MAX_ARGS];
            if let Ok(count) =
                matcher::match_command(cmd.pattern, line, &mut offsets)
            {
                let args = Args {
                    line,
                    offsets,
                    count,
                };
                (cmd.handler)(ctx, &args);
                outcome = ProcessOutcome::Dispatched;
                break;
            }
        }
        self.rx.complete();
        Some(outcome)
    }

    /// Lines lost to overlong input or to the foreground falling behind.
    /// Overwrites inside the slot buffer are counted separately by the
    /// writer and folded in here.
    pub fn dropped_lines(&self) -> u32 {
        self.dropped.wrapping_add(self.tx.overwrites())
    }
}
