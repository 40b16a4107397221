// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pattern-to-command token matching.
//!
//! A pattern is a whitespace-separated list of tokens. A token starting
//! with `$` is a parameter: it matches any non-empty run of non-space
//! bytes in the command, and the text after the `$` is a human-readable
//! label the matcher ignores (`$index` and a bare `$` behave the same).
//! Every other token is a key and must match the command token
//! byte-for-byte.
//!
//! Commands end at `\n` (or the end of the buffer); patterns end at NUL
//! or the end of the string. Matching reports the byte offset of each
//! parameter inside the command, so the caller can slice the values out
//! without any copying.

/// Why a command failed to match a pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchError {
    /// Token counts differ or a key token doesn't match. Try the next
    /// pattern.
    Mismatch,
    /// More parameters in the pattern than the caller's offset store can
    /// hold.
    TooManyParams,
    /// The pattern itself is malformed: a `$` appears mid-token, fusing
    /// two parameters with no key between them. Fix the pattern.
    BadPattern,
}

/// True for bytes that end a command or a token within it.
fn cmd_end(b: u8) -> bool {
    b == b'\n' || b == 0
}

/// Iterates `(start_offset, token)` over a byte string, splitting on
/// spaces and stopping at the terminator.
fn tokens(
    s: &[u8],
    is_end: fn(u8) -> bool,
) -> impl Iterator<Item = (usize, &[u8])> + '_ {
    let mut i = 0;
    core::iter::from_fn(move || {
        while i < s.len() && s[i] == b' ' {
            i += 1;
        }
        if i >= s.len() || is_end(s[i]) {
            return None;
        }
        let start = i;
        while i < s.len() && s[i] != b' ' && !is_end(s[i]) {
            i += 1;
        }
        Some((start, &s[start..i]))
    })
}

/// Length of the command token starting at `start`.
pub(crate) fn token_len(cmd: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < cmd.len() && cmd[end] != b' ' && !cmd_end(cmd[end]) {
        end += 1;
    }
    end - start
}

/// Matches `cmd` against `pattern`, recording the start offset of each
/// parameter token into `offsets`. Returns the number of parameters
/// captured.
///
/// The command buffer is not modified; see [`match_command_trunc`] for
/// the destructive variant.
pub fn match_command(
    pattern: &str,
    cmd: &[u8],
    offsets: &mut [usize],
) -> Result<usize, MatchError> {
    let mut ptoks = tokens(pattern.as_bytes(), |b| b == 0);
    let mut ctoks = tokens(cmd, cmd_end);
    let mut count = 0;

    loop {
        match (ptoks.next(), ctoks.next()) {
            (None, None) => return Ok(count),
            (Some((_, ptok)), Some((cstart, ctok))) => {
                if ptok[0] == b'$' {
                    if ptok[1..].contains(&b'$') {
                        return Err(MatchError::BadPattern);
                    }
                    if count == offsets.len() {
                        return Err(MatchError::TooManyParams);
                    }
                    offsets[count] = cstart;
                    count += 1;
                } else if ptok != ctok {
                    return Err(MatchError::Mismatch);
                }
            }
            // One side ran out of tokens before the other.
            _ => return Err(MatchError::Mismatch),
        }
    }
}

/// Destructive variant of [`match_command`]: additionally overwrites the
/// byte terminating each parameter token with NUL, so every recorded
/// offset addresses a NUL-terminated byte string.
///
/// Requires each parameter token to be followed by a terminator byte
/// inside the buffer; a parameter running to the very end of the slice is
/// reported as a mismatch. On failure the buffer may already be partially
/// truncated.
pub fn match_command_trunc(
    pattern: &str,
    cmd: &mut [u8],
    offsets: &mut [usize],
) -> Result<usize, MatchError> {
    let count = match_command(pattern, cmd, offsets)?;
    for &start in &offsets[..count] {
        let end = start + token_len(cmd, start);
        if end == cmd.len() {
            return Err(MatchError::Mismatch);
        }
        cmd[end] = 0;
    }
    Ok(count)
}
