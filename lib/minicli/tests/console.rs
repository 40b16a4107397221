// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use minicli::{Args, Command, Console, ProcessOutcome};
use pingpong::SlotStorage;

#[derive(Default, Debug, PartialEq)]
struct State {
    led: Option<(u32, bool)>,
    pings: u32,
}

fn set_led(state: &mut State, args: &Args<'_>) {
    let n: u32 = args.get_str(0).unwrap().parse().unwrap();
    let on = args.get_str(1) == Some("on");
    state.led = Some((n, on));
}

fn ping(state: &mut State, args: &Args<'_>) {
    assert!(args.is_empty());
    state.pings += 1;
}

const COMMANDS: &[Command<State>] = &[
    Command {
        pattern: "set led $n $state",
        handler: set_led,
    },
    Command {
        pattern: "ping",
        handler: ping,
    },
];

fn feed_str<const S: usize>(console: &mut Console<'_, S>, s: &str) {
    for &b in s.as_bytes() {
        console.feed(b);
    }
}

#[test]
fn nothing_pending() {
    let mut storage = SlotStorage::<32>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();
    assert_eq!(console.process(COMMANDS, &mut state), None);
}

#[test]
fn dispatches_matched_line() {
    let mut storage = SlotStorage::<32>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();

    feed_str(&mut console, "set led 3 on\n");
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(state.led, Some((3, true)));
    assert_eq!(console.process(COMMANDS, &mut state), None);
}

#[test]
fn dispatches_lines_in_order() {
    let mut storage = SlotStorage::<32>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();

    feed_str(&mut console, "ping\n");
    feed_str(&mut console, "set led 9 off\n");
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(
        state,
        State {
            led: Some((9, false)),
            pings: 1
        }
    );
}

#[test]
fn unknown_line_reports_no_match() {
    let mut storage = SlotStorage::<32>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();

    feed_str(&mut console, "reboot now\n");
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::NoMatch)
    );
    assert_eq!(state, State::default());
}

#[test]
fn overlong_line_is_dropped_whole() {
    let mut storage = SlotStorage::<8>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();

    feed_str(&mut console, "pingpingpingping\n");
    assert_eq!(console.dropped_lines(), 1);
    assert_eq!(console.process(COMMANDS, &mut state), None);

    // The next line is unaffected by the discarded one.
    feed_str(&mut console, "ping\n");
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(state.pings, 1);
}

#[test]
fn backlog_drops_oldest_line() {
    let mut storage = SlotStorage::<32>::new();
    let mut console = Console::new(&mut storage);
    let mut state = State::default();

    // Three lines with no processing in between: two slots hold the two
    // newest, the first is overwritten.
    feed_str(&mut console, "set led 1 on\n");
    feed_str(&mut console, "set led 2 on\n");
    feed_str(&mut console, "ping\n");
    assert_eq!(console.dropped_lines(), 1);

    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(
        console.process(COMMANDS, &mut state),
        Some(ProcessOutcome::Dispatched)
    );
    assert_eq!(console.process(COMMANDS, &mut state), None);
    assert_eq!(
        state,
        State {
            led: Some((2, true)),
            pings: 1
        }
    );
}
