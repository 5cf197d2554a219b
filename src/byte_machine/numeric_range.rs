//! Numeric (and CIDR) range compilation (spec §4.1 "Numeric range
//! compilation"). Both endpoints arrive as equal-length strings over the
//! hex digit alphabet `0-9A-F` (spec §6's canonical bytes — the fixed-width
//! encodings produced by `comparable_number`/`ip_encode` share that
//! alphabet, which is why this module generalizes the prose's "decimal
//! digit" walk to hex: the `'9'`/`'0'` edge cases the prose describes
//! become `MAX_DIGIT`/`b'0'`).

use super::graph::Graph;
use super::state::{ByteMatch, ByteTransition};
use crate::pattern::MAX_DIGIT;
use crate::state_id::{ByteStateId, NameStateId};

fn digit_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'A'..=b'F' => b - b'A' + 10,
        _ => unreachable!("numeric range digit outside the canonical hex alphabet"),
    }
}

fn digit_byte(v: u8) -> u8 {
    match v {
        0..=9 => b'0' + v,
        10..=15 => b'A' + (v - 10),
        _ => unreachable!("digit value out of range"),
    }
}

/// Install `bottom < x < top` (open/closed per the flags) starting at
/// `start`, all matches sharing one fresh `next_name_state` (spec
/// invariant: "Return a single NameState shared by all matches installed
/// by this range").
/// Match edge locations installed by one `compile` call, recorded so
/// `ByteMachine::delete_pattern` can find and remove them precisely.
pub(crate) type MatchEdges = Vec<(ByteStateId, u8)>;

pub(crate) fn compile(
    graph: &mut Graph,
    start: ByteStateId,
    bottom: &[u8],
    top: &[u8],
    open_bottom: bool,
    open_top: bool,
    is_cidr: bool,
    next_name_state: NameStateId,
) -> MatchEdges {
    assert_eq!(bottom.len(), top.len(), "range endpoints must be equal length");
    let len = bottom.len();
    if len == 0 {
        return Vec::new();
    }

    let sink = graph.alloc(); // dead end: matches terminate here, nothing reads its transitions
    let mut edges: MatchEdges = Vec::new();

    let pattern = crate::pattern::Pattern::NumericRange {
        bottom: bottom.to_vec(),
        top: top.to_vec(),
        open_bottom,
        open_top,
        is_cidr,
    };
    let mut install_match = |graph: &mut Graph, edges: &mut MatchEdges, at: ByteStateId, byte: u8| {
        let m = ByteMatch::new(pattern.clone(), next_name_state);
        graph.push_transition(
            at,
            byte,
            ByteTransition::Composite {
                next: sink,
                terminal: m,
            },
        );
        edges.push((at, byte));
    };

    // 1. walk the shared prefix
    let mut cur = start;
    let mut fork = len;
    for i in 0..len {
        if bottom[i] != top[i] {
            fork = i;
            break;
        }
        let next = graph.alloc();
        graph.push_transition(cur, bottom[i], ByteTransition::SingleNextState(next));
        cur = next;
    }
    if fork == len {
        // bottom == top: only meaningful as a closed-closed range, degrades
        // to a single point. Handled by the caller (NumericEq covers the
        // common case); still correct here.
        if !open_bottom && !open_top {
            install_match(graph, &mut edges, cur, bottom[len - 1]);
        }
        return edges;
    }

    // 2. fork byte: every digit strictly between bottom[fork] and top[fork]
    // lands in the interval unconditionally.
    let (lo, hi) = (digit_value(bottom[fork]), digit_value(top[fork]));
    for v in (lo + 1)..hi {
        install_match(graph, &mut edges, cur, digit_byte(v));
    }

    // 3. bottom branch: continues matching bottom exactly; a digit greater
    // than bottom[j] at any later position guarantees membership.
    let mut bcur = graph.alloc();
    graph.push_transition(cur, bottom[fork], ByteTransition::SingleNextState(bcur));
    for j in (fork + 1)..len {
        let is_last = j == len - 1;
        let d = digit_value(bottom[j]);
        if d < digit_value(MAX_DIGIT) {
            for v in (d + 1)..=digit_value(MAX_DIGIT) {
                install_match(graph, &mut edges, bcur, digit_byte(v));
            }
        }
        if is_last {
            if !open_bottom {
                install_match(graph, &mut edges, bcur, bottom[j]);
            }
        } else {
            let next = graph.alloc();
            graph.push_transition(bcur, bottom[j], ByteTransition::SingleNextState(next));
            bcur = next;
        }
    }

    // 4. top branch: mirrors the bottom branch with '0' and less-than.
    let mut tcur = graph.alloc();
    graph.push_transition(cur, top[fork], ByteTransition::SingleNextState(tcur));
    for j in (fork + 1)..len {
        let is_last = j == len - 1;
        let d = digit_value(top[j]);
        if d > 0 {
            for v in 0..d {
                install_match(graph, &mut edges, tcur, digit_byte(v));
            }
        }
        if is_last {
            if !open_top {
                install_match(graph, &mut edges, tcur, top[j]);
            }
        } else {
            let next = graph.alloc();
            graph.push_transition(tcur, top[j], ByteTransition::SingleNextState(next));
            tcur = next;
        }
    }

    edges
}
