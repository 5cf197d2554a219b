//! `ByteMachine`: the value tier (spec §3/§4.1). One instance exists per
//! `(NameState, key)` pair; it owns a private byte-level NFA over the
//! bytes of whatever value arrives for that key.

mod graph;
mod numeric_range;
mod state;

use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use dashmap::{DashMap, DashSet};

use crate::comparable_number;
use crate::ip_encode;
use crate::pattern::{Pattern, EXISTS_MARKER};
use crate::state_id::{ByteStateId, NameStateId};

use graph::Graph;
use state::{ByteMatch, ByteState, ByteTransition};

/// Bookkeeping kept per installed pattern so `delete_pattern` can find and
/// remove exactly the edges it installed, without disturbing edges shared
/// with other patterns (spec §4.1 "Delete algorithm").
#[derive(Clone, Debug)]
struct PatternEntry {
    next_name_state: NameStateId,
    match_edges: Vec<(ByteStateId, u8)>,
    /// Set instead of `match_edges` for the two epsilon-installed wildcard
    /// shapes (bare `*`, trailing `*`): the state whose `epsilon_match` to
    /// clear.
    epsilon_at: Option<ByteStateId>,
}

pub(crate) struct ByteMachine {
    states: ArcSwap<Vec<ByteState>>,
    has_numeric: AtomicUsize,
    has_ip: AtomicUsize,
    has_suffix: AtomicUsize,
    has_equals_ignore_case: AtomicUsize,
    /// Next-states reached via an `AnythingBut*` pattern, tracked by
    /// identity of the next `NameState` (see DESIGN.md's Open Question
    /// decision on anything-but failure tracking granularity).
    anything_buts: DashSet<NameStateId>,
    /// The representative pattern to pair with an anything-but next-state
    /// when it survives into the result set (ACFinder needs a `Pattern` to
    /// look up sub-rule ids by).
    anything_but_patterns: DashMap<NameStateId, Pattern>,
    patterns: DashMap<Pattern, PatternEntry>,
}

impl Default for ByteMachine {
    fn default() -> Self {
        ByteMachine {
            states: ArcSwap::new(std::sync::Arc::new(vec![ByteState::default()])),
            has_numeric: AtomicUsize::new(0),
            has_ip: AtomicUsize::new(0),
            has_suffix: AtomicUsize::new(0),
            has_equals_ignore_case: AtomicUsize::new(0),
            anything_buts: DashSet::new(),
            anything_but_patterns: DashMap::new(),
            patterns: DashMap::new(),
        }
    }
}

const START: ByteStateId = ByteStateId(0);

/// Advance from `state` on `byte`, creating a plain state if nothing is
/// there yet, or materializing ("extending") a `Shortcut` into real
/// intermediate states if that's what's blocking continuation — spec
/// §4.1/§9 "Shortcut transition... extends the shortcut back into full
/// byte-by-byte states before inserting the new pattern."
///
/// Next-state reuse rule (spec §4.1 "critical correctness"): a state is
/// only reused once we know a second distinct path reaches it — that's
/// `indeterminate_prefix`, set the first time this function hands the
/// state out again. Reuse is refused for the one interference case this
/// machine can actually produce: a state that already carries a wildcard
/// self-loop (`all_bytes`) must never be reused a second time, since a
/// second caller would be handed the first caller's self-loop rather than
/// a clean continuation of its own.
fn ensure_advance(graph: &mut Graph, state: ByteStateId, byte: u8) -> ByteStateId {
    let mut reuse: Option<ByteStateId> = None;
    for t in graph.transitions_on(state, byte) {
        match t {
            ByteTransition::SingleNextState(next) => {
                reuse = Some(*next);
                break;
            }
            ByteTransition::Composite { next, .. } => {
                reuse = Some(*next);
                break;
            }
            ByteTransition::Shortcut { .. } => {}
        }
    }
    if let Some(next) = reuse {
        let interferes = graph.get(next).indeterminate_prefix && graph.get(next).all_bytes.is_some();
        if !interferes {
            graph.get_mut(next).indeterminate_prefix = true;
            return next;
        }
    }
    // No plain advance available (or reuse was refused above). If a
    // shortcut occupies this edge, extend it.
    let shortcut = graph.transitions_on(state, byte).iter().find_map(|t| match t {
        ByteTransition::Shortcut { remaining, terminal } => Some((remaining.clone(), terminal.clone())),
        _ => None,
    });
    if let Some((remaining, terminal)) = shortcut {
        let first = graph.alloc();
        let mut cur = first;
        if remaining.is_empty() {
            // Degenerate shortcut (matched exactly at this byte): the
            // extension is a state carrying the same match instance as an
            // epsilon match, preserving `ByteMatch` identity.
            graph.get_mut(first).epsilon_match = Some(terminal);
        } else {
            for (i, &b) in remaining.iter().enumerate() {
                if i == remaining.len() - 1 {
                    let sink = graph.alloc();
                    graph.push_transition(
                        cur,
                        b,
                        ByteTransition::Composite {
                            next: sink,
                            terminal: terminal.clone(),
                        },
                    );
                } else {
                    let next = graph.alloc();
                    graph.push_transition(cur, b, ByteTransition::SingleNextState(next));
                    cur = next;
                }
            }
        }
        // Replace the old shortcut entry with a plain advance into `first`.
        let entry = graph.get_mut(state).trans.entry(byte);
        entry.retain(|t| !matches!(t, ByteTransition::Shortcut { .. }));
        graph.get_mut(state).trans.entry(byte).push(ByteTransition::SingleNextState(first));
        return first;
    }
    let next = graph.alloc();
    graph.push_transition(state, byte, ByteTransition::SingleNextState(next));
    next
}

/// Walk `bytes` from `state`, creating/reusing states as needed, returning
/// the final state reached (used for non-terminal literal prefixes: the
/// common path shared by `Prefix`, the literal segments of `Wildcard`, and
/// the all-but-last bytes of every other variant).
fn walk_literal(graph: &mut Graph, mut state: ByteStateId, bytes: &[u8]) -> ByteStateId {
    for &b in bytes {
        state = ensure_advance(graph, state, b);
    }
    state
}

fn install_terminal_shortcut_or_composite(
    graph: &mut Graph,
    state: ByteStateId,
    byte: u8,
    pattern: Pattern,
    next_name_state: NameStateId,
) -> ByteStateId {
    let existing_empty = graph.transitions_on(state, byte).is_empty();
    let m = ByteMatch::new(pattern, next_name_state);
    if existing_empty {
        graph.push_transition(state, byte, ByteTransition::Shortcut { remaining: Vec::new(), terminal: m });
    } else {
        let next = ensure_advance(graph, state, byte);
        graph.push_transition(state, byte, ByteTransition::Composite { next, terminal: m });
    }
    state
}

fn install_terminal_composite_sink(
    graph: &mut Graph,
    state: ByteStateId,
    byte: u8,
    pattern: Pattern,
    next_name_state: NameStateId,
) {
    let sink = graph.alloc();
    let m = ByteMatch::new(pattern, next_name_state);
    graph.push_transition(state, byte, ByteTransition::Composite { next: sink, terminal: m });
}

fn install_terminal_composite_live(
    graph: &mut Graph,
    state: ByteStateId,
    byte: u8,
    pattern: Pattern,
    next_name_state: NameStateId,
) {
    let next = ensure_advance(graph, state, byte);
    let m = ByteMatch::new(pattern, next_name_state);
    graph.push_transition(state, byte, ByteTransition::Composite { next, terminal: m });
}

impl ByteMachine {
    pub(crate) fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// spec §4.1 "add_pattern": returns the existing next-state for a
    /// structurally-equal pattern, otherwise allocates one via `alloc_next`
    /// and builds the sub-chain.
    pub(crate) fn add_pattern(&self, pattern: Pattern, alloc_next: impl FnOnce() -> NameStateId) -> NameStateId {
        if let Some(entry) = self.patterns.get(&pattern) {
            return entry.next_name_state;
        }
        let next_name_state = alloc_next();
        let mut graph = Graph::from_published(&self.states.load());
        let entry = self.build(&mut graph, &pattern, next_name_state);
        self.states.store(std::sync::Arc::new(graph.states));
        self.patterns.insert(pattern, entry);
        next_name_state
    }

    pub(crate) fn find_pattern(&self, pattern: &Pattern) -> Option<NameStateId> {
        self.patterns.get(pattern).map(|e| e.next_name_state)
    }

    /// spec §4.1 "Delete algorithm": removes the match edges this pattern
    /// installed. Shared literal-prefix states are left allocated but
    /// become unreachable from any terminal match, which cannot produce a
    /// false match later (see DESIGN.md: pruning is scoped down to match
    /// removal, full leaf-to-root state reclamation is not implemented).
    pub(crate) fn delete_pattern(&self, pattern: &Pattern) {
        let Some((_, entry)) = self.patterns.remove(pattern) else {
            return;
        };
        let mut graph = Graph::from_published(&self.states.load());
        for (state, byte) in &entry.match_edges {
            let edges = graph.get_mut(*state).trans.entry(*byte);
            edges.retain(|t| match t {
                ByteTransition::Composite { terminal, .. } | ByteTransition::Shortcut { terminal, .. } => {
                    !(terminal.pattern == *pattern)
                }
                ByteTransition::SingleNextState(_) => true,
            });
            graph.get_mut(*state).trans.clear_byte(*byte);
        }
        if let Some(state) = entry.epsilon_at {
            let s = graph.get_mut(state);
            if s.epsilon_match.as_ref().map(|m| m.pattern == *pattern).unwrap_or(false) {
                s.epsilon_match = None;
            }
        }
        if pattern.is_numeric() || pattern.is_ip() {
            // counters only ever gate optional scans (§9); leaving them
            // slightly stale after a delete is explicitly tolerated.
        }
        self.states.store(std::sync::Arc::new(graph.states));
        self.anything_buts.remove(&entry.next_name_state);
        self.anything_but_patterns.remove(&entry.next_name_state);
    }

    fn build(&self, graph: &mut Graph, pattern: &Pattern, next: NameStateId) -> PatternEntry {
        match pattern {
            Pattern::Exact(bytes) => self.build_shortcut_eligible(graph, bytes, pattern.clone(), next),
            Pattern::EqualsIgnoreCase(bytes) => {
                self.has_equals_ignore_case.fetch_add(1, Ordering::Relaxed);
                self.build_shortcut_eligible(graph, bytes, pattern.clone(), next)
            }
            Pattern::Suffix(reversed_bytes) => {
                self.has_suffix.fetch_add(1, Ordering::Relaxed);
                self.build_composite_sink(graph, reversed_bytes, pattern.clone(), next)
            }
            Pattern::Prefix(bytes) => self.build_composite_live(graph, bytes, pattern.clone(), next),
            Pattern::NumericEq(bytes) => {
                self.has_numeric.fetch_add(1, Ordering::Relaxed);
                self.build_composite_sink(graph, bytes, pattern.clone(), next)
            }
            Pattern::NumericRange { bottom, top, open_bottom, open_top, is_cidr } => {
                if *is_cidr {
                    self.has_ip.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.has_numeric.fetch_add(1, Ordering::Relaxed);
                }
                let edges = numeric_range::compile(graph, START, bottom, top, *open_bottom, *open_top, *is_cidr, next);
                PatternEntry { next_name_state: next, match_edges: edges, epsilon_at: None }
            }
            Pattern::AnythingBut { values, numeric } => {
                self.anything_buts.insert(next);
                self.anything_but_patterns.insert(next, pattern.clone());
                if *numeric {
                    self.has_numeric.fetch_add(1, Ordering::Relaxed);
                }
                let mut edges = Vec::new();
                for v in values {
                    let state = walk_literal(graph, START, &v[..v.len().saturating_sub(1)]);
                    if let Some(&last) = v.last() {
                        install_terminal_composite_sink(graph, state, last, pattern.clone(), next);
                        edges.push((state, last));
                    }
                }
                PatternEntry { next_name_state: next, match_edges: edges, epsilon_at: None }
            }
            Pattern::AnythingButPrefix(bytes) => {
                self.anything_buts.insert(next);
                self.anything_but_patterns.insert(next, pattern.clone());
                self.build_composite_live(graph, bytes, pattern.clone(), next)
            }
            Pattern::AnythingButSuffix(reversed_bytes) => {
                self.anything_buts.insert(next);
                self.anything_but_patterns.insert(next, pattern.clone());
                self.has_suffix.fetch_add(1, Ordering::Relaxed);
                self.build_composite_sink(graph, reversed_bytes, pattern.clone(), next)
            }
            Pattern::AnythingButIgnoreCase(values) => {
                self.anything_buts.insert(next);
                self.anything_but_patterns.insert(next, pattern.clone());
                self.has_equals_ignore_case.fetch_add(1, Ordering::Relaxed);
                let mut edges = Vec::new();
                for v in values {
                    let state = walk_literal(graph, START, &v[..v.len().saturating_sub(1)]);
                    if let Some(&last) = v.last() {
                        install_terminal_composite_sink(graph, state, last, pattern.clone(), next);
                        edges.push((state, last));
                    }
                }
                PatternEntry { next_name_state: next, match_edges: edges, epsilon_at: None }
            }
            Pattern::Exists => {
                let state = walk_literal(graph, START, &EXISTS_MARKER[..EXISTS_MARKER.len() - 1]);
                let last = EXISTS_MARKER[EXISTS_MARKER.len() - 1];
                install_terminal_composite_sink(graph, state, last, pattern.clone(), next);
                PatternEntry { next_name_state: next, match_edges: vec![(state, last)], epsilon_at: None }
            }
            Pattern::Wildcard(bytes) => self.build_wildcard(graph, bytes, pattern.clone(), next),
            Pattern::Absent => unreachable!("Absent is never installed into a ByteMachine (NameState routes it)"),
        }
    }

    /// spec §4.1/§9 Shortcut optimization: walk the literal prefix only as
    /// far as it stays shared with an already-installed pattern. The first
    /// byte that diverges from everything else in the machine is where this
    /// pattern becomes the only thing using this path, so everything after
    /// it is recorded wholesale in one `Shortcut` edge instead of one
    /// allocated `ByteState` per byte.
    fn build_shortcut_eligible(&self, graph: &mut Graph, bytes: &[u8], pattern: Pattern, next: NameStateId) -> PatternEntry {
        if bytes.is_empty() {
            // degenerate empty-string exact match: epsilon on the start state
            let m = ByteMatch::new(pattern, next);
            graph.get_mut(START).epsilon_match = Some(m);
            return PatternEntry { next_name_state: next, match_edges: Vec::new(), epsilon_at: Some(START) };
        }
        let prefix = &bytes[..bytes.len() - 1];
        let mut state = START;
        let mut shared = 0;
        for &b in prefix {
            if graph.transitions_on(state, b).is_empty() {
                break;
            }
            state = ensure_advance(graph, state, b);
            shared += 1;
        }
        if shared == prefix.len() {
            // The whole prefix is shared; only the terminal byte is new,
            // exactly as if there were nothing left to elide.
            let last = bytes[bytes.len() - 1];
            install_terminal_shortcut_or_composite(graph, state, last, pattern, next);
            PatternEntry { next_name_state: next, match_edges: vec![(state, last)], epsilon_at: None }
        } else {
            // `byte` is the first state nothing else reaches through;
            // everything from here to the end of the pattern belongs to
            // this match alone and is compared wholesale on read.
            let byte = prefix[shared];
            let remaining = bytes[shared + 1..].to_vec();
            let m = ByteMatch::new(pattern, next);
            graph.push_transition(state, byte, ByteTransition::Shortcut { remaining, terminal: m });
            PatternEntry { next_name_state: next, match_edges: vec![(state, byte)], epsilon_at: None }
        }
    }

    fn build_composite_sink(&self, graph: &mut Graph, bytes: &[u8], pattern: Pattern, next: NameStateId) -> PatternEntry {
        if bytes.is_empty() {
            let m = ByteMatch::new(pattern, next);
            graph.get_mut(START).epsilon_match = Some(m);
            return PatternEntry { next_name_state: next, match_edges: Vec::new(), epsilon_at: Some(START) };
        }
        let state = walk_literal(graph, START, &bytes[..bytes.len() - 1]);
        let last = bytes[bytes.len() - 1];
        install_terminal_composite_sink(graph, state, last, pattern, next);
        PatternEntry { next_name_state: next, match_edges: vec![(state, last)], epsilon_at: None }
    }

    fn build_composite_live(&self, graph: &mut Graph, bytes: &[u8], pattern: Pattern, next: NameStateId) -> PatternEntry {
        if bytes.is_empty() {
            let m = ByteMatch::new(pattern, next);
            graph.get_mut(START).epsilon_match = Some(m);
            return PatternEntry { next_name_state: next, match_edges: Vec::new(), epsilon_at: Some(START) };
        }
        let state = walk_literal(graph, START, &bytes[..bytes.len() - 1]);
        let last = bytes[bytes.len() - 1];
        install_terminal_composite_live(graph, state, last, pattern, next);
        PatternEntry { next_name_state: next, match_edges: vec![(state, last)], epsilon_at: None }
    }

    /// spec §4.1 "Wildcard handling": bare `*` is an epsilon match on the
    /// start state; interior/trailing `*` become self-looping hub states,
    /// freshly allocated so an unrelated pattern's shared state is never
    /// given a self-loop it didn't ask for.
    fn build_wildcard(&self, graph: &mut Graph, bytes: &[u8], pattern: Pattern, next: NameStateId) -> PatternEntry {
        if bytes == b"*" {
            let m = ByteMatch::new(pattern, next);
            graph.get_mut(START).epsilon_match = Some(m);
            return PatternEntry { next_name_state: next, match_edges: Vec::new(), epsilon_at: Some(START) };
        }
        let segments: Vec<&[u8]> = bytes.split(|&b| b == b'*').collect();
        let mut cur = START;
        let mut match_edges = Vec::new();
        let mut epsilon_at = None;
        let last_segment = segments.len() - 1;

        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                // crossed a '*': hub is the start state for a leading
                // wildcard, else a freshly allocated state reached from the
                // byte just walked.
                if cur == START && i == 1 && segments[0].is_empty() {
                    if graph.get(START).all_bytes.is_none() {
                        graph.get_mut(START).all_bytes = Some(vec![ByteTransition::SingleNextState(START)]);
                    }
                } else {
                    let hub = graph.alloc();
                    graph.get_mut(hub).all_bytes = Some(vec![ByteTransition::SingleNextState(hub)]);
                    cur = hub;
                }
            }
            if segment.is_empty() {
                if i == last_segment {
                    let m = ByteMatch::new(pattern.clone(), next);
                    graph.get_mut(cur).epsilon_match = Some(m);
                    epsilon_at = Some(cur);
                }
                continue;
            }
            for (j, &b) in segment.iter().enumerate() {
                let is_last_overall = i == last_segment && j == segment.len() - 1;
                if is_last_overall {
                    install_terminal_composite_sink(graph, cur, b, pattern.clone(), next);
                    match_edges.push((cur, b));
                } else {
                    cur = ensure_advance(graph, cur, b);
                }
            }
        }
        PatternEntry { next_name_state: next, match_edges, epsilon_at }
    }

    /// spec §4.1 traversal algorithm (read path).
    pub(crate) fn transition_on(&self, raw_value: &[u8]) -> Vec<(NameStateId, Pattern)> {
        let states = self.states.load();
        let mut results: Vec<(NameStateId, Pattern)> = Vec::new();
        let mut failed_anything_but: std::collections::HashSet<NameStateId> = std::collections::HashSet::new();

        // --- value preprocessing ---
        let mut field_is_numeric = false;
        let mut working_value = raw_value.to_vec();
        if self.has_numeric.load(Ordering::Relaxed) > 0 {
            if let Ok(s) = std::str::from_utf8(raw_value) {
                if let Some(f) = comparable_number::parse_event_value(s) {
                    if let Some(enc) = comparable_number::encode_lossy(f) {
                        working_value = enc.to_vec();
                        field_is_numeric = true;
                    }
                }
            }
        } else if self.has_ip.load(Ordering::Relaxed) > 0 {
            if let Ok(s) = std::str::from_utf8(raw_value) {
                if let Some(enc) = ip_encode::encode(s) {
                    working_value = enc;
                }
            }
        }

        // --- 1. seed: side paths ---
        if let Some(m) = &states[START.to_usize()].epsilon_match {
            results.push((m.next_name_state, m.pattern.clone()));
        }
        if self.has_suffix.load(Ordering::Relaxed) > 0 {
            let reversed: Vec<u8> = raw_value.iter().rev().copied().collect();
            scan_side_pass(&states, &reversed, &mut results, &mut failed_anything_but, Pattern::is_suffix_like);
        }
        if self.has_equals_ignore_case.load(Ordering::Relaxed) > 0 {
            let lowered: Vec<u8> = raw_value.iter().map(|b| b.to_ascii_lowercase()).collect();
            scan_side_pass(&states, &lowered, &mut results, &mut failed_anything_but, Pattern::is_ignore_case_like);
        }
        scan_side_pass(&states, EXISTS_MARKER, &mut results, &mut failed_anything_but, |p| matches!(p, Pattern::Exists));

        // --- 2. main forward scan ---
        //
        // Run as an NFA frontier rather than a single cursor: a wildcard's
        // self-looping hub must stay "alive" in parallel with any
        // continuation branch that peels off it (spec §9's self-loop
        // composite), or a literal segment that recurs more than once in
        // the value (e.g. "*bc" against "abcbc") loses the real match to
        // whichever occurrence the cursor committed to first.
        let len = working_value.len();
        let mut frontier: Vec<ByteStateId> = vec![START];
        for (i, &b) in working_value.iter().enumerate() {
            let is_last = i == len - 1;
            let mut next_frontier: Vec<ByteStateId> = Vec::new();
            for &state in &frontier {
                if let Some(all) = &states[state.to_usize()].all_bytes {
                    for t in all {
                        if let ByteTransition::SingleNextState(next) = t {
                            next_frontier.push(*next);
                        }
                    }
                }
                for t in states[state.to_usize()].trans.get(b) {
                    match t {
                        ByteTransition::SingleNextState(next) => next_frontier.push(*next),
                        ByteTransition::Composite { next, terminal } => {
                            next_frontier.push(*next);
                            dispatch_match(terminal, is_last, field_is_numeric, &mut results, &mut failed_anything_but);
                        }
                        ByteTransition::Shortcut { remaining, terminal } => {
                            if &working_value[i + 1..] == remaining.as_slice() {
                                if let Pattern::Exact(_) = &terminal.pattern {
                                    results.push((terminal.next_name_state, terminal.pattern.clone()));
                                }
                            }
                        }
                    }
                }
            }
            next_frontier.sort_by_key(|s| s.to_usize());
            next_frontier.dedup();
            for &state in &next_frontier {
                if let Some(m) = &states[state.to_usize()].epsilon_match {
                    results.push((m.next_name_state, m.pattern.clone()));
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        // --- 3. anything_buts \ failed ---
        for entry in self.anything_buts.iter() {
            let ns = *entry.key();
            if !failed_anything_but.contains(&ns) {
                if let Some(p) = self.anything_but_patterns.get(&ns) {
                    results.push((ns, p.clone()));
                }
            }
        }

        results
    }
}

fn dispatch_match(
    terminal: &std::sync::Arc<ByteMatch>,
    is_last: bool,
    field_is_numeric: bool,
    results: &mut Vec<(NameStateId, Pattern)>,
    failed_anything_but: &mut std::collections::HashSet<NameStateId>,
) {
    match &terminal.pattern {
        Pattern::Exact(_) | Pattern::Wildcard(_) => {
            if is_last {
                results.push((terminal.next_name_state, terminal.pattern.clone()));
            }
        }
        Pattern::NumericEq(_) => {
            if is_last && field_is_numeric {
                results.push((terminal.next_name_state, terminal.pattern.clone()));
            }
        }
        Pattern::Prefix(_) => {
            results.push((terminal.next_name_state, terminal.pattern.clone()));
        }
        Pattern::NumericRange { is_cidr, .. } => {
            if *is_cidr != field_is_numeric {
                results.push((terminal.next_name_state, terminal.pattern.clone()));
            }
        }
        Pattern::AnythingBut { numeric, .. } => {
            if is_last && *numeric == field_is_numeric {
                failed_anything_but.insert(terminal.next_name_state);
            }
        }
        Pattern::AnythingButPrefix(_) => {
            failed_anything_but.insert(terminal.next_name_state);
        }
        Pattern::Suffix(_) | Pattern::EqualsIgnoreCase(_) | Pattern::Exists => {}
        Pattern::AnythingButSuffix(_) | Pattern::AnythingButIgnoreCase(_) => {}
        Pattern::Absent => unreachable!("Absent is never installed into a ByteMachine"),
    }
}

/// One of the side passes (reverse suffix scan, lowercased ignore-case
/// scan, exists lookup): a plain forward walk over `bytes` harvesting only
/// matches for which `harvest(pattern)` is true.
fn scan_side_pass(
    states: &[ByteState],
    bytes: &[u8],
    results: &mut Vec<(NameStateId, Pattern)>,
    failed_anything_but: &mut std::collections::HashSet<NameStateId>,
    harvest: impl Fn(&Pattern) -> bool,
) {
    let mut cur = START;
    let mut record = |failed_anything_but: &mut std::collections::HashSet<NameStateId>,
                       results: &mut Vec<(NameStateId, Pattern)>,
                       terminal: &std::sync::Arc<ByteMatch>| {
        if matches!(
            terminal.pattern,
            Pattern::AnythingButSuffix(_) | Pattern::AnythingButIgnoreCase(_)
        ) {
            failed_anything_but.insert(terminal.next_name_state);
        } else {
            results.push((terminal.next_name_state, terminal.pattern.clone()));
        }
    };
    for (i, &b) in bytes.iter().enumerate() {
        let transitions = states[cur.to_usize()].trans.get(b).to_vec();
        let mut advanced = None;
        for t in &transitions {
            match t {
                ByteTransition::SingleNextState(next) => advanced = Some(*next),
                ByteTransition::Composite { next, terminal } => {
                    advanced = Some(*next);
                    if harvest(&terminal.pattern) {
                        record(failed_anything_but, results, terminal);
                    }
                }
                ByteTransition::Shortcut { remaining, terminal } => {
                    if harvest(&terminal.pattern) && &bytes[i + 1..] == remaining.as_slice() {
                        record(failed_anything_but, results, terminal);
                    }
                }
            }
        }
        match advanced {
            Some(next) => cur = next,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_id::NameStateId;
    use std::collections::BTreeSet;

    fn next_id(n: u32) -> impl FnOnce() -> NameStateId {
        move || NameStateId(n)
    }

    #[test]
    fn add_pattern_dedups_structurally_equal_patterns() {
        let m = ByteMachine::default();
        let a = m.add_pattern(Pattern::exact(b"running".to_vec()), next_id(1));
        let b = m.add_pattern(Pattern::exact(b"running".to_vec()), next_id(99));
        assert_eq!(a, b);
        assert_eq!(m.find_pattern(&Pattern::exact(b"running".to_vec())), Some(a));
    }

    #[test]
    fn exact_match_requires_full_consumption() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::exact(b"ok".to_vec()), next_id(1));
        let results = m.transition_on(b"ok");
        assert!(results.iter().any(|(n, _)| *n == next));
        let results = m.transition_on(b"okay");
        assert!(!results.iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn prefix_match_fires_mid_scan() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::prefix(b"ab".to_vec()), next_id(1));
        let results = m.transition_on(b"abcdef");
        assert!(results.iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn suffix_match_uses_reverse_scan() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::suffix(b"xyz"), next_id(1));
        let results = m.transition_on(b"abcxyz");
        assert!(results.iter().any(|(n, _)| *n == next));
        let results = m.transition_on(b"abcxy");
        assert!(!results.iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn delete_pattern_removes_future_matches() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::exact(b"gone".to_vec()), next_id(1));
        assert!(m.transition_on(b"gone").iter().any(|(n, _)| *n == next));
        m.delete_pattern(&Pattern::exact(b"gone".to_vec()));
        assert!(!m.transition_on(b"gone").iter().any(|(n, _)| *n == next));
        assert!(m.is_empty());
    }

    #[test]
    fn bare_wildcard_matches_anything() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::wildcard(b"*".to_vec()), next_id(1));
        assert!(m.transition_on(b"").iter().any(|(n, _)| *n == next));
        assert!(m.transition_on(b"anything").iter().any(|(n, _)| *n == next));
    }

    /// The scenario that motivated the NFA-frontier rewrite: a repeated
    /// literal tail must still be found if the first occurrence is not at
    /// the true end of the value.
    #[test]
    fn interior_wildcard_finds_match_past_a_false_start() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::wildcard(b"*bc".to_vec()), next_id(1));
        let results = m.transition_on(b"abcbc");
        assert!(results.iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"abcbx").iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn trailing_wildcard_matches_any_continuation() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::wildcard(b"xy*".to_vec()), next_id(1));
        assert!(m.transition_on(b"xy").iter().any(|(n, _)| *n == next));
        assert!(m.transition_on(b"xyzzz").iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"x").iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn equals_ignore_case_matches_regardless_of_case() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::equals_ignore_case(b"AbC"), next_id(1));
        assert!(m.transition_on(b"abc").iter().any(|(n, _)| *n == next));
        assert!(m.transition_on(b"ABC").iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"abcd").iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn exists_matches_the_sentinel_only() {
        let m = ByteMachine::default();
        let next = m.add_pattern(Pattern::Exists, next_id(1));
        assert!(m.transition_on(EXISTS_MARKER).iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"N!").iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn anything_but_excludes_only_its_listed_values() {
        let m = ByteMachine::default();
        let mut values = BTreeSet::new();
        values.insert(b"bad".to_vec());
        let next = m.add_pattern(Pattern::anything_but(values, false), next_id(1));
        assert!(m.transition_on(b"good").iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"bad").iter().any(|(n, _)| *n == next));
    }

    #[test]
    fn numeric_eq_requires_numeric_value() {
        let m = ByteMachine::default();
        let encoded = crate::comparable_number::encode_strict(300.0).unwrap();
        let next = m.add_pattern(Pattern::NumericEq(encoded.to_vec()), next_id(1));
        assert!(m.transition_on(b"300").iter().any(|(n, _)| *n == next));
        assert!(!m.transition_on(b"301").iter().any(|(n, _)| *n == next));
    }
}
