// src/parse/interp.rs
// The state-machine executor: a single dispatch loop driven by the type of
// the topmost stack frame. IntFA frames consume bytes, GLA frames consume
// buffered terminals (lexing more as needed), RTN frames take rule
// transitions. Every mutation funnels through the small helpers here so the
// event order stays a pure function of (grammar, input bytes).

use crate::grammar::{GlaState, Grammar, Lookahead, Rtn, RtnState, StrId, TransitionLabel};

use super::events::{Ctl, ParseEvents, SlotRef, TerminalEvent};
use super::session::ParseState;
use super::stack::{Frame, FrameData, Terminal};
use super::{ParsePos, Status};

enum Step {
    /// Keep dispatching.
    Continue,
    /// The chunk is exhausted (or the position rewound out of it); resume
    /// with the next `parse` call.
    NeedInput,
    /// The parse is over for this call.
    Done(Status),
}

pub(crate) fn parse_chunk<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    buf: &[u8],
) -> Status {
    let base = st.pos.byte;
    ensure_root_started(g, st, ev);
    loop {
        if st.cancelled {
            return Status::Cancelled;
        }
        if st.stack.is_empty() {
            // A successful finish() already drained the parse.
            return Status::HardEof;
        }
        let step = match st.stack.top().f {
            FrameData::Intfa { .. } => step_intfa(g, st, ev, buf, base),
            FrameData::Gla { .. } => step_gla(g, st, ev),
            FrameData::Rtn { .. } => step_rtn(g, st, ev),
        };
        match step {
            Step::Continue => {}
            Step::NeedInput => return Status::Ok,
            Step::Done(status) => return status,
        }
    }
}

/// Complete the parse against end of input: close any pending terminal,
/// resolve lookahead through EOF transitions, flush buffered terminals, and
/// drain end-rule events down through the entry rule. `false` means the
/// grammar required more input; the state is left inspectable.
pub(crate) fn finish<E: ParseEvents>(g: &Grammar, st: &mut ParseState, ev: &mut E) -> bool {
    ensure_root_started(g, st, ev);
    loop {
        if st.cancelled {
            return false;
        }
        if st.stack.is_empty() {
            // Lexed-but-unconsumed lookahead terminals mean the input went
            // past what the grammar accepted.
            return st.token_buffer.is_empty();
        }
        let top = *st.stack.top();
        match top.f {
            FrameData::Intfa { last_final, .. } => match last_final {
                // The longest match runs exactly to the end of input.
                Some((name, end)) if end.byte == st.pos.byte => {
                    match close_token(g, st, name, end) {
                        Step::Continue => {}
                        _ => return false,
                    }
                }
                _ => {
                    if top.start.byte == st.pos.byte {
                        // Nothing lexed; the parent decides whether EOF is
                        // acceptable here.
                        st.stack.pop();
                    } else {
                        // Bytes consumed past the last match can never be
                        // part of any terminal.
                        return false;
                    }
                }
            },
            FrameData::Gla { gla, state, buffer_pos } => {
                let gl = &g.glas[gla as usize];
                match &gl.states[state as usize] {
                    GlaState::Final { transition_offset } => {
                        let transition_offset = *transition_offset;
                        st.stack.pop();
                        match apply_selected(g, st, ev, transition_offset) {
                            Step::Continue => {}
                            _ => return false,
                        }
                    }
                    GlaState::NonFinal { .. } => {
                        let label = st.token_buffer.get(buffer_pos).map(|t| t.name);
                        match gl.step(state, label) {
                            Some(dest) => {
                                if let FrameData::Gla { state, buffer_pos, .. } =
                                    &mut st.stack.top_mut().f
                                {
                                    *state = dest;
                                    if label.is_some() {
                                        *buffer_pos += 1;
                                    }
                                }
                            }
                            None => return false,
                        }
                    }
                }
            }
            FrameData::Rtn { rtn, state, .. } => {
                let r = &g.rtns[rtn as usize];
                let stt = &r.states[state as usize];
                if let Some(head) = st.token_buffer.front().copied() {
                    // Lookahead already produced this terminal; it must be
                    // consumable on the way out.
                    match select_transition(r, stt, head.name) {
                        Some(idx) => match apply_transition(g, st, ev, idx) {
                            Step::Continue => {}
                            _ => return false,
                        },
                        None if stt.is_final => pop_rule(g, st, ev),
                        None => return false,
                    }
                } else if stt.is_final {
                    pop_rule(g, st, ev);
                } else {
                    match stt.lookahead {
                        // EOF may still resolve through the lookahead
                        // automaton's EOF transitions.
                        Some(Lookahead::Gla(gi)) => {
                            match push_frame(
                                st,
                                Frame {
                                    start: st.pos,
                                    f: FrameData::Gla { gla: gi, state: 0, buffer_pos: 0 },
                                },
                            ) {
                                Step::Continue => {}
                                _ => return false,
                            }
                        }
                        // A sole rule edge may lead to a nullable rule that
                        // can still complete at end of input.
                        None if !stt.transitions.is_empty() => {
                            match apply_transition(g, st, ev, stt.transitions[0]) {
                                Step::Continue => {}
                                _ => return false,
                            }
                        }
                        _ => return false,
                    }
                }
            }
        }
    }
}

fn ensure_root_started<E: ParseEvents>(g: &Grammar, st: &mut ParseState, ev: &mut E) {
    if st.root_started || st.stack.is_empty() {
        return;
    }
    st.root_started = true;
    let name = g.str(g.rtns[0].name);
    let start = st.stack.top().start;
    let mut c = ctl(st);
    ev.on_will_start_rule(&mut c, name, &start, None);
    st.cancelled = c.cancelled;
    let mut c = ctl(st);
    ev.on_did_start_rule(&mut c, name);
    st.cancelled = c.cancelled;
}

// -------------------- lexical mode --------------------

fn step_intfa<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    buf: &[u8],
    base: usize,
) -> Step {
    loop {
        let FrameData::Intfa { intfa, state, .. } = st.stack.top().f else {
            return Step::Done(Status::Error);
        };
        let fa = &g.intfas[intfa as usize];
        if fa.states[state as usize].transitions.is_empty() {
            // The token cannot extend; close it without waiting for input.
            return lex_dead_end(g, st, ev, None);
        }
        if st.pos.byte < base {
            // A backoff rewound behind this chunk; the caller re-supplies
            // from the new offset.
            return Step::NeedInput;
        }
        let idx = st.pos.byte - base;
        if idx >= buf.len() {
            return Step::NeedInput;
        }
        let b = buf[idx];
        match fa.step(state, b) {
            Some(dest) => {
                st.pos.advance(b);
                if let FrameData::Intfa { state, last_final, .. } = &mut st.stack.top_mut().f {
                    *state = dest;
                    if let Some(name) = fa.states[dest as usize].terminal {
                        *last_final = Some((name, st.pos));
                    }
                }
            }
            None => return lex_dead_end(g, st, ev, Some(b)),
        }
    }
}

fn lex_dead_end<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    next_byte: Option<u8>,
) -> Step {
    let FrameData::Intfa { last_final, .. } = st.stack.top().f else {
        return Step::Done(Status::Error);
    };
    match last_final {
        Some((name, end)) => close_token(g, st, name, end),
        None => match next_byte {
            Some(b) => {
                log::debug!(
                    "lexical dead end on byte 0x{b:02x} at offset {}",
                    st.pos.byte
                );
                let mut c = ctl(st);
                ev.on_error_char(&mut c, b);
                st.cancelled = c.cancelled;
                Step::Done(Status::Error)
            }
            // Validation rejects non-accepting dead-end states up front.
            None => Step::Done(Status::Error),
        },
    }
}

/// Yield the longest match: rewind to just past it, and either append the
/// terminal to the token buffer (popping the lexical frame) or, for ignored
/// terminals, discard it and restart the automaton in place.
fn close_token(g: &Grammar, st: &mut ParseState, name: StrId, end: ParsePos) -> Step {
    let start = st.stack.top().start;
    st.pos = end;
    if g.is_ignored(name) {
        let top = st.stack.top_mut();
        top.start = end;
        if let FrameData::Intfa { state, last_final, .. } = &mut top.f {
            *state = 0;
            *last_final = None;
        }
        if st.token_buffer.is_empty() {
            st.open_terminal_offset = end.byte;
        }
        return Step::Continue;
    }
    if st.token_buffer.len() >= st.max_token_buffer {
        log::debug!("token buffer cap ({}) exceeded", st.max_token_buffer);
        return Step::Done(Status::ResourceLimit);
    }
    st.stack.pop();
    log::trace!(
        "terminal {:?} at {}..{}",
        g.str(name),
        start.byte,
        end.byte
    );
    st.token_buffer.push_back(Terminal {
        name,
        offset: start.byte,
        len: end.byte - start.byte,
        line: start.line,
        column: start.column,
    });
    st.open_terminal_offset = st.token_buffer.front().map(|t| t.offset).unwrap_or(end.byte);
    Step::Continue
}

// -------------------- lookahead mode --------------------

fn step_gla<E: ParseEvents>(g: &Grammar, st: &mut ParseState, ev: &mut E) -> Step {
    let FrameData::Gla { gla, state, buffer_pos } = st.stack.top().f else {
        return Step::Done(Status::Error);
    };
    let gl = &g.glas[gla as usize];
    match &gl.states[state as usize] {
        GlaState::Final { transition_offset } => {
            let transition_offset = *transition_offset;
            st.stack.pop();
            apply_selected(g, st, ev, transition_offset)
        }
        GlaState::NonFinal { intfa, .. } => {
            let intfa = *intfa;
            if buffer_pos < st.token_buffer.len() {
                let term = st.token_buffer[buffer_pos];
                match gl.step(state, Some(term.name)) {
                    Some(dest) => {
                        if let FrameData::Gla { state, buffer_pos, .. } =
                            &mut st.stack.top_mut().f
                        {
                            *state = dest;
                            *buffer_pos += 1;
                        }
                        Step::Continue
                    }
                    None => {
                        let first = st.token_buffer.front().copied().unwrap();
                        unexpected_terminal(g, st, ev, first)
                    }
                }
            } else {
                // Lookahead needs a terminal the buffer does not have yet.
                push_lexer(st, intfa)
            }
        }
    }
}

/// A resolved lookahead selects the parent RTN state's transition by its
/// 1-based offset.
fn apply_selected<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    offset: u32,
) -> Step {
    let FrameData::Rtn { rtn, state, .. } = st.stack.top().f else {
        log::warn!("lookahead resolved with no rule frame beneath");
        return Step::Done(Status::Error);
    };
    let stt = &g.rtns[rtn as usize].states[state as usize];
    let Some(&idx) = stt.transitions.get(offset as usize - 1) else {
        log::warn!("lookahead selected transition offset {offset} out of range");
        return Step::Done(Status::Error);
    };
    apply_transition(g, st, ev, idx)
}

// -------------------- rule mode --------------------

fn step_rtn<E: ParseEvents>(g: &Grammar, st: &mut ParseState, ev: &mut E) -> Step {
    let FrameData::Rtn { rtn, state, .. } = st.stack.top().f else {
        return Step::Done(Status::Error);
    };
    let r = &g.rtns[rtn as usize];
    let stt = &r.states[state as usize];

    if stt.transitions.is_empty() {
        // Validation guarantees such states are final.
        if st.stack.depth() == 1 {
            // The entry rule is complete; no further input can be accepted.
            return Step::Done(Status::HardEof);
        }
        pop_rule(g, st, ev);
        return Step::Continue;
    }

    match stt.lookahead {
        Some(Lookahead::Gla(gi)) => push_frame(
            st,
            Frame { start: st.pos, f: FrameData::Gla { gla: gi, state: 0, buffer_pos: 0 } },
        ),
        Some(Lookahead::Intfa(ii)) => {
            if let Some(head) = st.token_buffer.front().copied() {
                match select_transition(r, stt, head.name) {
                    Some(idx) => apply_transition(g, st, ev, idx),
                    None if stt.is_final => {
                        // No mandated transition; the terminal belongs to an
                        // outer rule.
                        pop_rule(g, st, ev);
                        Step::Continue
                    }
                    None => unexpected_terminal(g, st, ev, head),
                }
            } else {
                push_lexer(st, ii)
            }
        }
        None => {
            // Exactly one transition, takeable without lookahead.
            apply_transition(g, st, ev, stt.transitions[0])
        }
    }
}

/// Unique transition out of `state` matching a terminal: a terminal edge
/// with that name, or failing that the state's sole rule edge (whose FIRST
/// set the compiler already checked).
fn select_transition(r: &Rtn, state: &RtnState, name: StrId) -> Option<u32> {
    let mut rule_edge = None;
    for &idx in &state.transitions {
        match r.transitions[idx as usize].label {
            TransitionLabel::Terminal(t) if t == name => return Some(idx),
            TransitionLabel::Terminal(_) => {}
            TransitionLabel::Rule(_) => rule_edge = Some(idx),
        }
    }
    rule_edge
}

fn apply_transition<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    idx: u32,
) -> Step {
    let FrameData::Rtn { rtn, .. } = st.stack.top().f else {
        return Step::Done(Status::Error);
    };
    let r = &g.rtns[rtn as usize];
    let t = &r.transitions[idx as usize];
    match t.label {
        TransitionLabel::Terminal(name) => {
            let Some(head) = st.token_buffer.front().copied() else {
                log::warn!("terminal transition with an empty token buffer");
                return Step::Done(Status::Error);
            };
            if head.name != name {
                return unexpected_terminal(g, st, ev, head);
            }
            // Record the transition before the event fires so handlers can
            // see the slot it filled.
            if let FrameData::Rtn { state, transition, .. } = &mut st.stack.top_mut().f {
                *transition = Some(idx);
                *state = t.dest;
            }
            st.token_buffer.pop_front();
            st.open_terminal_offset =
                st.token_buffer.front().map(|x| x.offset).unwrap_or(st.pos.byte);
            let event = terminal_event(g, &head, Some(slot_ref(g, t)));
            let mut c = ctl(st);
            ev.on_terminal(&mut c, &event);
            st.cancelled = c.cancelled;
            Step::Continue
        }
        TransitionLabel::Rule(child) => {
            if let FrameData::Rtn { transition, .. } = &mut st.stack.top_mut().f {
                *transition = Some(idx);
            }
            // The child rule starts at its first terminal, which may already
            // sit in the lookahead buffer.
            let child_start = st
                .token_buffer
                .front()
                .map(|h| ParsePos { byte: h.offset, line: h.line, column: h.column })
                .unwrap_or(st.pos);
            let name = g.str(g.rtns[child as usize].name);
            let slot = slot_ref(g, t);
            let mut c = ctl(st);
            ev.on_will_start_rule(&mut c, name, &child_start, Some(slot));
            st.cancelled = c.cancelled;
            let pushed = push_frame(
                st,
                Frame {
                    start: child_start,
                    f: FrameData::Rtn { rtn: child, state: 0, transition: None },
                },
            );
            if !matches!(pushed, Step::Continue) {
                return pushed;
            }
            log::trace!("enter rule {name}");
            let mut c = ctl(st);
            ev.on_did_start_rule(&mut c, name);
            st.cancelled = c.cancelled;
            Step::Continue
        }
    }
}

/// Pop a completed rule, firing the end events around the pop and advancing
/// the parent past the transition that entered the rule.
fn pop_rule<E: ParseEvents>(g: &Grammar, st: &mut ParseState, ev: &mut E) {
    let FrameData::Rtn { rtn, .. } = st.stack.top().f else {
        return;
    };
    let name = g.str(g.rtns[rtn as usize].name);
    let mut c = ctl(st);
    ev.on_will_end_rule(&mut c, name);
    st.cancelled = c.cancelled;
    st.stack.pop();
    log::trace!("leave rule {name}");
    let mut c = ctl(st);
    ev.on_did_end_rule(&mut c, name);
    st.cancelled = c.cancelled;
    if st.stack.is_empty() {
        return;
    }
    if let FrameData::Rtn { rtn, state, transition } = &mut st.stack.top_mut().f {
        if let Some(idx) = *transition {
            *state = g.rtns[*rtn as usize].transitions[idx as usize].dest;
        }
    }
}

// -------------------- shared plumbing --------------------

fn push_lexer(st: &mut ParseState, intfa: u32) -> Step {
    if st.token_buffer.is_empty() {
        // The terminal about to be lexed is now the earliest pending one.
        st.open_terminal_offset = st.pos.byte;
    }
    push_frame(
        st,
        Frame { start: st.pos, f: FrameData::Intfa { intfa, state: 0, last_final: None } },
    )
}

fn push_frame(st: &mut ParseState, frame: Frame) -> Step {
    match st.stack.push(frame) {
        Ok(()) => Step::Continue,
        Err(_) => {
            log::debug!("parse stack depth cap exceeded");
            Step::Done(Status::ResourceLimit)
        }
    }
}

/// Grammatical mismatch: rewind to just before the offending terminal,
/// report it, and fail the parse call.
fn unexpected_terminal<E: ParseEvents>(
    g: &Grammar,
    st: &mut ParseState,
    ev: &mut E,
    term: Terminal,
) -> Step {
    st.pos = ParsePos { byte: term.offset, line: term.line, column: term.column };
    let event = terminal_event(g, &term, None);
    let mut c = ctl(st);
    ev.on_error_terminal(&mut c, &event);
    st.cancelled = c.cancelled;
    Step::Done(Status::Error)
}

fn ctl(st: &ParseState) -> Ctl {
    Ctl::new(st.cancelled, st.pos, st.stack.depth())
}

fn slot_ref<'a>(g: &'a Grammar, t: &crate::grammar::RtnTransition) -> SlotRef<'a> {
    SlotRef { name: g.str(t.slot_name), index: t.slot_index }
}

fn terminal_event<'a>(
    g: &'a Grammar,
    term: &Terminal,
    slot: Option<SlotRef<'a>>,
) -> TerminalEvent<'a> {
    TerminalEvent {
        name: g.str(term.name),
        slot,
        offset: term.offset,
        len: term.len,
        line: term.line,
        column: term.column,
    }
}
