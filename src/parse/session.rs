// src/parse/session.rs
// Session lifecycle: binds an immutable grammar to an event sink and owns
// the mutable parse state (stack, token buffer, position counters). One
// session is single-owner; duplicating it forks the state for speculative
// parsing while sharing the grammar.

use std::collections::VecDeque;

use crate::grammar::Grammar;

use super::events::ParseEvents;
use super::stack::{Frame, FrameData, ParseStack, Terminal};
use super::{interp, ParsePos, Status};

/// Resource caps for one parse state. Exceeding either fails the parse step
/// with `Status::ResourceLimit` and leaves the state inspectable but not
/// resumable.
#[derive(Debug, Clone, Copy)]
pub struct ParseConfig {
    pub max_stack_depth: usize,
    pub max_token_buffer: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig { max_stack_depth: 4096, max_token_buffer: 4096 }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParseState {
    pub(crate) pos: ParsePos,
    /// Earliest input offset any still-pending terminal began at. A client
    /// that wants to reference terminal text must retain bytes from here.
    pub(crate) open_terminal_offset: usize,
    pub(crate) stack: ParseStack,
    pub(crate) token_buffer: VecDeque<Terminal>,
    pub(crate) max_token_buffer: usize,
    pub(crate) cancelled: bool,
    /// Entry-rule start events have been delivered.
    pub(crate) root_started: bool,
}

impl ParseState {
    fn new(config: ParseConfig) -> Self {
        let mut stack = ParseStack::new(config.max_stack_depth);
        stack
            .push(Frame {
                start: ParsePos::start(),
                f: FrameData::Rtn { rtn: 0, state: 0, transition: None },
            })
            .expect("stack depth cap too small for the entry frame");
        ParseState {
            pos: ParsePos::start(),
            open_terminal_offset: 0,
            stack,
            token_buffer: VecDeque::new(),
            max_token_buffer: config.max_token_buffer,
            cancelled: false,
            root_started: false,
        }
    }
}

/// A resumable parse of one input stream against one grammar.
pub struct Session<'g, E> {
    grammar: &'g Grammar,
    events: E,
    state: ParseState,
    config: ParseConfig,
}

impl<'g, E: ParseEvents> Session<'g, E> {
    pub fn new(grammar: &'g Grammar, events: E) -> Self {
        Self::with_config(grammar, events, ParseConfig::default())
    }

    pub fn with_config(grammar: &'g Grammar, events: E, config: ParseConfig) -> Self {
        Session { grammar, events, state: ParseState::new(config), config }
    }

    /// Rewind to the initial configuration, keeping the grammar, events,
    /// and caps. The next `parse` starts a fresh input stream.
    pub fn reset(&mut self) {
        self.state = ParseState::new(self.config);
    }

    /// Begin or continue the parse. `buf` must be the input stream starting
    /// at absolute offset `self.offset()`; on return the offset reflects
    /// the bytes actually consumed (a longest-match backoff can leave it
    /// short of the chunk end, or before it).
    pub fn parse(&mut self, buf: &[u8]) -> Status {
        interp::parse_chunk(self.grammar, &mut self.state, &mut self.events, buf)
    }

    /// `parse`, optionally completing the stream: with `finalize` set, a
    /// chunk that ends in `Ok` or `HardEof` must consume all of `buf` and
    /// pass `finish`, otherwise the call reports `PrematureEof`.
    pub fn parse_finalize(&mut self, buf: &[u8], finalize: bool) -> Status {
        let base = self.state.pos.byte;
        let status = self.parse(buf);
        if !finalize {
            return status;
        }
        match status {
            Status::Ok | Status::HardEof => {
                if self.state.pos.byte != base + buf.len() || !self.finish() {
                    Status::PrematureEof
                } else {
                    status
                }
            }
            other => other,
        }
    }

    /// Complete the parse after all input has been delivered: closes any
    /// pending terminal, resolves lookahead against end of input, and
    /// drains end-rule events down through the entry rule. Returns `false`
    /// if the grammar required more input; the state stays inspectable.
    pub fn finish(&mut self) -> bool {
        interp::finish(self.grammar, &mut self.state, &mut self.events)
    }

    /// Out-of-band cancellation; the next `parse` step returns `Cancelled`.
    pub fn cancel(&mut self) {
        self.state.cancelled = true;
    }

    /// Fork the parse for speculation: deep-copies stack, token buffer, and
    /// counters; shares the grammar.
    pub fn dup(&self) -> Session<'g, E>
    where
        E: Clone,
    {
        Session {
            grammar: self.grammar,
            events: self.events.clone(),
            state: self.state.clone(),
            config: self.config,
        }
    }

    // ---------- accessors ----------

    #[inline]
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Bytes consumed so far (absolute input offset of the next byte).
    #[inline]
    pub fn offset(&self) -> usize {
        self.state.pos.byte
    }

    /// Current source line number (starts at 1).
    #[inline]
    pub fn line(&self) -> u32 {
        self.state.pos.line
    }

    /// Current source column number (starts at 1).
    #[inline]
    pub fn column(&self) -> u32 {
        self.state.pos.column
    }

    #[inline]
    pub fn open_terminal_offset(&self) -> usize {
        self.state.open_terminal_offset
    }

    /// Current stack depth (0 only after a successful `finish`).
    #[inline]
    pub fn depth(&self) -> usize {
        self.state.stack.depth()
    }

    /// Stack frame `offset` levels down from the top (0 is the top).
    #[inline]
    pub fn frame_at(&self, offset: usize) -> Option<&Frame> {
        self.state.stack.frame_at(offset)
    }

    /// Terminals lexed for lookahead but not yet consumed.
    pub fn pending_terminals(&self) -> impl Iterator<Item = &Terminal> {
        self.state.token_buffer.iter()
    }

    #[inline]
    pub fn events(&self) -> &E {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn into_events(self) -> E {
        self.events
    }
}
