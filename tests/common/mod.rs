//! Shared fixtures for the integration tests: an event recorder, a chunked
//! parse driver with invariant checks, and a couple of tiny grammars beside
//! the demo JSON one.

#![allow(dead_code)]

use strix::grammar::{
    Grammar, IntFa, IntfaState, IntfaTransition, Lookahead, Rtn, RtnState, RtnTransition,
    TransitionLabel,
};
use strix::parse::{Ctl, FrameData, ParseEvents, ParsePos, SlotRef, TerminalEvent};
use strix::{Session, Status};

/// One recorded parser event, with enough payload to compare streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    WillStart { rule: String, start: usize },
    DidStart(String),
    Terminal { name: String, offset: usize, len: usize, line: u32, column: u32 },
    WillEnd(String),
    DidEnd(String),
    ErrorChar(u8),
    ErrorTerminal { name: String, offset: usize },
}

/// Collects events; optionally cancels after the n-th one.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub cancel_at: Option<usize>,
}

impl Recorder {
    fn rec(&mut self, ctl: &mut Ctl, event: Event) {
        self.events.push(event);
        if self.cancel_at == Some(self.events.len()) {
            ctl.cancel();
        }
    }
}

impl ParseEvents for Recorder {
    fn on_will_start_rule(
        &mut self,
        ctl: &mut Ctl,
        rule: &str,
        start: &ParsePos,
        _slot: Option<SlotRef<'_>>,
    ) {
        self.rec(ctl, Event::WillStart { rule: rule.to_string(), start: start.byte });
    }

    fn on_did_start_rule(&mut self, ctl: &mut Ctl, rule: &str) {
        self.rec(ctl, Event::DidStart(rule.to_string()));
    }

    fn on_terminal(&mut self, ctl: &mut Ctl, t: &TerminalEvent<'_>) {
        self.rec(
            ctl,
            Event::Terminal {
                name: t.name.to_string(),
                offset: t.offset,
                len: t.len,
                line: t.line,
                column: t.column,
            },
        );
    }

    fn on_will_end_rule(&mut self, ctl: &mut Ctl, rule: &str) {
        self.rec(ctl, Event::WillEnd(rule.to_string()));
    }

    fn on_did_end_rule(&mut self, ctl: &mut Ctl, rule: &str) {
        self.rec(ctl, Event::DidEnd(rule.to_string()));
    }

    fn on_error_char(&mut self, ctl: &mut Ctl, byte: u8) {
        self.rec(ctl, Event::ErrorChar(byte));
    }

    fn on_error_terminal(&mut self, ctl: &mut Ctl, t: &TerminalEvent<'_>) {
        self.rec(ctl, Event::ErrorTerminal { name: t.name.to_string(), offset: t.offset });
    }
}

/// Compact rendering for readable assertions.
pub fn compact(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e {
            Event::WillStart { rule, .. } => format!("will:{rule}"),
            Event::DidStart(rule) => format!("did:{rule}"),
            Event::Terminal { name, .. } => format!("term:{name}"),
            Event::WillEnd(rule) => format!("end:{rule}"),
            Event::DidEnd(rule) => format!("ended:{rule}"),
            Event::ErrorChar(b) => format!("errchar:{b:#04x}"),
            Event::ErrorTerminal { name, .. } => format!("errterm:{name}"),
        })
        .collect()
}

/// Check the universal invariants on a live session.
pub fn check_invariants(session: &Session<'_, Recorder>, delivered: usize) {
    let depth = session.depth();
    assert!(depth >= 1, "stack must not empty during an active parse");
    let bottom = session.frame_at(depth - 1).expect("bottom frame");
    assert!(
        matches!(bottom.f, FrameData::Rtn { rtn: 0, .. }),
        "bottom frame must be the entry rule, got {:?}",
        bottom.f
    );
    assert!(
        session.open_terminal_offset() <= session.offset(),
        "open_terminal_offset {} > offset {}",
        session.open_terminal_offset(),
        session.offset()
    );
    assert!(session.offset() <= delivered, "offset ran past delivered input");
    let mut prev = None;
    for t in session.pending_terminals() {
        if let Some(p) = prev {
            assert!(t.offset > p, "token buffer offsets must be strictly monotonic");
        }
        prev = Some(t.offset);
    }
}

/// Feed `input` to the session in pieces cut at `boundaries`, re-supplying
/// from the session's own offset after every call (the retention contract
/// allows the parser to rewind over a chunk edge).
pub fn drive(session: &mut Session<'_, Recorder>, input: &[u8], boundaries: &[usize]) -> Status {
    let mut cuts: Vec<usize> = boundaries.iter().copied().filter(|&b| b <= input.len()).collect();
    cuts.push(input.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut stalls = 0;
    loop {
        let off = session.offset();
        if off >= input.len() {
            return Status::Ok;
        }
        let end = *cuts.iter().find(|&&b| b > off).unwrap_or(&input.len());
        let status = session.parse(&input[off..end]);
        check_invariants(session, end);
        match status {
            Status::Ok => {
                if session.offset() == off {
                    stalls += 1;
                    assert!(stalls < 3, "parser stalled at offset {off}");
                } else {
                    stalls = 0;
                }
            }
            other => return other,
        }
    }
}

/// Run a whole input through a fresh session: drive, then finish.
pub fn run(g: &Grammar, input: &[u8], boundaries: &[usize]) -> (Vec<Event>, Status, bool) {
    let mut session = Session::new(g, Recorder::default());
    let status = drive(&mut session, input, boundaries);
    let finished = match status {
        Status::Ok | Status::HardEof => session.finish(),
        _ => false,
    };
    (session.into_events().events, status, finished)
}

/// Grammar whose entry rule accepts the empty input: a single final start
/// state with no transitions.
pub fn empty_grammar() -> Grammar {
    let g = Grammar {
        name: None,
        strings: vec!["unit".to_string()],
        rtns: vec![Rtn {
            name: 0,
            num_slots: 0,
            states: vec![RtnState { is_final: true, lookahead: None, transitions: vec![] }],
            transitions: vec![],
        }],
        glas: vec![],
        intfas: vec![],
        ignored: vec![],
    };
    g.validate().expect("empty grammar fixture");
    g
}

/// Grammar requiring two `eq` terminals in sequence; a lone one makes
/// `finish` fail.
pub fn pair_grammar() -> Grammar {
    let mut g = prefix_grammar();
    let eq = 1u32;
    g.rtns[0] = Rtn {
        name: 0,
        num_slots: 2,
        states: vec![
            RtnState { is_final: false, lookahead: Some(Lookahead::Intfa(0)), transitions: vec![0] },
            RtnState { is_final: false, lookahead: Some(Lookahead::Intfa(0)), transitions: vec![1] },
            RtnState { is_final: true, lookahead: None, transitions: vec![] },
        ],
        transitions: vec![
            RtnTransition { label: TransitionLabel::Terminal(eq), dest: 1, slot_name: eq, slot_index: 0 },
            RtnTransition { label: TransitionLabel::Terminal(eq), dest: 2, slot_name: eq, slot_index: 1 },
        ],
    };
    g.validate().expect("pair grammar fixture");
    g
}

/// Grammar with two terminals sharing a prefix: `eq` is "=", `eqeq` is
/// "==". The entry rule accepts exactly one of them, so inputs exercise
/// longest-match disambiguation.
pub fn prefix_grammar() -> Grammar {
    let strings = vec!["expr".to_string(), "eq".to_string(), "eqeq".to_string()];
    let (eq, eqeq) = (1u32, 2u32);
    let intfa = IntFa {
        states: vec![
            IntfaState { terminal: None, transitions: vec![0] },
            IntfaState { terminal: Some(eq), transitions: vec![1] },
            IntfaState { terminal: Some(eqeq), transitions: vec![] },
        ],
        transitions: vec![
            IntfaTransition { lo: b'=', hi: b'=', dest: 1 },
            IntfaTransition { lo: b'=', hi: b'=', dest: 2 },
        ],
    };
    let expr = Rtn {
        name: 0,
        num_slots: 2,
        states: vec![
            RtnState { is_final: false, lookahead: Some(Lookahead::Intfa(0)), transitions: vec![0, 1] },
            RtnState { is_final: true, lookahead: None, transitions: vec![] },
        ],
        transitions: vec![
            RtnTransition { label: TransitionLabel::Terminal(eq), dest: 1, slot_name: eq, slot_index: 0 },
            RtnTransition { label: TransitionLabel::Terminal(eqeq), dest: 1, slot_name: eqeq, slot_index: 1 },
        ],
    };
    let g = Grammar {
        name: None,
        strings,
        rtns: vec![expr],
        glas: vec![],
        intfas: vec![intfa],
        ignored: vec![],
    };
    g.validate().expect("prefix grammar fixture");
    g
}
