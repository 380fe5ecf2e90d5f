// src/dev/json.rs
// Hand-built demo grammar for a JSON subset: rules `value`, `object`,
// `array` over the usual punctuation/literal terminals, with whitespace
// lexed and discarded. Doubles as the reference for authoring grammars
// programmatically and as the fixture the integration tests parse with.

use hashbrown::HashMap;

use crate::grammar::{
    Gla, GlaState, GlaTransition, Grammar, IntFa, IntfaState, IntfaTransition, Lookahead, Rtn,
    RtnState, RtnTransition, StrId, TransitionLabel,
};

struct Strings {
    pool: Vec<String>,
    map: HashMap<String, StrId>,
}

impl Strings {
    fn new() -> Self {
        Strings { pool: Vec::new(), map: HashMap::new() }
    }

    fn intern(&mut self, s: &str) -> StrId {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let id = self.pool.len() as StrId;
        self.pool.push(s.to_string());
        self.map.insert(s.to_string(), id);
        id
    }
}

struct IntfaBuilder {
    states: Vec<IntfaState>,
    transitions: Vec<IntfaTransition>,
}

impl IntfaBuilder {
    fn new() -> Self {
        IntfaBuilder { states: Vec::new(), transitions: Vec::new() }
    }

    fn state(&mut self, terminal: Option<StrId>) -> u32 {
        self.states.push(IntfaState { terminal, transitions: Vec::new() });
        self.states.len() as u32 - 1
    }

    fn range(&mut self, from: u32, lo: u8, hi: u8, to: u32) {
        let idx = self.transitions.len() as u32;
        self.transitions.push(IntfaTransition { lo, hi, dest: to });
        self.states[from as usize].transitions.push(idx);
    }

    fn byte(&mut self, from: u32, b: u8, to: u32) {
        self.range(from, b, b, to);
    }

    fn build(self) -> IntFa {
        IntFa { states: self.states, transitions: self.transitions }
    }
}

/// The single lexical automaton: a union DFA over every terminal of the
/// grammar, longest match.
fn lexer(s: &mut Strings) -> IntFa {
    let lbrace = s.intern("lbrace");
    let rbrace = s.intern("rbrace");
    let lbracket = s.intern("lbracket");
    let rbracket = s.intern("rbracket");
    let colon = s.intern("colon");
    let comma = s.intern("comma");
    let string = s.intern("string");
    let number = s.intern("number");
    let true_ = s.intern("true");
    let false_ = s.intern("false");
    let null = s.intern("null");
    let whitespace = s.intern("whitespace");

    let mut fa = IntfaBuilder::new();
    let start = fa.state(None);
    let st_lbrace = fa.state(Some(lbrace));
    let st_rbrace = fa.state(Some(rbrace));
    let st_lbracket = fa.state(Some(lbracket));
    let st_rbracket = fa.state(Some(rbracket));
    let st_colon = fa.state(Some(colon));
    let st_comma = fa.state(Some(comma));
    let st_ws = fa.state(Some(whitespace));
    let st_instr = fa.state(None);
    let st_esc = fa.state(None);
    let st_strdone = fa.state(Some(string));
    let st_neg = fa.state(None);
    let st_int = fa.state(Some(number));
    let st_dot = fa.state(None);
    let st_frac = fa.state(Some(number));

    fa.byte(start, b'{', st_lbrace);
    fa.byte(start, b'}', st_rbrace);
    fa.byte(start, b'[', st_lbracket);
    fa.byte(start, b']', st_rbracket);
    fa.byte(start, b':', st_colon);
    fa.byte(start, b',', st_comma);

    // whitespace: tab, lf, cr, space
    fa.range(start, b'\t', b'\n', st_ws);
    fa.byte(start, b'\r', st_ws);
    fa.byte(start, b' ', st_ws);
    fa.range(st_ws, b'\t', b'\n', st_ws);
    fa.byte(st_ws, b'\r', st_ws);
    fa.byte(st_ws, b' ', st_ws);

    // strings: anything but quote/backslash loops, escapes take one byte
    fa.byte(start, b'"', st_instr);
    fa.range(st_instr, 0, b'"' - 1, st_instr);
    fa.range(st_instr, b'"' + 1, b'\\' - 1, st_instr);
    fa.range(st_instr, b'\\' + 1, 255, st_instr);
    fa.byte(st_instr, b'"', st_strdone);
    fa.byte(st_instr, b'\\', st_esc);
    fa.range(st_esc, 0, 255, st_instr);

    // numbers: optional minus, digits, optional fraction
    fa.byte(start, b'-', st_neg);
    fa.range(start, b'0', b'9', st_int);
    fa.range(st_neg, b'0', b'9', st_int);
    fa.range(st_int, b'0', b'9', st_int);
    fa.byte(st_int, b'.', st_dot);
    fa.range(st_dot, b'0', b'9', st_frac);
    fa.range(st_frac, b'0', b'9', st_frac);

    // keyword chains
    let chain = |fa: &mut IntfaBuilder, word: &[u8], terminal: StrId| {
        let mut cur = start;
        for (i, &b) in word.iter().enumerate() {
            let last = i == word.len() - 1;
            let next = fa.state(if last { Some(terminal) } else { None });
            fa.byte(cur, b, next);
            cur = next;
        }
    };
    chain(&mut fa, b"true", true_);
    chain(&mut fa, b"false", false_);
    chain(&mut fa, b"null", null);

    fa.build()
}

/// Build the JSON-subset grammar. Entry rule is `value`; whitespace is
/// lexed and discarded.
pub fn json_grammar() -> Grammar {
    let mut s = Strings::new();
    let intfa = lexer(&mut s);

    let lbrace = s.intern("lbrace");
    let rbrace = s.intern("rbrace");
    let lbracket = s.intern("lbracket");
    let rbracket = s.intern("rbracket");
    let colon = s.intern("colon");
    let comma = s.intern("comma");
    let string = s.intern("string");
    let number = s.intern("number");
    let true_ = s.intern("true");
    let false_ = s.intern("false");
    let null = s.intern("null");
    let whitespace = s.intern("whitespace");

    let name_value = s.intern("value");
    let name_object = s.intern("object");
    let name_array = s.intern("array");
    let slot_key = s.intern("key");
    let slot_element = s.intern("element");

    // Lookahead for `value`: one terminal picks the alternative. Final
    // offsets are 1-based positions in value state 0's transition list.
    let gla = {
        let mut states = vec![GlaState::NonFinal { intfa: 0, transitions: Vec::new() }];
        let mut transitions = Vec::new();
        for (i, term) in
            [lbrace, lbracket, string, number, true_, false_, null].into_iter().enumerate()
        {
            states.push(GlaState::Final { transition_offset: i as u32 + 1 });
            transitions.push(GlaTransition { terminal: Some(term), dest: i as u32 + 1 });
            let idx = transitions.len() as u32 - 1;
            if let GlaState::NonFinal { transitions: ts, .. } = &mut states[0] {
                ts.push(idx);
            }
        }
        Gla { states, transitions }
    };

    let term = |label, dest, slot_name, slot_index| RtnTransition {
        label: TransitionLabel::Terminal(label),
        dest,
        slot_name,
        slot_index,
    };
    let rule = |rtn, dest, slot_name, slot_index| RtnTransition {
        label: TransitionLabel::Rule(rtn),
        dest,
        slot_name,
        slot_index,
    };
    let state = |is_final, lookahead, transitions: &[u32]| RtnState {
        is_final,
        lookahead,
        transitions: transitions.to_vec(),
    };

    // value := object | array | string | number | true | false | null
    let value = Rtn {
        name: name_value,
        num_slots: 7,
        states: vec![
            state(false, Some(Lookahead::Gla(0)), &[0, 1, 2, 3, 4, 5, 6]),
            state(true, None, &[]),
        ],
        transitions: vec![
            rule(1, 1, name_object, 0),
            rule(2, 1, name_array, 1),
            term(string, 1, string, 2),
            term(number, 1, number, 3),
            term(true_, 1, true_, 4),
            term(false_, 1, false_, 5),
            term(null, 1, null, 6),
        ],
    };

    // object := lbrace (string colon value (comma string colon value)*)? rbrace
    let object = Rtn {
        name: name_object,
        num_slots: 6,
        states: vec![
            state(false, Some(Lookahead::Intfa(0)), &[0]),
            state(false, Some(Lookahead::Intfa(0)), &[1, 2]),
            state(false, Some(Lookahead::Intfa(0)), &[3]),
            state(false, None, &[4]),
            state(false, Some(Lookahead::Intfa(0)), &[5, 1]),
            state(true, None, &[]),
            state(false, Some(Lookahead::Intfa(0)), &[2]),
        ],
        transitions: vec![
            term(lbrace, 1, lbrace, 0),
            term(rbrace, 5, rbrace, 1),
            term(string, 2, slot_key, 2),
            term(colon, 3, colon, 3),
            rule(0, 4, name_value, 4),
            term(comma, 6, comma, 5),
        ],
    };

    // array := lbracket (value (comma value)*)? rbracket
    let array = Rtn {
        name: name_array,
        num_slots: 4,
        states: vec![
            state(false, Some(Lookahead::Intfa(0)), &[0]),
            state(false, Some(Lookahead::Intfa(0)), &[1, 2]),
            state(false, Some(Lookahead::Intfa(0)), &[3, 1]),
            state(false, None, &[4]),
            state(true, None, &[]),
        ],
        transitions: vec![
            term(lbracket, 1, lbracket, 0),
            term(rbracket, 4, rbracket, 1),
            rule(0, 2, slot_element, 2),
            term(comma, 3, comma, 3),
            rule(0, 2, slot_element, 2),
        ],
    };

    let g = Grammar {
        name: Some("json".to_string()),
        strings: s.pool,
        rtns: vec![value, object, array],
        glas: vec![gla],
        intfas: vec![intfa],
        ignored: vec![whitespace],
    };
    debug_assert!(g.validate().is_ok());
    g
}
