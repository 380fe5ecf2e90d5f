// src/grammar/model.rs
// In-memory model of a compiled grammar: an interned string pool plus the
// three automaton pools (RTNs, GLAs, IntFAs). Immutable once loaded; all
// cross-references are indices into the owning pools, so the Grammar is the
// single owner and runtime structures refer to it by index.

use hashbrown::HashSet;

/// Index into `Grammar::strings`.
pub type StrId = u32;

/// Edge label of an RTN transition: a terminal name or a referenced rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionLabel {
    Terminal(StrId),
    Rule(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtnTransition {
    pub label: TransitionLabel,
    /// Destination state within the owning RTN.
    pub dest: u32,
    pub slot_name: StrId,
    pub slot_index: u32,
}

/// Which automaton resolves the next step out of an RTN state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
    Intfa(u32),
    Gla(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtnState {
    pub is_final: bool,
    /// `None` when the state needs no lookahead: it is either a final state
    /// with no transitions, or its single transition is a rule reference.
    pub lookahead: Option<Lookahead>,
    /// Indices into the owning RTN's transition pool.
    pub transitions: Vec<u32>,
}

/// One rule of the grammar: a named state machine whose edges are terminals
/// or references to other rules. State 0 is the start state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtn {
    pub name: StrId,
    pub num_slots: u32,
    pub states: Vec<RtnState>,
    pub transitions: Vec<RtnTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlaTransition {
    /// `None` is the distinguished end-of-input terminal.
    pub terminal: Option<StrId>,
    pub dest: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlaState {
    /// Needs more lookahead; `intfa` lexes the next terminal when the token
    /// buffer runs dry.
    NonFinal { intfa: u32, transitions: Vec<u32> },
    /// Lookahead resolved; `transition_offset` is a 1-based selector into
    /// the transitions of the RTN state that pushed this GLA. Offset 0 is
    /// reserved and rejected at load time.
    Final { transition_offset: u32 },
}

/// Lookahead DFA over terminal names. State 0 is the start state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gla {
    pub states: Vec<GlaState>,
    pub transitions: Vec<GlaTransition>,
}

/// Byte-range edge: matches any byte in `lo..=hi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntfaTransition {
    pub lo: u8,
    pub hi: u8,
    pub dest: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntfaState {
    /// `Some(name)` marks an accepting state recognizing that terminal.
    pub terminal: Option<StrId>,
    pub transitions: Vec<u32>,
}

/// Lexical DFA over byte values. State 0 is the start state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntFa {
    pub states: Vec<IntfaState>,
    pub transitions: Vec<IntfaTransition>,
}

/// A complete compiled grammar. The entry rule is `rtns[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: Option<String>,
    pub strings: Vec<String>,
    pub rtns: Vec<Rtn>,
    pub glas: Vec<Gla>,
    pub intfas: Vec<IntFa>,
    /// Terminals lexed and discarded without ever entering the token buffer
    /// (whitespace and the like).
    pub ignored: Vec<StrId>,
}

impl Grammar {
    #[inline]
    pub fn str(&self, id: StrId) -> &str {
        &self.strings[id as usize]
    }

    #[inline]
    pub fn is_ignored(&self, id: StrId) -> bool {
        self.ignored.contains(&id)
    }

    /// Structural contract shared by the artifact loader and hand-built
    /// grammars. Every cross-reference must resolve, every automaton must
    /// have a start state, and the per-state determinism rules must hold.
    pub fn validate(&self) -> Result<(), String> {
        let nstr = self.strings.len() as u32;
        let check_str = |id: StrId, what: &str| {
            if id >= nstr {
                Err(format!("{what}: string index {id} out of range ({nstr})"))
            } else {
                Ok(())
            }
        };

        if self.rtns.is_empty() {
            return Err("grammar has no rules (entry point missing)".into());
        }
        for &id in &self.ignored {
            check_str(id, "ignored terminal")?;
        }

        for (ri, rtn) in self.rtns.iter().enumerate() {
            check_str(rtn.name, "rtn name")?;
            if rtn.states.is_empty() {
                return Err(format!("rtn {ri} has no states"));
            }
            for (ti, t) in rtn.transitions.iter().enumerate() {
                if t.dest as usize >= rtn.states.len() {
                    return Err(format!(
                        "rtn {ri} transition {ti}: dest state {} out of range",
                        t.dest
                    ));
                }
                check_str(t.slot_name, "slot name")?;
                if t.slot_index >= rtn.num_slots {
                    return Err(format!(
                        "rtn {ri} transition {ti}: slot {} out of range ({})",
                        t.slot_index, rtn.num_slots
                    ));
                }
                match t.label {
                    TransitionLabel::Terminal(s) => check_str(s, "terminal label")?,
                    TransitionLabel::Rule(r) => {
                        if r as usize >= self.rtns.len() {
                            return Err(format!(
                                "rtn {ri} transition {ti}: rule index {r} out of range"
                            ));
                        }
                    }
                }
            }
            for (si, st) in rtn.states.iter().enumerate() {
                match st.lookahead {
                    Some(Lookahead::Intfa(i)) if i as usize >= self.intfas.len() => {
                        return Err(format!("rtn {ri} state {si}: intfa {i} out of range"));
                    }
                    Some(Lookahead::Gla(g)) if g as usize >= self.glas.len() => {
                        return Err(format!("rtn {ri} state {si}: gla {g} out of range"));
                    }
                    _ => {}
                }
                let mut seen_terms: HashSet<StrId> = HashSet::new();
                let mut num_rules = 0usize;
                let mut num_terms = 0usize;
                for &idx in &st.transitions {
                    let t = rtn
                        .transitions
                        .get(idx as usize)
                        .ok_or_else(|| format!("rtn {ri} state {si}: transition index {idx} out of range"))?;
                    match t.label {
                        TransitionLabel::Terminal(s) => {
                            num_terms += 1;
                            if !seen_terms.insert(s) {
                                return Err(format!(
                                    "rtn {ri} state {si}: duplicate transition on terminal {:?}",
                                    self.str(s)
                                ));
                            }
                        }
                        TransitionLabel::Rule(_) => num_rules += 1,
                    }
                }
                let has_gla = matches!(st.lookahead, Some(Lookahead::Gla(_)));
                if st.transitions.is_empty() && !st.is_final {
                    return Err(format!("rtn {ri} state {si}: dead end (non-final, no transitions)"));
                }
                if num_rules > 1 && !has_gla {
                    return Err(format!(
                        "rtn {ri} state {si}: {num_rules} rule transitions but no lookahead automaton"
                    ));
                }
                if num_terms > 0 && st.lookahead.is_none() {
                    return Err(format!(
                        "rtn {ri} state {si}: terminal transitions but no lookahead automaton"
                    ));
                }
                if st.lookahead.is_none() && st.transitions.len() > 1 {
                    return Err(format!(
                        "rtn {ri} state {si}: multiple transitions but no lookahead automaton"
                    ));
                }
            }
        }

        for (gi, gla) in self.glas.iter().enumerate() {
            if gla.states.is_empty() {
                return Err(format!("gla {gi} has no states"));
            }
            if matches!(gla.states[0], GlaState::Final { .. }) {
                return Err(format!("gla {gi}: start state is final"));
            }
            for (ti, t) in gla.transitions.iter().enumerate() {
                if t.dest as usize >= gla.states.len() {
                    return Err(format!("gla {gi} transition {ti}: dest {} out of range", t.dest));
                }
                if let Some(s) = t.terminal {
                    check_str(s, "gla terminal")?;
                }
            }
            for (si, st) in gla.states.iter().enumerate() {
                match st {
                    GlaState::Final { transition_offset } => {
                        if *transition_offset == 0 {
                            return Err(format!(
                                "gla {gi} state {si}: transition offset 0 is reserved"
                            ));
                        }
                    }
                    GlaState::NonFinal { intfa, transitions } => {
                        if *intfa as usize >= self.intfas.len() {
                            return Err(format!("gla {gi} state {si}: intfa {intfa} out of range"));
                        }
                        let mut seen: HashSet<Option<StrId>> = HashSet::new();
                        for &idx in transitions {
                            let t = gla.transitions.get(idx as usize).ok_or_else(|| {
                                format!("gla {gi} state {si}: transition index {idx} out of range")
                            })?;
                            if !seen.insert(t.terminal) {
                                return Err(format!(
                                    "gla {gi} state {si}: duplicate transition label"
                                ));
                            }
                        }
                    }
                }
            }
        }

        for (fi, intfa) in self.intfas.iter().enumerate() {
            if intfa.states.is_empty() {
                return Err(format!("intfa {fi} has no states"));
            }
            for (ti, t) in intfa.transitions.iter().enumerate() {
                if t.lo > t.hi {
                    return Err(format!(
                        "intfa {fi} transition {ti}: empty byte range {}..={}",
                        t.lo, t.hi
                    ));
                }
                if t.dest as usize >= intfa.states.len() {
                    return Err(format!("intfa {fi} transition {ti}: dest {} out of range", t.dest));
                }
            }
            for (si, st) in intfa.states.iter().enumerate() {
                if let Some(s) = st.terminal {
                    check_str(s, "intfa terminal")?;
                }
                if st.terminal.is_none() && st.transitions.is_empty() {
                    return Err(format!(
                        "intfa {fi} state {si}: dead end (non-accepting, no transitions)"
                    ));
                }
                // Outgoing ranges must be disjoint.
                let mut ranges: Vec<(u8, u8)> = Vec::with_capacity(st.transitions.len());
                for &idx in &st.transitions {
                    let t = intfa.transitions.get(idx as usize).ok_or_else(|| {
                        format!("intfa {fi} state {si}: transition index {idx} out of range")
                    })?;
                    ranges.push((t.lo, t.hi));
                }
                ranges.sort_unstable();
                for w in ranges.windows(2) {
                    if w[1].0 <= w[0].1 {
                        return Err(format!(
                            "intfa {fi} state {si}: overlapping byte ranges {}..={} and {}..={}",
                            w[0].0, w[0].1, w[1].0, w[1].1
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

impl IntFa {
    /// Follow the unique range transition out of `state` on byte `b`.
    pub fn step(&self, state: u32, b: u8) -> Option<u32> {
        let st = &self.states[state as usize];
        for &idx in &st.transitions {
            let t = &self.transitions[idx as usize];
            if t.lo <= b && b <= t.hi {
                return Some(t.dest);
            }
        }
        None
    }
}

impl Gla {
    /// Follow the transition out of `state` labeled `terminal` (`None` for
    /// end of input).
    pub fn step(&self, state: u32, terminal: Option<StrId>) -> Option<u32> {
        match &self.states[state as usize] {
            GlaState::Final { .. } => None,
            GlaState::NonFinal { transitions, .. } => {
                for &idx in transitions {
                    let t = &self.transitions[idx as usize];
                    if t.terminal == terminal {
                        return Some(t.dest);
                    }
                }
                None
            }
        }
    }
}
