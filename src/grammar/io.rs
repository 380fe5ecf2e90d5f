// src/grammar/io.rs
// Artifact (de)serialization for the grammar model: the compact .gzc binary
// form built on the bitcode record stream, and a JSON debug form using
// on-disk mirror structs. Loading never panics or exits on malformed input;
// it reports `GrammarError` and drops any partial model.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::bitcode::{self, Record, Records, Writer};
use super::model::{
    Gla, GlaState, GlaTransition, Grammar, IntFa, IntfaState, IntfaTransition, Lookahead, Rtn,
    RtnState, RtnTransition, TransitionLabel,
};

#[derive(Debug)]
pub enum GrammarError {
    /// Structural violation or truncated record in the artifact.
    Bad(String),
    /// Underlying read failure (file and reader entry points only).
    Io(std::io::Error),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::Bad(msg) => write!(f, "bad grammar: {msg}"),
            GrammarError::Io(e) => write!(f, "grammar i/o error: {e}"),
        }
    }
}

impl std::error::Error for GrammarError {}

impl From<std::io::Error> for GrammarError {
    fn from(e: std::io::Error) -> Self {
        GrammarError::Io(e)
    }
}

fn bad(msg: impl Into<String>) -> GrammarError {
    GrammarError::Bad(msg.into())
}

// -------------------- binary (.gzc) load --------------------

pub fn load_grammar_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarError> {
    let data = std::fs::read(path)?;
    load_grammar_bytes(&data)
}

pub fn load_grammar_bytes(data: &[u8]) -> Result<Grammar, GrammarError> {
    let mut g = Grammar {
        name: None,
        strings: Vec::new(),
        rtns: Vec::new(),
        glas: Vec::new(),
        intfas: Vec::new(),
        ignored: Vec::new(),
    };

    let mut blocks = Records::open(data).map_err(bad)?;
    while let Some(block) = blocks.next().map_err(bad)? {
        match block.tag {
            bitcode::BLOCK_HEADER => load_header(&block, &mut g)?,
            bitcode::BLOCK_STRINGS => load_strings(&block, &mut g)?,
            bitcode::BLOCK_RTNS => {
                let mut recs = block.records();
                while let Some(rec) = recs.next().map_err(bad)? {
                    match rec.tag {
                        bitcode::REC_RTN => g.rtns.push(load_rtn(&rec)?),
                        tag => skip_unknown("rtns block", tag),
                    }
                }
            }
            bitcode::BLOCK_GLAS => {
                let mut recs = block.records();
                while let Some(rec) = recs.next().map_err(bad)? {
                    match rec.tag {
                        bitcode::REC_GLA => g.glas.push(load_gla(&rec)?),
                        tag => skip_unknown("glas block", tag),
                    }
                }
            }
            bitcode::BLOCK_INTFAS => {
                let mut recs = block.records();
                while let Some(rec) = recs.next().map_err(bad)? {
                    match rec.tag {
                        bitcode::REC_INTFA => g.intfas.push(load_intfa(&rec)?),
                        tag => skip_unknown("intfas block", tag),
                    }
                }
            }
            tag => skip_unknown("artifact", tag),
        }
    }

    g.validate().map_err(bad)?;
    log::debug!(
        "loaded grammar{}: {} strings, {} rtns, {} glas, {} intfas",
        g.name.as_deref().map(|n| format!(" {n:?}")).unwrap_or_default(),
        g.strings.len(),
        g.rtns.len(),
        g.glas.len(),
        g.intfas.len()
    );
    Ok(g)
}

fn skip_unknown(ctx: &str, tag: u32) {
    log::warn!("skipping unknown record tag {tag} in {ctx}");
}

fn load_header(block: &Record<'_>, g: &mut Grammar) -> Result<(), GrammarError> {
    let mut recs = block.records();
    while let Some(rec) = recs.next().map_err(bad)? {
        match rec.tag {
            bitcode::REC_NAME => {
                g.name = Some(rec.fields().str_rest().map_err(bad)?.to_string());
            }
            bitcode::REC_IGNORED => {
                let mut f = rec.fields();
                let n = f.u32().map_err(bad)?;
                for _ in 0..n {
                    g.ignored.push(f.u32().map_err(bad)?);
                }
                f.done().map_err(bad)?;
            }
            tag => skip_unknown("header block", tag),
        }
    }
    Ok(())
}

fn load_strings(block: &Record<'_>, g: &mut Grammar) -> Result<(), GrammarError> {
    let mut recs = block.records();
    while let Some(rec) = recs.next().map_err(bad)? {
        match rec.tag {
            bitcode::REC_STRING => {
                g.strings.push(rec.fields().str_rest().map_err(bad)?.to_string());
            }
            tag => skip_unknown("strings block", tag),
        }
    }
    Ok(())
}

fn load_rtn(rec: &Record<'_>) -> Result<Rtn, GrammarError> {
    let mut rtn = Rtn { name: 0, num_slots: 0, states: Vec::new(), transitions: Vec::new() };
    let mut saw_info = false;
    let mut recs = rec.records();
    while let Some(sub) = recs.next().map_err(bad)? {
        match sub.tag {
            bitcode::REC_RTN_INFO => {
                let mut f = sub.fields();
                rtn.name = f.u32().map_err(bad)?;
                rtn.num_slots = f.u32().map_err(bad)?;
                f.done().map_err(bad)?;
                saw_info = true;
            }
            bitcode::REC_RTN_STATE => {
                let mut f = sub.fields();
                let is_final = f.u8().map_err(bad)? != 0;
                let kind = f.u8().map_err(bad)?;
                let idx = f.u32().map_err(bad)?;
                let lookahead = match kind {
                    0 => None,
                    1 => Some(Lookahead::Intfa(idx)),
                    2 => Some(Lookahead::Gla(idx)),
                    k => return Err(bad(format!("rtn state: unknown lookahead kind {k}"))),
                };
                let n = f.u32().map_err(bad)?;
                let mut transitions = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    transitions.push(f.u32().map_err(bad)?);
                }
                f.done().map_err(bad)?;
                rtn.states.push(RtnState { is_final, lookahead, transitions });
            }
            bitcode::REC_RTN_TRANS => {
                let mut f = sub.fields();
                let kind = f.u8().map_err(bad)?;
                let label = f.u32().map_err(bad)?;
                let label = match kind {
                    0 => TransitionLabel::Terminal(label),
                    1 => TransitionLabel::Rule(label),
                    k => return Err(bad(format!("rtn transition: unknown label kind {k}"))),
                };
                let dest = f.u32().map_err(bad)?;
                let slot_name = f.u32().map_err(bad)?;
                let slot_index = f.u32().map_err(bad)?;
                f.done().map_err(bad)?;
                rtn.transitions.push(RtnTransition { label, dest, slot_name, slot_index });
            }
            tag => skip_unknown("rtn record", tag),
        }
    }
    if !saw_info {
        return Err(bad("rtn record missing info sub-record"));
    }
    Ok(rtn)
}

fn load_gla(rec: &Record<'_>) -> Result<Gla, GrammarError> {
    let mut gla = Gla { states: Vec::new(), transitions: Vec::new() };
    let mut recs = rec.records();
    while let Some(sub) = recs.next().map_err(bad)? {
        match sub.tag {
            bitcode::REC_GLA_STATE => {
                let mut f = sub.fields();
                let kind = f.u8().map_err(bad)?;
                let state = match kind {
                    0 => {
                        let intfa = f.u32().map_err(bad)?;
                        let n = f.u32().map_err(bad)?;
                        let mut transitions = Vec::with_capacity(n as usize);
                        for _ in 0..n {
                            transitions.push(f.u32().map_err(bad)?);
                        }
                        GlaState::NonFinal { intfa, transitions }
                    }
                    1 => GlaState::Final { transition_offset: f.u32().map_err(bad)? },
                    k => return Err(bad(format!("gla state: unknown kind {k}"))),
                };
                f.done().map_err(bad)?;
                gla.states.push(state);
            }
            bitcode::REC_GLA_TRANS => {
                let mut f = sub.fields();
                let has_terminal = f.u8().map_err(bad)? != 0;
                let terminal = f.u32().map_err(bad)?;
                let dest = f.u32().map_err(bad)?;
                f.done().map_err(bad)?;
                gla.transitions.push(GlaTransition {
                    terminal: has_terminal.then_some(terminal),
                    dest,
                });
            }
            tag => skip_unknown("gla record", tag),
        }
    }
    Ok(gla)
}

fn load_intfa(rec: &Record<'_>) -> Result<IntFa, GrammarError> {
    let mut intfa = IntFa { states: Vec::new(), transitions: Vec::new() };
    let mut recs = rec.records();
    while let Some(sub) = recs.next().map_err(bad)? {
        match sub.tag {
            bitcode::REC_INTFA_STATE => {
                let mut f = sub.fields();
                let has_terminal = f.u8().map_err(bad)? != 0;
                let terminal = f.u32().map_err(bad)?;
                let n = f.u32().map_err(bad)?;
                let mut transitions = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    transitions.push(f.u32().map_err(bad)?);
                }
                f.done().map_err(bad)?;
                intfa.states.push(IntfaState {
                    terminal: has_terminal.then_some(terminal),
                    transitions,
                });
            }
            bitcode::REC_INTFA_TRANS => {
                let mut f = sub.fields();
                let lo = f.u8().map_err(bad)?;
                let hi = f.u8().map_err(bad)?;
                let dest = f.u32().map_err(bad)?;
                f.done().map_err(bad)?;
                intfa.transitions.push(IntfaTransition { lo, hi, dest });
            }
            tag => skip_unknown("intfa record", tag),
        }
    }
    Ok(intfa)
}

// -------------------- binary (.gzc) save --------------------

pub fn save_grammar_file(path: impl AsRef<Path>, g: &Grammar) -> std::io::Result<()> {
    let bytes = save_grammar_bytes(g);
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    w.write_all(&bytes)?;
    w.flush()
}

pub fn save_grammar_bytes(g: &Grammar) -> Vec<u8> {
    let mut out = Writer::artifact();

    let mut header = Writer::payload();
    if let Some(name) = &g.name {
        header.record(bitcode::REC_NAME, name.as_bytes());
    }
    if !g.ignored.is_empty() {
        let mut p = Writer::payload();
        p.u32(g.ignored.len() as u32);
        for &id in &g.ignored {
            p.u32(id);
        }
        header.record(bitcode::REC_IGNORED, p.bytes());
    }
    out.record(bitcode::BLOCK_HEADER, header.bytes());

    let mut strings = Writer::payload();
    for s in &g.strings {
        strings.record(bitcode::REC_STRING, s.as_bytes());
    }
    out.record(bitcode::BLOCK_STRINGS, strings.bytes());

    let mut rtns = Writer::payload();
    for rtn in &g.rtns {
        let mut r = Writer::payload();
        let mut info = Writer::payload();
        info.u32(rtn.name);
        info.u32(rtn.num_slots);
        r.record(bitcode::REC_RTN_INFO, info.bytes());
        for st in &rtn.states {
            let mut p = Writer::payload();
            p.u8(st.is_final as u8);
            let (kind, idx) = match st.lookahead {
                None => (0u8, 0u32),
                Some(Lookahead::Intfa(i)) => (1, i),
                Some(Lookahead::Gla(gi)) => (2, gi),
            };
            p.u8(kind);
            p.u32(idx);
            p.u32(st.transitions.len() as u32);
            for &t in &st.transitions {
                p.u32(t);
            }
            r.record(bitcode::REC_RTN_STATE, p.bytes());
        }
        for t in &rtn.transitions {
            let mut p = Writer::payload();
            let (kind, label) = match t.label {
                TransitionLabel::Terminal(s) => (0u8, s),
                TransitionLabel::Rule(ri) => (1, ri),
            };
            p.u8(kind);
            p.u32(label);
            p.u32(t.dest);
            p.u32(t.slot_name);
            p.u32(t.slot_index);
            r.record(bitcode::REC_RTN_TRANS, p.bytes());
        }
        rtns.record(bitcode::REC_RTN, r.bytes());
    }
    out.record(bitcode::BLOCK_RTNS, rtns.bytes());

    let mut glas = Writer::payload();
    for gla in &g.glas {
        let mut r = Writer::payload();
        for st in &gla.states {
            let mut p = Writer::payload();
            match st {
                GlaState::NonFinal { intfa, transitions } => {
                    p.u8(0);
                    p.u32(*intfa);
                    p.u32(transitions.len() as u32);
                    for &t in transitions {
                        p.u32(t);
                    }
                }
                GlaState::Final { transition_offset } => {
                    p.u8(1);
                    p.u32(*transition_offset);
                }
            }
            r.record(bitcode::REC_GLA_STATE, p.bytes());
        }
        for t in &gla.transitions {
            let mut p = Writer::payload();
            p.u8(t.terminal.is_some() as u8);
            p.u32(t.terminal.unwrap_or(0));
            p.u32(t.dest);
            r.record(bitcode::REC_GLA_TRANS, p.bytes());
        }
        glas.record(bitcode::REC_GLA, r.bytes());
    }
    out.record(bitcode::BLOCK_GLAS, glas.bytes());

    let mut intfas = Writer::payload();
    for intfa in &g.intfas {
        let mut r = Writer::payload();
        for st in &intfa.states {
            let mut p = Writer::payload();
            p.u8(st.terminal.is_some() as u8);
            p.u32(st.terminal.unwrap_or(0));
            p.u32(st.transitions.len() as u32);
            for &t in &st.transitions {
                p.u32(t);
            }
            r.record(bitcode::REC_INTFA_STATE, p.bytes());
        }
        for t in &intfa.transitions {
            let mut p = Writer::payload();
            p.u8(t.lo);
            p.u8(t.hi);
            p.u32(t.dest);
            r.record(bitcode::REC_INTFA_TRANS, p.bytes());
        }
        intfas.record(bitcode::REC_INTFA, r.bytes());
    }
    out.record(bitcode::BLOCK_INTFAS, intfas.bytes());

    out.into_bytes()
}

// -------------------- JSON (de)serialization --------------------

#[derive(Serialize, Deserialize)]
struct GrammarDisk {
    name: Option<String>,
    strings: Vec<String>,
    rtns: Vec<RtnDisk>,
    glas: Vec<GlaDisk>,
    intfas: Vec<IntfaDisk>,
    #[serde(default)]
    ignored: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct RtnDisk {
    name: u32,
    num_slots: u32,
    states: Vec<RtnStateDisk>,
    transitions: Vec<RtnTransDisk>,
}

#[derive(Serialize, Deserialize)]
struct RtnStateDisk {
    is_final: bool,
    lookahead: Option<LookaheadDisk>,
    transitions: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
enum LookaheadDisk {
    Intfa(u32),
    Gla(u32),
}

#[derive(Serialize, Deserialize)]
struct RtnTransDisk {
    label: LabelDisk,
    dest: u32,
    slot_name: u32,
    slot_index: u32,
}

#[derive(Serialize, Deserialize)]
enum LabelDisk {
    Terminal(u32),
    Rule(u32),
}

#[derive(Serialize, Deserialize)]
struct GlaDisk {
    states: Vec<GlaStateDisk>,
    transitions: Vec<GlaTransDisk>,
}

#[derive(Serialize, Deserialize)]
enum GlaStateDisk {
    NonFinal { intfa: u32, transitions: Vec<u32> },
    Final { transition_offset: u32 },
}

#[derive(Serialize, Deserialize)]
struct GlaTransDisk {
    terminal: Option<u32>,
    dest: u32,
}

#[derive(Serialize, Deserialize)]
struct IntfaDisk {
    states: Vec<IntfaStateDisk>,
    transitions: Vec<IntfaTransDisk>,
}

#[derive(Serialize, Deserialize)]
struct IntfaStateDisk {
    terminal: Option<u32>,
    transitions: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct IntfaTransDisk {
    lo: u8,
    hi: u8,
    dest: u32,
}

impl From<&Grammar> for GrammarDisk {
    fn from(g: &Grammar) -> Self {
        GrammarDisk {
            name: g.name.clone(),
            strings: g.strings.clone(),
            rtns: g
                .rtns
                .iter()
                .map(|r| RtnDisk {
                    name: r.name,
                    num_slots: r.num_slots,
                    states: r
                        .states
                        .iter()
                        .map(|s| RtnStateDisk {
                            is_final: s.is_final,
                            lookahead: s.lookahead.map(|l| match l {
                                Lookahead::Intfa(i) => LookaheadDisk::Intfa(i),
                                Lookahead::Gla(gi) => LookaheadDisk::Gla(gi),
                            }),
                            transitions: s.transitions.clone(),
                        })
                        .collect(),
                    transitions: r
                        .transitions
                        .iter()
                        .map(|t| RtnTransDisk {
                            label: match t.label {
                                TransitionLabel::Terminal(s) => LabelDisk::Terminal(s),
                                TransitionLabel::Rule(ri) => LabelDisk::Rule(ri),
                            },
                            dest: t.dest,
                            slot_name: t.slot_name,
                            slot_index: t.slot_index,
                        })
                        .collect(),
                })
                .collect(),
            glas: g
                .glas
                .iter()
                .map(|gla| GlaDisk {
                    states: gla
                        .states
                        .iter()
                        .map(|s| match s {
                            GlaState::NonFinal { intfa, transitions } => GlaStateDisk::NonFinal {
                                intfa: *intfa,
                                transitions: transitions.clone(),
                            },
                            GlaState::Final { transition_offset } => {
                                GlaStateDisk::Final { transition_offset: *transition_offset }
                            }
                        })
                        .collect(),
                    transitions: gla
                        .transitions
                        .iter()
                        .map(|t| GlaTransDisk { terminal: t.terminal, dest: t.dest })
                        .collect(),
                })
                .collect(),
            intfas: g
                .intfas
                .iter()
                .map(|fa| IntfaDisk {
                    states: fa
                        .states
                        .iter()
                        .map(|s| IntfaStateDisk {
                            terminal: s.terminal,
                            transitions: s.transitions.clone(),
                        })
                        .collect(),
                    transitions: fa
                        .transitions
                        .iter()
                        .map(|t| IntfaTransDisk { lo: t.lo, hi: t.hi, dest: t.dest })
                        .collect(),
                })
                .collect(),
            ignored: g.ignored.clone(),
        }
    }
}

impl GrammarDisk {
    fn into_grammar(self) -> Grammar {
        Grammar {
            name: self.name,
            strings: self.strings,
            rtns: self
                .rtns
                .into_iter()
                .map(|r| Rtn {
                    name: r.name,
                    num_slots: r.num_slots,
                    states: r
                        .states
                        .into_iter()
                        .map(|s| RtnState {
                            is_final: s.is_final,
                            lookahead: s.lookahead.map(|l| match l {
                                LookaheadDisk::Intfa(i) => Lookahead::Intfa(i),
                                LookaheadDisk::Gla(gi) => Lookahead::Gla(gi),
                            }),
                            transitions: s.transitions,
                        })
                        .collect(),
                    transitions: r
                        .transitions
                        .into_iter()
                        .map(|t| RtnTransition {
                            label: match t.label {
                                LabelDisk::Terminal(s) => TransitionLabel::Terminal(s),
                                LabelDisk::Rule(ri) => TransitionLabel::Rule(ri),
                            },
                            dest: t.dest,
                            slot_name: t.slot_name,
                            slot_index: t.slot_index,
                        })
                        .collect(),
                })
                .collect(),
            glas: self
                .glas
                .into_iter()
                .map(|gla| Gla {
                    states: gla
                        .states
                        .into_iter()
                        .map(|s| match s {
                            GlaStateDisk::NonFinal { intfa, transitions } => {
                                GlaState::NonFinal { intfa, transitions }
                            }
                            GlaStateDisk::Final { transition_offset } => {
                                GlaState::Final { transition_offset }
                            }
                        })
                        .collect(),
                    transitions: gla
                        .transitions
                        .into_iter()
                        .map(|t| GlaTransition { terminal: t.terminal, dest: t.dest })
                        .collect(),
                })
                .collect(),
            intfas: self
                .intfas
                .into_iter()
                .map(|fa| IntFa {
                    states: fa
                        .states
                        .into_iter()
                        .map(|s| IntfaState { terminal: s.terminal, transitions: s.transitions })
                        .collect(),
                    transitions: fa
                        .transitions
                        .into_iter()
                        .map(|t| IntfaTransition { lo: t.lo, hi: t.hi, dest: t.dest })
                        .collect(),
                })
                .collect(),
            ignored: self.ignored,
        }
    }
}

pub fn save_grammar_json(path: impl AsRef<Path>, g: &Grammar) -> std::io::Result<()> {
    // Stream to disk to avoid giant intermediate strings.
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, &GrammarDisk::from(g))?;
    w.flush()
}

pub fn load_grammar_json_bytes(data: &[u8]) -> Result<Grammar, GrammarError> {
    let disk: GrammarDisk = serde_json::from_slice(data)
        .map_err(|e| bad(format!("failed to parse grammar JSON: {e}")))?;
    let g = disk.into_grammar();
    g.validate().map_err(bad)?;
    Ok(g)
}

pub fn load_grammar_json_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarError> {
    let data = std::fs::read(path)?;
    load_grammar_json_bytes(&data)
}
