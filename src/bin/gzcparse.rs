// src/bin/gzcparse.rs
// Command-line front end: parse an input file against a compiled grammar
// artifact, optionally streaming the parse as a JSON tree.
// Usage:
//   gzcparse [OPTIONS] GRAMMAR.gzc INFILE
// Input file can be '-' for stdin.

use std::io::Read;
use std::process::exit;

use anyhow::Context;

use strix::grammar::{load_grammar_file, load_grammar_json_file};
use strix::parse::{Ctl, ParseEvents, ParsePos, SlotRef, TerminalEvent};
use strix::{Grammar, Session, Status};

fn usage() {
    eprintln!("gzcparse -- parse input text with a compiled grammar artifact.");
    eprintln!();
    eprintln!("Usage: gzcparse [OPTIONS] GRAMMAR.gzc INFILE");
    eprintln!("Input file can be '-' for stdin.");
    eprintln!();
    eprintln!("  --dump-json      Dump a parse tree in JSON as text is parsed.");
    eprintln!("  --dump-total     When parsing finishes, print the number of bytes parsed.");
    eprintln!("  --dump-grammar   Print the loaded grammar's tables and exit.");
    eprintln!("  --help           You're looking at it.");
    eprintln!();
}

fn esc(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization")
}

/// Streams the parse as a JSON tree, one node per rule/terminal event.
struct JsonDump<'a> {
    src: &'a [u8],
    enabled: bool,
    // One flag per open rule: is the next child the first one?
    first_child: Vec<bool>,
    starts: Vec<usize>,
}

impl<'a> JsonDump<'a> {
    fn new(src: &'a [u8], enabled: bool) -> Self {
        JsonDump { src, enabled, first_child: Vec::new(), starts: Vec::new() }
    }

    fn newline(&mut self, suppress_comma: bool) {
        if let Some(first) = self.first_child.last_mut() {
            if *first || suppress_comma {
                *first = false;
                println!();
            } else {
                println!(",");
            }
        }
    }

    fn indent(&self) {
        for _ in 0..self.first_child.len() {
            print!("  ");
        }
    }
}

impl ParseEvents for JsonDump<'_> {
    fn on_will_start_rule(
        &mut self,
        _ctl: &mut Ctl,
        rule: &str,
        start: &ParsePos,
        slot: Option<SlotRef<'_>>,
    ) {
        if !self.enabled {
            return;
        }
        self.newline(false);
        self.indent();
        print!("{{\"rule\": {}, \"start\": {}, ", esc(rule), start.byte);
        if let Some(slot) = slot {
            print!("\"slotname\": {}, \"slotnum\": {}, ", esc(slot.name), slot.index);
        }
        print!("\"children\": [");
        self.first_child.push(true);
        self.starts.push(start.byte);
    }

    fn on_terminal(&mut self, _ctl: &mut Ctl, t: &TerminalEvent<'_>) {
        if !self.enabled {
            return;
        }
        self.newline(false);
        self.indent();
        let text = String::from_utf8_lossy(&self.src[t.offset..t.offset + t.len]);
        print!("{{\"terminal\": {}, ", esc(t.name));
        if let Some(slot) = t.slot {
            print!("\"slotname\": {}, \"slotnum\": {}, ", esc(slot.name), slot.index);
        }
        print!("\"offset\": {}, \"len\": {}, \"text\": {}}}", t.offset, t.len, esc(&text));
    }

    fn on_will_end_rule(&mut self, ctl: &mut Ctl, _rule: &str) {
        if !self.enabled {
            return;
        }
        let start = self.starts.pop().unwrap_or(0);
        self.first_child.pop();
        self.newline(true);
        self.indent();
        print!("], \"len\": {}}}", ctl.offset() - start);
    }

    fn on_error_char(&mut self, ctl: &mut Ctl, byte: u8) {
        eprintln!(
            "gzcparse: unexpected character {:?} at offset {}, aborting.",
            byte as char,
            ctl.offset()
        );
    }

    fn on_error_terminal(&mut self, _ctl: &mut Ctl, t: &TerminalEvent<'_>) {
        let text = String::from_utf8_lossy(&self.src[t.offset..t.offset + t.len]);
        eprintln!(
            "gzcparse: unexpected terminal '{}' at offset {}, aborting.",
            t.name, t.offset
        );
        eprintln!("gzcparse: terminal text is: {}.", esc(&text));
    }
}

fn dump_grammar(g: &Grammar) {
    if let Some(name) = &g.name {
        println!("grammar {name:?}");
    }
    println!("--- strings ({}) ---", g.strings.len());
    for (i, s) in g.strings.iter().enumerate() {
        println!("  [{i:3}] {s:?}");
    }
    println!("--- rtns ({}) ---", g.rtns.len());
    for (i, rtn) in g.rtns.iter().enumerate() {
        println!(
            "  [{i:3}] {} ({} states, {} transitions, {} slots)",
            g.str(rtn.name),
            rtn.states.len(),
            rtn.transitions.len(),
            rtn.num_slots
        );
        for (si, st) in rtn.states.iter().enumerate() {
            let fin = if st.is_final { " final" } else { "" };
            println!("    state {si}{fin} lookahead={:?} transitions={:?}", st.lookahead, st.transitions);
        }
        for (ti, t) in rtn.transitions.iter().enumerate() {
            let label = match t.label {
                strix::grammar::TransitionLabel::Terminal(s) => format!("terminal {:?}", g.str(s)),
                strix::grammar::TransitionLabel::Rule(r) => {
                    format!("rule {:?}", g.str(g.rtns[r as usize].name))
                }
            };
            println!(
                "    trans {ti}: {label} -> {} (slot {:?}#{})",
                t.dest,
                g.str(t.slot_name),
                t.slot_index
            );
        }
    }
    println!("--- glas ({}) ---", g.glas.len());
    for (i, gla) in g.glas.iter().enumerate() {
        println!("  [{i:3}] {} states, {} transitions", gla.states.len(), gla.transitions.len());
    }
    println!("--- intfas ({}) ---", g.intfas.len());
    for (i, fa) in g.intfas.iter().enumerate() {
        println!("  [{i:3}] {} states, {} transitions", fa.states.len(), fa.transitions.len());
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help") {
        usage();
        return Ok(());
    }

    let mut dump_json = false;
    let mut dump_total = false;
    let mut dump_tables = false;
    let mut rest = Vec::new();
    for a in &args {
        match a.as_str() {
            "--dump-json" => dump_json = true,
            "--dump-total" => dump_total = true,
            "--dump-grammar" => dump_tables = true,
            _ if a.starts_with("--") => {
                eprintln!("Unrecognized option '{a}'.");
                usage();
                exit(1);
            }
            _ => rest.push(a.clone()),
        }
    }

    if rest.is_empty() || (!dump_tables && rest.len() < 2) {
        eprintln!("Must specify grammar file and input file.");
        usage();
        exit(1);
    }

    let grammar_path = &rest[0];
    let grammar = if grammar_path.ends_with(".json") {
        load_grammar_json_file(grammar_path)
    } else {
        load_grammar_file(grammar_path)
    }
    .with_context(|| format!("loading grammar {grammar_path}"))?;

    if dump_tables {
        dump_grammar(&grammar);
        return Ok(());
    }

    let input_path = &rest[1];
    let input = if input_path == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        buf
    } else {
        std::fs::read(input_path).with_context(|| format!("reading {input_path}"))?
    };

    let mut session = Session::new(&grammar, JsonDump::new(&input, dump_json));
    if dump_json {
        print!("{{\"parse_tree\":");
    }

    let status = session.parse(&input);
    let status = match status {
        Status::Ok | Status::HardEof => {
            if session.finish() {
                if dump_json {
                    println!("\n}}");
                }
                if session.offset() < input.len() {
                    eprintln!("gzcparse: grammar hit EOF before input EOF.");
                }
                status
            } else {
                Status::PrematureEof
            }
        }
        other => other,
    };

    if dump_total {
        eprintln!("gzcparse: {} bytes parsed.", session.offset());
    }

    match status {
        Status::Ok | Status::HardEof => Ok(()),
        Status::PrematureEof => {
            eprintln!("gzcparse: premature eof.");
            exit(1);
        }
        Status::Error => {
            eprintln!("gzcparse: parse error, aborting.");
            exit(1);
        }
        other => {
            eprintln!("gzcparse: parse stopped: {other:?}.");
            exit(1);
        }
    }
}
