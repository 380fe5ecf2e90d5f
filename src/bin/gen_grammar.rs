// src/bin/gen_grammar.rs
// Build the demo JSON-subset grammar and write its artifacts to disk.
// Usage:
//   cargo run --bin gen_grammar               # writes grammars/json.gzc (+ .json)
//   cargo run --bin gen_grammar -- /path/out.gzc

use std::{env, fs, path::Path};

use strix::dev::json_grammar;
use strix::grammar::{load_grammar_bytes, save_grammar_bytes, save_grammar_json};

fn main() {
    let out = env::args().nth(1).unwrap_or_else(|| "grammars/json.gzc".to_string());
    let out_path = Path::new(&out);

    if let Some(parent) = out_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("error: failed to create {}: {e}", parent.display());
            std::process::exit(1);
        }
    }

    println!("[gen_grammar] building demo grammar…");
    let g = json_grammar();
    let bytes = save_grammar_bytes(&g);
    println!(
        "[gen_grammar] {} strings, {} rtns, {} glas, {} intfas, artifact = {} bytes",
        g.strings.len(),
        g.rtns.len(),
        g.glas.len(),
        g.intfas.len(),
        bytes.len()
    );

    // Sanity: the artifact must load back to an equal model.
    match load_grammar_bytes(&bytes) {
        Ok(back) if back == g => {}
        Ok(_) => {
            eprintln!("error: artifact round-trip produced a different grammar");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: artifact round-trip failed: {e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = fs::write(out_path, &bytes) {
        eprintln!("error: failed to write {}: {e}", out_path.display());
        std::process::exit(1);
    }
    println!("[gen_grammar] wrote {}", out_path.display());

    let json_path = out_path.with_extension("json");
    if let Err(e) = save_grammar_json(&json_path, &g) {
        eprintln!("error: failed to write {}: {e}", json_path.display());
        std::process::exit(1);
    }
    println!("[gen_grammar] wrote {}", json_path.display());
}
