// src/grammar/mod.rs
pub mod bitcode;
pub mod io;
pub mod model;

// Re-exports to keep the external API flat.
pub use io::{
    load_grammar_bytes, load_grammar_file, load_grammar_json_bytes, load_grammar_json_file,
    save_grammar_bytes, save_grammar_file, save_grammar_json, GrammarError,
};
pub use model::{
    Gla, GlaState, GlaTransition, Grammar, IntFa, IntfaState, IntfaTransition, Lookahead, Rtn,
    RtnState, RtnTransition, StrId, TransitionLabel,
};
