// src/lib.rs
//! Streaming interpreter for compiled LL(*) grammar artifacts.
//!
//! A grammar compiled to a `.gzc` artifact is a system of mutually
//! recursive rule automata (RTNs) plus per-state lookahead DFAs (GLAs) and
//! byte-level lexical DFAs (IntFAs). [`Session`] executes one against an
//! input byte stream, chunk by chunk, emitting rule and terminal events
//! through the [`ParseEvents`] trait. The event stream is a deterministic
//! function of the grammar and the input bytes, independent of chunking.

pub mod dev;
pub mod grammar;
pub mod parse;

pub use grammar::{load_grammar_bytes, load_grammar_file, Grammar, GrammarError};
pub use parse::{
    Ctl, ParseConfig, ParseEvents, ParsePos, SlotRef, Session, Status, TerminalEvent,
};
