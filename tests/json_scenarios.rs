//! End-to-end scenarios against the demo JSON-subset grammar: exact event
//! streams, error positioning, EOF handling, and the resource caps.

mod common;

use common::{compact, drive, run, Event, Recorder};
use strix::dev::json_grammar;
use strix::parse::ParseConfig;
use strix::{Session, Status};

#[test]
fn empty_object() {
    let g = json_grammar();
    let (events, status, finished) = run(&g, b"{}", &[]);
    assert_eq!(status, Status::HardEof);
    assert!(finished, "finish must succeed on a complete value");
    assert_eq!(
        compact(&events),
        vec![
            "will:value",
            "did:value",
            "will:object",
            "did:object",
            "term:lbrace",
            "term:rbrace",
            "end:object",
            "ended:object",
            "end:value",
            "ended:value",
        ]
    );
}

#[test]
fn array_of_numbers() {
    let g = json_grammar();
    let (events, status, finished) = run(&g, b"[1, 2, 3]", &[]);
    assert_eq!(status, Status::HardEof);
    assert!(finished);
    assert_eq!(
        compact(&events),
        vec![
            "will:value",
            "did:value",
            "will:array",
            "did:array",
            "term:lbracket",
            "will:value",
            "did:value",
            "term:number",
            "end:value",
            "ended:value",
            "term:comma",
            "will:value",
            "did:value",
            "term:number",
            "end:value",
            "ended:value",
            "term:comma",
            "will:value",
            "did:value",
            "term:number",
            "end:value",
            "ended:value",
            "term:rbracket",
            "end:array",
            "ended:array",
            "end:value",
            "ended:value",
        ]
    );

    // Whitespace never reaches the event stream, and spans are exact.
    let numbers: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            Event::Terminal { name, offset, len, .. } if name == "number" => Some((*offset, *len)),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![(1, 1), (4, 1), (7, 1)]);
}

#[test]
fn chunked_input_is_equivalent() {
    let g = json_grammar();
    let input = b"{\"a\":1}";
    let (whole, status_whole, fin_whole) = run(&g, input, &[]);
    let (split, status_split, fin_split) = run(&g, input, &[3, 5]);
    assert_eq!(status_whole, status_split);
    assert_eq!(fin_whole, fin_split);
    assert_eq!(whole, split, "event stream must not depend on chunking");
    assert!(whole.iter().any(|e| matches!(
        e,
        Event::Terminal { name, offset: 1, len: 3, .. } if name == "string"
    )));
}

#[test]
fn missing_value_reports_the_terminal() {
    let g = json_grammar();
    let mut session = Session::new(&g, Recorder::default());
    let status = drive(&mut session, b"{\"a\":}", &[]);
    assert_eq!(status, Status::Error);
    assert_eq!(session.offset(), 5, "state must sit just before the offending terminal");
    let events = &session.events().events;
    assert_eq!(
        events.last(),
        Some(&Event::ErrorTerminal { name: "rbrace".to_string(), offset: 5 })
    );
}

#[test]
fn bad_byte_reports_the_char() {
    let g = json_grammar();
    let mut session = Session::new(&g, Recorder::default());
    let status = drive(&mut session, b"@", &[]);
    assert_eq!(status, Status::Error);
    assert_eq!(session.offset(), 0);
    assert_eq!(
        compact(&session.events().events),
        vec!["will:value", "did:value", "errchar:0x40"]
    );
}

#[test]
fn leftover_input_is_premature_eof() {
    let g = json_grammar();
    let mut session = Session::new(&g, Recorder::default());
    assert_eq!(session.parse_finalize(b"1 2", true), Status::PrematureEof);
    assert_eq!(session.offset(), 1, "the first number completes the value");
}

#[test]
fn empty_input_on_nullable_grammar() {
    let g = common::empty_grammar();
    let mut session = Session::new(&g, Recorder::default());
    assert_eq!(session.parse(b""), Status::HardEof);
    assert!(session.finish());
    assert_eq!(
        compact(&session.events().events),
        vec!["will:unit", "did:unit", "end:unit", "ended:unit"]
    );
    assert_eq!(session.depth(), 0);
}

#[test]
fn lone_terminal_where_more_is_required() {
    let g = common::pair_grammar();
    let mut session = Session::new(&g, Recorder::default());
    assert_eq!(session.parse(b"="), Status::Ok);
    assert!(!session.finish(), "grammar needs a second terminal");
    assert_eq!(session.parse_finalize(b"", true), Status::PrematureEof);
}

#[test]
fn longest_match_wins_over_prefix() {
    let g = common::prefix_grammar();

    let (events, status, finished) = run(&g, b"==", &[]);
    assert_eq!(status, Status::HardEof);
    assert!(finished);
    assert!(compact(&events).contains(&"term:eqeq".to_string()));
    assert!(!compact(&events).contains(&"term:eq".to_string()));

    // A lone '=' stays open until finish closes it as the shorter terminal.
    let mut session = Session::new(&g, Recorder::default());
    assert_eq!(session.parse(b"="), Status::Ok);
    assert!(session.finish());
    assert!(compact(&session.events().events).contains(&"term:eq".to_string()));
}

#[test]
fn longest_match_backs_off_across_chunks() {
    let g = common::prefix_grammar();
    // '=' then ';' dead-ends the lexer; the match must back off to `eq`
    // even when the bad byte arrives in its own chunk.
    let (whole, status_whole, _) = run(&g, b"=;", &[]);
    let (split, status_split, _) = run(&g, b"=;", &[1]);
    assert_eq!(status_whole, status_split);
    assert_eq!(whole, split);
}

#[test]
fn stack_depth_cap() {
    let g = json_grammar();
    let config = ParseConfig { max_stack_depth: 12, ..ParseConfig::default() };

    let shallow = b"[[[[1]]]]";
    let mut session = Session::with_config(&g, Recorder::default(), config);
    let status = drive(&mut session, shallow, &[]);
    assert_eq!(status, Status::HardEof, "nesting within the cap must parse");
    assert!(session.finish());

    let deep: Vec<u8> = b"[".iter().cycle().take(50).copied().collect();
    let mut session = Session::with_config(&g, Recorder::default(), config);
    let status = drive(&mut session, &deep, &[]);
    assert_eq!(status, Status::ResourceLimit);
    assert!(session.depth() >= 1, "state stays inspectable after the cap");
}

#[test]
fn token_buffer_cap() {
    let g = json_grammar();
    let config = ParseConfig { max_token_buffer: 0, ..ParseConfig::default() };
    let mut session = Session::with_config(&g, Recorder::default(), config);
    assert_eq!(session.parse(b"{}"), Status::ResourceLimit);
}
