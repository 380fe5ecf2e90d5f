//! Determinism properties: the event stream is invariant under rechunking
//! of the input, and a duplicated session replays identically to its
//! original. Chunk boundaries are swept exhaustively for small inputs and
//! sampled with a seeded RNG for larger ones.

mod common;

use common::{drive, run, Recorder};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strix::dev::json_grammar;
use strix::{Session, Status};

const INPUTS: &[&[u8]] = &[
    b"{}",
    b"[1, 2, 3]",
    b"{\"a\":1}",
    b"{\"key\": [true, false, null], \"other\": {\"nested\": -12.5}}",
    b"[[\"x\\\"y\", 0], [], {\"\": [1.25]}]",
    b"  [ 1 ,\n\t2 ]  ",
];

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

#[test]
fn every_single_split_point() {
    let g = json_grammar();
    for input in INPUTS {
        let baseline = run(&g, input, &[]);
        for cut in 1..input.len() {
            let split = run(&g, input, &[cut]);
            assert_eq!(
                baseline, split,
                "split at {cut} diverged for {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }
}

#[test]
fn byte_at_a_time() {
    let g = json_grammar();
    for input in INPUTS {
        let baseline = run(&g, input, &[]);
        let cuts: Vec<usize> = (1..input.len()).collect();
        let split = run(&g, input, &cuts);
        assert_eq!(baseline, split, "byte-at-a-time diverged for {:?}",
            String::from_utf8_lossy(input));
    }
}

#[test]
fn random_chunkings() {
    let g = json_grammar();
    let seed = env_u64("RECHUNK_SEED", 42);
    let rounds = env_u64("RECHUNK_ROUNDS", 50) as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    for input in INPUTS {
        let baseline = run(&g, input, &[]);
        for round in 0..rounds {
            let n_cuts = rng.gen_range(0..=input.len().min(8));
            let cuts: Vec<usize> =
                (0..n_cuts).map(|_| rng.gen_range(1..=input.len())).collect();
            let split = run(&g, input, &cuts);
            assert_eq!(
                baseline, split,
                "round {round} (seed {seed}) cuts {cuts:?} diverged for {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }
}

#[test]
fn dup_replays_identically() {
    let g = json_grammar();
    let input: &[u8] = b"{\"key\": [true, false, null], \"other\": {\"nested\": -12.5}}";

    for cut in [3usize, 9, 17, 30, input.len() - 2] {
        let mut original = Session::new(&g, Recorder::default());
        let mut off = original.offset();
        while original.offset() < cut {
            let end = cut.min(input.len());
            match original.parse(&input[original.offset()..end]) {
                Status::Ok => {}
                other => panic!("prefix parse failed with {other:?}"),
            }
            assert!(original.offset() != off || original.offset() >= end, "stalled");
            off = original.offset();
        }

        let mut duplicate = original.dup();
        assert_eq!(duplicate.offset(), original.offset());
        assert_eq!(duplicate.depth(), original.depth());

        let status_a = drive(&mut original, input, &[]);
        let status_b = drive(&mut duplicate, input, &[]);
        assert_eq!(status_a, status_b);
        assert_eq!(original.finish(), duplicate.finish());
        assert_eq!(
            original.events().events,
            duplicate.events().events,
            "dup diverged after cut {cut}"
        );
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let g = json_grammar();
    for input in INPUTS {
        let a = run(&g, input, &[]);
        let b = run(&g, input, &[]);
        assert_eq!(a, b);
    }
}
