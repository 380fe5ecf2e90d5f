// src/parse/file.rs
// Convenience layer that streams a reader through a session in chunks. The
// core never performs I/O; this wrapper owns the retention contract (keep
// bytes from open_terminal_offset so longest-match backoff can rewind) and
// converts leftover input after a grammar EOF into PrematureEof.

use std::io::{ErrorKind, Read};
use std::path::Path;

use super::events::ParseEvents;
use super::session::Session;
use super::Status;

const CHUNK: usize = 64 * 1024;

/// Parse the whole of `path`. See [`parse_reader`] for the status mapping.
pub fn parse_file<E: ParseEvents>(session: &mut Session<'_, E>, path: impl AsRef<Path>) -> Status {
    let file = match std::fs::File::open(path.as_ref()) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("open {}: {e}", path.as_ref().display());
            return Status::IoError;
        }
    };
    parse_reader(session, file)
}

/// Drive a session over everything `reader` yields, then `finish` it.
///
/// Returns `Ok` when the input ended and the parse completed, `HardEof` when
/// the grammar completed exactly at the end of input, `PrematureEof` when
/// input was left over or the grammar required more, `IoError` on a read
/// failure, and `Error`/`Cancelled`/`ResourceLimit` straight from the parse.
pub fn parse_reader<E: ParseEvents>(
    session: &mut Session<'_, E>,
    mut reader: impl Read,
) -> Status {
    // Retained input window; `window_base` is the absolute offset of its
    // first byte. Never trimmed past open_terminal_offset.
    let mut window: Vec<u8> = Vec::with_capacity(CHUNK);
    let mut window_base = session.offset();
    let mut buf = vec![0u8; CHUNK];
    let mut eof = false;
    let mut stalled = false;

    loop {
        if !eof {
            match reader.read(&mut buf) {
                Ok(0) => eof = true,
                Ok(n) => window.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("read failed at offset {}: {e}", session.offset());
                    return Status::IoError;
                }
            }
        }

        let before = session.offset();
        let status = session.parse(&window[before - window_base..]);
        match status {
            Status::Ok => {
                let consumed_all = session.offset() >= window_base + window.len();
                if eof {
                    if consumed_all {
                        return if session.finish() { Status::Ok } else { Status::PrematureEof };
                    }
                    if stalled && session.offset() == before {
                        let _ = session.finish();
                        return Status::PrematureEof;
                    }
                    stalled = session.offset() == before;
                }
                let keep_from = session.open_terminal_offset().min(session.offset());
                if keep_from > window_base {
                    window.drain(..keep_from - window_base);
                    window_base = keep_from;
                }
            }
            Status::HardEof => {
                // The grammar accepts nothing further; anything left in the
                // window or the reader is premature.
                let leftover = session.offset() < window_base + window.len() || {
                    if eof {
                        false
                    } else {
                        match reader.read(&mut buf) {
                            Ok(n) => n > 0,
                            Err(e) if e.kind() == ErrorKind::Interrupted => false,
                            Err(_) => return Status::IoError,
                        }
                    }
                };
                let finished = session.finish();
                if leftover || !finished {
                    return Status::PrematureEof;
                }
                return Status::HardEof;
            }
            other => return other,
        }
    }
}
