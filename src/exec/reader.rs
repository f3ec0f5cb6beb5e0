// src/exec/reader.rs

//! Blocking output reader.

use std::io::{BufRead, BufReader, ErrorKind, Read};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::relay::LogPublisher;
use crate::types::HandleId;

/// Read the merged output pipe on a blocking worker until EOF, publishing
/// every line in order. Resolves to the number of lines published.
pub(crate) fn spawn_output_reader<R>(
    output: R,
    publisher: LogPublisher,
    id: HandleId,
) -> JoinHandle<u64>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let count = read_lines(output, publisher, id);
        debug!(handle = %id, lines = count, "output reader reached EOF");
        count
    })
}

fn read_lines<R: Read>(output: R, mut publisher: LogPublisher, id: HandleId) -> u64 {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                publisher.publish(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(handle = %id, error = %e, "reading process output failed; stopping reader");
                break;
            }
        }
    }

    publisher.published()
}
