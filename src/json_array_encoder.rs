use std::io::Write;

use tracing::debug;

use crate::Result;
use crate::cluster_encoder::ClusterEncoder;
use crate::clusters::ClusterRecord;

/// Streams cluster records as one JSON array, a record per line:
///
/// ```text
/// [
/// {"id":0,"chunkIds":[0,2,4],"start":0.0,"end":75.0,"texts":"..."},
/// {"id":1,"chunkIds":[1,3],"start":15.0,"end":60.0,"texts":"..."}
/// ]
/// ```
///
/// The whole document stays valid JSON, and `head`/`grep` on the CLI output still see one
/// topic per line. Closing before any record was written produces `[]`.
pub struct JsonArrayEncoder<W: Write> {
    w: W,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing written yet.
    Pending,
    /// `[` is out, followed by `records` records.
    Open { records: usize },
    Closed,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            state: State::Pending,
        }
    }
}

impl<W: Write> ClusterEncoder for JsonArrayEncoder<W> {
    fn write_cluster(&mut self, cluster: &ClusterRecord) -> Result<()> {
        let records = match self.state {
            State::Closed => {
                return Err(crate::Error::msg(
                    "cannot write cluster: encoder is already closed",
                ));
            }
            State::Pending => {
                self.w.write_all(b"[\n")?;
                0
            }
            State::Open { records } => {
                self.w.write_all(b",\n")?;
                records
            }
        };
        self.state = State::Open { records };

        serde_json::to_writer(&mut self.w, cluster)?;
        self.w.flush()?;

        self.state = State::Open {
            records: records + 1,
        };
        Ok(())
    }

    /// Terminate the array. Idempotent.
    fn close(&mut self) -> Result<()> {
        let records = match self.state {
            State::Closed => return Ok(()),
            State::Pending => {
                self.w.write_all(b"[]\n")?;
                0
            }
            State::Open { records } => {
                self.w.write_all(b"\n]\n")?;
                records
            }
        };
        self.w.flush()?;

        self.state = State::Closed;
        debug!(records, "closed json cluster array");
        Ok(())
    }
}
