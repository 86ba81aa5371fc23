use crate::Result;
use crate::clusters::ClusterRecord;

/// Streaming sink for cluster records.
///
/// `close` finalizes the output and must be idempotent; writes after `close` fail.
pub trait ClusterEncoder {
    fn write_cluster(&mut self, cluster: &ClusterRecord) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
