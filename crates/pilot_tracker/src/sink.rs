use pilot_domain::{LogKind, LogRecord, ObservabilitySink};

/// Forwards observability records to `tracing`.
///
/// Tool and result records are `info`, anomalies are `warn`, and plain info
/// records (stale event discards and the like) go to `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, record: LogRecord) {
        let data = record
            .data
            .as_ref()
            .map(|data| data.to_string())
            .unwrap_or_default();

        match record.kind {
            LogKind::Tool | LogKind::Result => {
                tracing::info!(kind = %record.kind, data = %data, "{}", record.message)
            }
            LogKind::Error => {
                tracing::warn!(kind = %record.kind, data = %data, "{}", record.message)
            }
            LogKind::Info => {
                tracing::trace!(kind = %record.kind, data = %data, "{}", record.message)
            }
        }
    }
}
