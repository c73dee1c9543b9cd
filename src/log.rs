//! Log sinks for per-operation façade messages.
//!
//! The façade formats one message per operation and hands it to its sink.
//! Sinks must not fail; a sink that cannot write drops the message.

/// Receives one message per façade operation.
pub trait LogSink: Send + Sync {
    fn on_log(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl LogSink for NoopLog {
    fn on_log(&self, _message: &str) {}
}

/// Forwards messages to `tracing` at debug level under the `typedkv` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn on_log(&self, message: &str) {
        tracing::debug!(target: "typedkv", "{message}");
    }
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_log(&self, message: &str) {
        self(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |msg: &str| seen.lock().push(msg.to_string())
        };
        sink.on_log("KV.put -> key: a");
        NoopLog.on_log("dropped");
        assert_eq!(*seen.lock(), vec!["KV.put -> key: a".to_string()]);
    }
}
