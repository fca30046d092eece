use std::sync::Mutex;

/// Append-only sink for operator-facing progress lines. The gate writes an
/// entry and exit banner always, and per-iteration progress when verbose.
pub trait ProgressSink {
    fn line(&self, message: &str);
}

pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn line(&self, message: &str) {
        println!("{message}");
    }
}

/// Captures lines in memory; used by tests and anything that wants to
/// inspect the transcript after the fact.
pub struct MemorySink(Mutex<Vec<String>>);

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink(Mutex::new(Vec::new()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Default for MemorySink {
    fn default() -> MemorySink {
        MemorySink::new()
    }
}

impl ProgressSink for MemorySink {
    fn line(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_lines_in_order() {
        let sink = MemorySink::new();
        sink.line("first");
        sink.line("second");
        assert_eq!(sink.lines(), vec!["first".to_string(), "second".to_string()]);
    }
}
