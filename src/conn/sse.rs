//! Server-Sent Events line framing (spec.md §4.4 "SSE framing").

/// Accumulates `event:`/`data:` fields line by line and dispatches a
/// complete event on a blank line.
#[derive(Default)]
pub struct SseBuilder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every event dispatched by a blank line found
    /// in this chunk (there may be more than one per call).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut dispatched = Vec::new();
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else { break };
            let mut line = self.buf[..pos].to_vec();
            self.buf.drain(..=pos);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                if let Some(ev) = self.dispatch() {
                    dispatched.push(ev);
                }
                continue;
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("event:") {
                self.event = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.trim_start().to_string());
            }
            // unknown fields ignored (spec.md §4.4)
        }
        dispatched
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_event_name_is_message() {
        let mut b = SseBuilder::new();
        let events = b.feed(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        let mut b = SseBuilder::new();
        let events = b.feed(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut b = SseBuilder::new();
        let events = b.feed(b":ping\ndata: hi\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hi");
    }

    #[test]
    fn two_events_in_one_feed_both_dispatch() {
        let mut b = SseBuilder::new();
        let events = b.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }
}
