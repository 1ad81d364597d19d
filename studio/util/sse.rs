use std::io::{self, Write};

/// Status line and headers for an SSE stream, written by hand because the
/// handler takes over the raw connection.
pub const SSE_PREAMBLE: &str = "HTTP/1.1 200 OK\r\n\
                                Content-Type: text/event-stream\r\n\
                                Cache-Control: no-cache\r\n\
                                Connection: keep-alive\r\n\
                                X-Accel-Buffering: no\r\n\
                                \r\n";

/// Formats a named SSE event with a JSON data payload.
///
/// Output format:
/// ```text
/// event: <name>
/// data: <json>
///
/// ```
pub fn format_sse_event(event_name: &str, json_data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event_name, json_data)
}

/// SSE comment line; ignored by `EventSource` but keeps idle proxies from
/// closing the connection.
pub const KEEPALIVE: &str = ": ping\n\n";

/// Writes all bytes and flushes, returning `Err` on any I/O failure
/// (usually the browser went away).
pub fn write_frame<W: Write + ?Sized>(w: &mut W, frame: &str) -> io::Result<()> {
    w.write_all(frame.as_bytes())?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_layout() {
        assert_eq!(format_sse_event("done", "{}"), "event: done\ndata: {}\n\n");
        let mut buf = Vec::new();
        write_frame(&mut buf, KEEPALIVE).unwrap();
        assert_eq!(buf, b": ping\n\n");
    }
}
