use std::time::Duration;

use tiny_http::Request;

use crate::handlers::train::status_payload;
use crate::state::{lock, SharedState};
use crate::util::sse::{format_sse_event, write_frame, KEEPALIVE, SSE_PREAMBLE};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// `GET /train/events`: streams the run's status to the Train page.
///
/// Takes ownership of `request` to write directly to the connection. Every
/// `POLL_INTERVAL` the handler compares the state's training revision with
/// the last one sent and writes a `status` frame when it moved, or a
/// keep-alive comment otherwise. Once no driver is pumping the session a
/// final `status` and a `done` frame are written and the stream closes.
pub fn handle(request: Request, state: SharedState) {
    let mut writer = request.into_writer();
    if write_frame(&mut *writer, SSE_PREAMBLE).is_err() {
        return;
    }

    let mut sent_revision: Option<u64> = None;
    loop {
        let (frame, finished) = {
            let st = lock(&state);
            let finished = !st.driving;
            let frame = if finished || sent_revision != Some(st.training_revision) {
                sent_revision = Some(st.training_revision);
                Some(format_sse_event("status", &status_payload(&st).to_string()))
            } else {
                None
            };
            (frame, finished)
        };

        let frame = frame.as_deref().unwrap_or(KEEPALIVE);
        if write_frame(&mut *writer, frame).is_err() {
            log::debug!("training event stream closed by the browser");
            return;
        }
        if finished {
            let _ = write_frame(&mut *writer, &format_sse_event("done", "{}"));
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
