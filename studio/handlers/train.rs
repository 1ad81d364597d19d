use std::fmt::Write;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tiny_http::Request;

use netforge::train::{progress_color, EpochMetrics, AWAITING_START};
use netforge::{MetricsHistory, Phase, SocketIoConnector, TrainingStatus};

use crate::render::{render_page, tab_unlock_mask, Page};
use crate::routes::{read_form, redirect, HttpResponse};
use crate::state::{lock, FlashMessage, SharedState, StudioState};
use crate::util::form::form_get;
use crate::util::html::{confusion_matrix_table, html_escape, render_flash_html};

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// GET /train
// ---------------------------------------------------------------------------

pub fn handle_get(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    let flash   = st.take_flash();
    let phase   = st.session.phase();
    let mask    = tab_unlock_mask(st.built.is_some(), phase != Phase::Idle);
    let running = phase.is_active();
    let status  = st.session.status().clone();
    let error   = st.session.last_error().map(str::to_owned);
    let points  = st.history.points().to_vec();
    let epochs  = match st.session.epochs() {
        0 => st.config.default_epochs,
        n => n,
    };
    let can_start = st.built.is_some() && !running;
    drop(st);

    let flash_html = render_flash_html(flash.as_ref());
    crate::routes::html_response(render_page(Page::Train, mask, running, |tmpl| {
        tmpl.replace("{{FLASH}}", &flash_html)
            .replace("{{TRAIN_EPOCHS}}", &epochs.to_string())
            .replace("{{TRAIN_PROGRESS}}", &format!("{:.0}", status.progress))
            .replace("{{TRAIN_PROGRESS_COLOR}}", progress_color(status.progress))
            .replace("{{TRAIN_STATUS_MSG}}", caption(phase, &status, points.len()))
            .replace("{{TRAIN_ETA}}", &html_escape(&status.estimated_time))
            .replace("{{TRAIN_METRICS_ROWS}}", &history_rows(&points))
            .replace("{{TRAIN_CONFUSION}}", &confusion_matrix_table(&status.confusion_matrix))
            .replace("{{TRAIN_TEST_METRICS}}", &test_metrics(&status))
            .replace("{{TRAIN_PHASE}}", &phase.to_string())
            .replace("{{TRAIN_ERROR}}", &error
                .map(|e| format!(r#"<div class="flash flash-error">{}</div>"#, html_escape(&e)))
                .unwrap_or_default())
            .replace("{{TRAIN_DISABLED}}", if can_start { "" } else { "disabled" })
    }))
}

// ---------------------------------------------------------------------------
// POST /train/start
// ---------------------------------------------------------------------------

pub fn handle_start(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let epochs: u32 = match form_get(&pairs, "epochs").map(str::trim).unwrap_or("").parse() {
        Ok(n) if n > 0 => n,
        _ => return fail(&state, "Please enter a valid number of epochs"),
    };

    let client = {
        let st = lock(&state);
        if st.built.is_none() {
            drop(st);
            return fail(&state, "Build the model before training.");
        }
        st.client.clone()
    };
    // The session sends this once the channel connects.
    let saved = match client.get_model_config() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to fetch model configuration: {e}");
            return fail(&state, &e.to_string());
        }
    };

    let mut st = lock(&state);
    st.start_config.set(saved);
    let connector = SocketIoConnector::new(st.config.channel_url());
    if let Err(e) = st.session.start(&connector, epochs) {
        let message = st.session.last_error().map(str::to_owned).unwrap_or_else(|| e.to_string());
        drop(st);
        return fail(&state, &message);
    }

    st.history = match st.session.subscribe(MetricsHistory::FILTER) {
        Some(sub) => MetricsHistory::attach(sub),
        None => MetricsHistory::new(),
    };
    st.training_revision += 1;
    let spawn_driver = !st.driving;
    st.driving = true;
    drop(st);

    if spawn_driver {
        let state_clone = state.clone();
        thread::spawn(move || drive(state_clone));
    }
    redirect("/train")
}

/// Folds channel events into the session and history until the run stops
/// being active, then drains whatever was already queued.
fn drive(state: SharedState) {
    log::debug!("training driver started");
    loop {
        let mut st = lock(&state);
        let handled = st.session.pump() + st.history.pump();
        if handled > 0 {
            st.training_revision += 1;
        }
        if !st.session.phase().is_active() {
            if st.session.pump() + st.history.pump() > 0 {
                st.training_revision += 1;
            }
            st.history.detach();
            st.driving = false;
            st.training_revision += 1;
            log::info!("training driver stopped in phase {}", st.session.phase());
            return;
        }
        drop(st);
        thread::sleep(PUMP_INTERVAL);
    }
}

// ---------------------------------------------------------------------------
// POST /train/detach
// ---------------------------------------------------------------------------

pub fn handle_detach(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    st.session.detach();
    st.flash = Some(FlashMessage::success(
        "Stopped following the run. The backend may still be training.",
    ));
    drop(st);
    redirect("/train")
}

// ---------------------------------------------------------------------------
// Shared with the SSE stream
// ---------------------------------------------------------------------------

/// JSON snapshot pushed to the browser on every change.
pub fn status_payload(st: &StudioState) -> serde_json::Value {
    let status = st.session.status();
    let phase = st.session.phase();
    json!({
        "status":  status,
        "history": st.history.points(),
        "phase":   phase.to_string(),
        "message": caption(phase, status, st.history.len()),
        "color":   progress_color(status.progress),
        "error":   st.session.last_error(),
    })
}

fn caption(phase: Phase, status: &TrainingStatus, epochs_seen: usize) -> &'static str {
    match phase {
        Phase::Idle if !status.is_training && status.progress == 0.0 => "",
        Phase::Connecting | Phase::AwaitingStart if epochs_seen == 0 => AWAITING_START,
        _ => status.status_message(),
    }
}

fn fail(state: &SharedState, message: &str) -> HttpResponse {
    lock(state).flash = Some(FlashMessage::error(message));
    redirect("/train")
}

fn history_rows(points: &[EpochMetrics]) -> String {
    let mut out = String::new();
    for p in points {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{:.2}%</td><td>{:.2}%</td><td>{:.2}%</td></tr>",
            p.epoch, p.accuracy, p.precision, p.recall
        );
    }
    out
}

fn test_metrics(status: &TrainingStatus) -> String {
    let Some(m) = status.test_metrics else {
        return String::new();
    };
    format!(
        r#"<table class="summary-table"><thead><tr><th>Accuracy</th><th>Precision</th><th>Recall</th></tr></thead><tbody><tr><td>{:.2}%</td><td>{:.2}%</td><td>{:.2}%</td></tr></tbody></table>"#,
        m.accuracy * 100.0,
        m.precision * 100.0,
        m.recall * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_waits_for_first_epoch() {
        let status = TrainingStatus::starting();
        assert_eq!(caption(Phase::AwaitingStart, &status, 0), AWAITING_START);
        assert_eq!(caption(Phase::Idle, &TrainingStatus::default(), 0), "");
    }

    #[test]
    fn history_rows_keep_epoch_order() {
        let rows = history_rows(&[
            EpochMetrics { epoch: 1, accuracy: 50.0, precision: 40.0, recall: 30.0 },
            EpochMetrics { epoch: 2, accuracy: 75.5, precision: 60.0, recall: 55.25 },
        ]);
        let first = rows.find("<td>1</td>").unwrap();
        let second = rows.find("<td>2</td>").unwrap();
        assert!(first < second);
        assert!(rows.contains("<td>75.50%</td>"));
    }
}
