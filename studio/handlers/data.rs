use std::io::Read;
use tiny_http::Request;

use netforge::api::validate::{self, KEEP_TWO_COLUMNS};
use netforge::api::{FeatureScaling, ProcessingOptions};
use netforge::BackendClient;

use crate::render::{render_page, tab_unlock_mask, Page};
use crate::routes::{read_form, redirect, HttpResponse};
use crate::state::{lock, DatasetState, FlashMessage, SharedState};
use crate::util::form::{form_flag, form_get, form_get_all};
use crate::util::html::{
    histogram_svg, html_escape, metrics_table, render_flash_html, select_options,
};
use crate::util::multipart::{extract_boundary, extract_file};

const MAX_CSV_BYTES: usize = 50 * 1024 * 1024; // 50 MB

// ---------------------------------------------------------------------------
// GET /data
// ---------------------------------------------------------------------------

pub fn handle_get(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    let flash   = st.take_flash();
    let mask    = tab_unlock_mask(st.built.is_some(), st.session.phase() != netforge::Phase::Idle);
    let running = st.session.phase().is_active();
    let ds      = st.dataset.clone();
    drop(st);

    let flash_html = render_flash_html(flash.as_ref());
    crate::routes::html_response(render_page(Page::Data, mask, running, |tmpl| {
        tmpl.replace("{{FLASH}}", &flash_html)
            .replace("{{DATA_FILE_INFO}}", &file_info(&ds))
            .replace("{{DATA_SUMMARY}}", &summary_table(&ds))
            .replace("{{DATA_COLUMN_OPTIONS}}", &select_options(
                ds.columns.iter().map(String::as_str),
                ds.histogram.as_ref().map(|(c, _)| c.as_str()),
            ))
            .replace("{{DATA_HISTOGRAM}}", &ds.histogram.as_ref()
                .map(|(column, h)| format!("<h4>{}</h4>{}", html_escape(column), histogram_svg(h)))
                .unwrap_or_default())
            .replace("{{DATA_LABEL_OPTIONS}}", &select_options(
                ds.label_candidates.iter().map(String::as_str),
                ds.label_column.as_deref(),
            ))
            .replace("{{DATA_LABEL_STATUS}}", &ds.label_column.as_ref()
                .map(|c| format!("<p class=\"message\">Label column: <b>{}</b></p>", html_escape(c)))
                .unwrap_or_default())
            .replace("{{DATA_DROP_CHECKBOXES}}", &drop_checkboxes(&ds.columns))
            .replace("{{DATA_DROP_STATUS}}", &drop_status(&ds.dropped))
            .replace("{{DATA_COMPARISON}}", &comparison_tables(&ds))
            .replace("{{DATA_SPLIT_RESULT}}", &split_table(&ds))
    }))
}

// ---------------------------------------------------------------------------
// POST /data/upload
// ---------------------------------------------------------------------------

pub fn handle_upload(request: &mut Request, state: SharedState) -> HttpResponse {
    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();

    let boundary = match extract_boundary(&content_type) {
        Some(b) => b,
        None    => return fail(&state, "Invalid multipart request."),
    };

    let mut body: Vec<u8> = Vec::new();
    if let Err(e) = request.as_reader().take(MAX_CSV_BYTES as u64 + 1).read_to_end(&mut body) {
        return fail(&state, &format!("Error uploading file: {e}"));
    }
    if body.len() > MAX_CSV_BYTES {
        return fail(&state, "File exceeds 50 MB limit.");
    }

    let file = match extract_file(&body, &boundary, "file") {
        Some(f) if !f.file_name.is_empty() => f,
        _ => return fail(&state, "Please select a file to upload"),
    };

    let client = lock(&state).client.clone();
    if let Err(e) = client.upload_csv(&file.file_name, &file.data) {
        return fail(&state, &upload_error(&e));
    }

    // A fresh dataset invalidates everything derived from the previous one.
    let mut ds = DatasetState { file_name: Some(file.file_name), ..Default::default() };
    let notice = refresh_dataset(&client, &mut ds);

    let mut st = lock(&state);
    st.dataset = ds;
    st.dataset_changed();
    st.flash = Some(match notice {
        None      => FlashMessage::success("File uploaded successfully"),
        Some(err) => FlashMessage::error(format!("File uploaded, but {err}")),
    });
    drop(st);

    redirect("/data")
}

fn upload_error(e: &netforge::ClientError) -> String {
    match e {
        netforge::ClientError::Validation(msg) => msg.clone(),
        other => format!("Error uploading file: {other}"),
    }
}

/// Re-reads columns, label candidates and the summary. Returns the first
/// failure, if any, so the page can still show what did load.
fn refresh_dataset(client: &BackendClient, ds: &mut DatasetState) -> Option<String> {
    let mut first_error = None;
    let mut note = |e: netforge::ClientError| {
        log::warn!("dataset refresh: {e}");
        first_error.get_or_insert_with(|| e.to_string());
    };

    match client.columns() {
        Ok(columns) => ds.columns = columns,
        Err(e) => note(e),
    }
    match client.columns_for_label() {
        Ok(columns) => ds.label_candidates = columns,
        Err(e) => note(e),
    }
    match client.data_summary() {
        Ok(summary) => ds.summary = Some(summary),
        Err(e) => note(e),
    }
    first_error
}

// ---------------------------------------------------------------------------
// POST /data/visualize
// ---------------------------------------------------------------------------

pub fn handle_visualize(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs  = read_form(request);
    let column = form_get(&pairs, "columnName").unwrap_or("").to_owned();
    if column.is_empty() {
        return fail(&state, "Choose a column to visualize.");
    }

    let client = lock(&state).client.clone();
    match client.visualization_data(&column) {
        Ok(histogram) => {
            lock(&state).dataset.histogram = Some((column, histogram));
            redirect("/data")
        }
        Err(e) => fail(&state, &e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /data/label
// ---------------------------------------------------------------------------

pub fn handle_label(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs  = read_form(request);
    let column = form_get(&pairs, "labelColumn").unwrap_or("").to_owned();
    if column.is_empty() {
        return fail(&state, "Choose a label column.");
    }

    let client = lock(&state).client.clone();
    if let Err(e) = client.select_label_column(&column) {
        log::warn!("select label column: {e}");
        return fail(&state, "Failed to select label column");
    }

    let mut st = lock(&state);
    st.flash = Some(FlashMessage::success(format!("Label column '{}' selected.", column)));
    st.dataset.label_column = Some(column);
    st.dataset_changed();
    drop(st);
    redirect("/data")
}

// ---------------------------------------------------------------------------
// POST /data/drop
// ---------------------------------------------------------------------------

pub fn handle_drop(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let selected: Vec<String> = form_get_all(&pairs, "columns").into_iter().map(str::to_owned).collect();

    let (client, available) = {
        let st = lock(&state);
        (st.client.clone(), st.dataset.columns.len())
    };
    if selected.is_empty() {
        return fail(&state, "Select at least one column to drop.");
    }
    if validate::drop_selection(available, selected.len()).is_err() {
        return fail(&state, KEEP_TWO_COLUMNS);
    }
    if let Err(e) = client.drop_columns(&selected) {
        log::warn!("drop columns: {e}");
        return fail(&state, "Failed to drop columns.");
    }

    let mut ds = lock(&state).dataset.clone();
    let notice = refresh_dataset(&client, &mut ds);
    ds.dropped = selected;
    ds.histogram = None;

    let mut st = lock(&state);
    st.dataset = ds;
    st.dataset_changed();
    if let Some(err) = notice {
        st.flash = Some(FlashMessage::error(err));
    }
    drop(st);
    redirect("/data")
}

// ---------------------------------------------------------------------------
// POST /data/process
// ---------------------------------------------------------------------------

pub fn handle_process(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let options = ProcessingOptions {
        remove_duplicates:     form_flag(&pairs, "removeDuplicates"),
        handle_missing_values: form_flag(&pairs, "handleMissingValues"),
        encode_categorical:    form_flag(&pairs, "encodeCategorical"),
        feature_scaling:       form_get(&pairs, "featureScaling").and_then(FeatureScaling::parse),
    };

    let client = lock(&state).client.clone();
    match client.process_data(&options) {
        Ok(None) => {
            lock(&state).flash =
                Some(FlashMessage::success("No options selected. Proceeding to the next step."));
            return redirect("/data");
        }
        Ok(Some(_)) => {}
        Err(e) => {
            log::warn!("process data: {e}");
            return fail(&state, "Failed to process data");
        }
    }

    let comparison = client.comparison_summary();
    let mut st = lock(&state);
    match comparison {
        Ok(c) => {
            st.dataset.comparison = Some(c);
            st.flash = Some(FlashMessage::success("Data processed."));
        }
        Err(e) => st.flash = Some(FlashMessage::error(e.to_string())),
    }
    st.network_params = None;
    drop(st);
    redirect("/data")
}

// ---------------------------------------------------------------------------
// POST /data/split
// ---------------------------------------------------------------------------

pub fn handle_split(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let train = form_get(&pairs, "trainSize").unwrap_or("");
    let val   = form_get(&pairs, "validationSize").unwrap_or("");

    let (train, val) = match validate::split_percentages(train, val) {
        Ok(ratios) => ratios,
        Err(e) => {
            lock(&state).dataset.split = None;
            return fail(&state, &e.to_string());
        }
    };

    let client = lock(&state).client.clone();
    let result = client.split_data(train, val);
    let mut st = lock(&state);
    match result {
        Ok(sizes) => {
            st.dataset.split = Some(sizes);
            st.flash = Some(FlashMessage::success("Data split successfully."));
        }
        Err(e) => {
            st.dataset.split = None;
            st.flash = Some(FlashMessage::error(e.to_string()));
        }
    }
    drop(st);
    redirect("/data")
}

// ---------------------------------------------------------------------------
// Page fragments
// ---------------------------------------------------------------------------

fn fail(state: &SharedState, message: &str) -> HttpResponse {
    lock(state).flash = Some(FlashMessage::error(message));
    redirect("/data")
}

fn file_info(ds: &DatasetState) -> String {
    match &ds.file_name {
        Some(name) => format!("<p class=\"file-info\">Current file: <b>{}</b></p>", html_escape(name)),
        None       => "<p class=\"hint\">No file uploaded yet.</p>".to_owned(),
    }
}

fn summary_table(ds: &DatasetState) -> String {
    let Some(summary) = &ds.summary else {
        return String::new();
    };
    let rows: String = summary.rows().map(|(column, info)| {
        let (dtype, missing, pct) = info
            .map(|i| (i.data_type.as_str(), i.missing_values, i.percent_missing))
            .unwrap_or(("unknown", 0, 0.0));
        format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>",
            html_escape(column), html_escape(dtype), missing, pct
        )
    }).collect();
    format!(
        r#"<p>Rows: <b>{}</b></p><table class="summary-table"><thead><tr><th>Column</th><th>Data Type</th><th>Missing Values</th><th>Missing %</th></tr></thead><tbody>{}</tbody></table>"#,
        summary.row_count, rows
    )
}

fn drop_checkboxes(columns: &[String]) -> String {
    columns.iter().map(|c| {
        let c = html_escape(c);
        format!(r#"<label class="form-option"><input type="checkbox" name="columns" value="{c}"> {c}</label>"#)
    }).collect()
}

fn drop_status(dropped: &[String]) -> String {
    if dropped.is_empty() {
        return String::new();
    }
    let names: Vec<String> = dropped.iter().map(|c| html_escape(c)).collect();
    format!(
        "<p class=\"drop-status-message\">Columns: <b><i>{}</i></b> dropped successfully.</p>",
        names.join(", ")
    )
}

fn comparison_tables(ds: &DatasetState) -> String {
    let Some(cmp) = &ds.comparison else {
        return String::new();
    };
    let mut out = String::new();
    if let Some(before) = &cmp.before {
        out.push_str(&metrics_table("Before Processing", before));
    }
    if let Some(after) = &cmp.after {
        out.push_str(&metrics_table("After Processing", after));
    }
    out
}

fn split_table(ds: &DatasetState) -> String {
    let Some(s) = ds.split else {
        return String::new();
    };
    format!(
        r#"<table class="summary-table"><thead><tr><th>Dataset</th><th>Size (rows)</th></tr></thead><tbody><tr><td>Training Set</td><td>{}</td></tr><tr><td>Validation Set</td><td>{}</td></tr><tr><td>Test Set</td><td>{}</td></tr><tr><td>Total</td><td>{}</td></tr></tbody></table>"#,
        s.train_size, s.validation_size, s.test_size, s.total_size
    )
}
