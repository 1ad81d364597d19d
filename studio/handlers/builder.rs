use std::fmt::Write;

use tiny_http::Request;

use netforge::api::validate::NOT_NUMERIC;
use netforge::model::{Activation, LayerPatch};
use netforge::{LayerConfig, LayerKind, ModelConfig, StoreError};

use crate::render::{render_page, tab_unlock_mask, Page};
use crate::routes::{json_download_response, read_form, redirect, svg_response, HttpResponse};
use crate::state::{fetch_network_params, lock, FlashMessage, SharedState};
use crate::util::form::form_get;
use crate::util::html::{html_escape, render_flash_html};

// ---------------------------------------------------------------------------
// GET /model
// ---------------------------------------------------------------------------

pub fn handle_get(state: SharedState) -> HttpResponse {
    if let Err(e) = fetch_network_params(&state) {
        log::debug!("diagram drawn without output layer: {e}");
    }
    let mut st = lock(&state);
    let flash = st.take_flash();
    let mask    = tab_unlock_mask(st.built.is_some(), st.session.phase() != netforge::Phase::Idle);
    let running = st.session.phase().is_active();
    let config  = st.store.snapshot();
    let offered = st.store.offered_kinds();
    let diagram = st.diagram_svg();
    let built   = st.built.clone();
    drop(st);

    let flash_html = render_flash_html(flash.as_ref());
    crate::routes::html_response(render_page(Page::Model, mask, running, |tmpl| {
        tmpl.replace("{{FLASH}}", &flash_html)
            .replace("{{MODEL_LAYER_ROWS}}", &layer_rows(&config))
            .replace("{{MODEL_ADD_OPTIONS}}", &kind_options(offered, None))
            .replace("{{MODEL_DIAGRAM}}", &diagram)
            .replace("{{MODEL_BUILT}}", &built_section(built.as_ref()))
    }))
}

// ---------------------------------------------------------------------------
// GET /model/diagram.svg, GET /model/config.json
// ---------------------------------------------------------------------------

pub fn handle_diagram(state: SharedState) -> HttpResponse {
    let svg = lock(&state).diagram_svg();
    svg_response(svg)
}

pub fn handle_download(state: SharedState) -> HttpResponse {
    let built = lock(&state).built.clone();
    let Some(config) = built else {
        return fail(&state, "Build the model before downloading its configuration.");
    };
    match config.to_json_pretty() {
        Ok(json) => json_download_response(json, "model_config.json"),
        Err(e) => fail(&state, &format!("Could not serialize the configuration: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Layer editing
// ---------------------------------------------------------------------------

pub fn handle_add(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let Some(kind) = form_get(&pairs, "type").and_then(LayerKind::parse) else {
        return fail(&state, "Choose a layer type.");
    };
    let result = lock(&state).store.add_layer(kind);
    match result {
        Ok(layer) => {
            log::info!("added {} layer {}", layer.kind, layer.id);
            redirect("/model")
        }
        Err(e) => store_failure(&state, e),
    }
}

pub fn handle_update(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let id = form_get(&pairs, "id").unwrap_or("").to_owned();

    let patch = match patch_from_form(&pairs) {
        Ok(p) if !p.is_empty() => p,
        Ok(_)  => return fail(&state, "Nothing to update."),
        Err(msg) => return fail(&state, msg),
    };
    let result = lock(&state).store.update_layer(&id, patch);
    match result {
        Ok(()) => redirect("/model"),
        Err(e) => store_failure(&state, e),
    }
}

pub fn handle_retype(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let id = form_get(&pairs, "id").unwrap_or("").to_owned();
    let Some(kind) = form_get(&pairs, "type").and_then(LayerKind::parse) else {
        return fail(&state, "Choose a layer type.");
    };
    let result = lock(&state).store.retype_layer(&id, kind);
    match result {
        Ok(()) => redirect("/model"),
        Err(e) => store_failure(&state, e),
    }
}

pub fn handle_remove(request: &mut Request, state: SharedState) -> HttpResponse {
    let pairs = read_form(request);
    let id = form_get(&pairs, "id").unwrap_or("").to_owned();
    let result = lock(&state).store.remove_layer(&id);
    match result {
        Ok(()) => redirect("/model"),
        Err(e) => store_failure(&state, e),
    }
}

pub fn handle_reset(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    st.store.reset();
    st.built = None;
    st.flash = Some(FlashMessage::success("Model reset."));
    drop(st);
    redirect("/model")
}

// ---------------------------------------------------------------------------
// POST /model/build
// ---------------------------------------------------------------------------

/// Appends the dataset-sized output layer, saves the result on the backend
/// and remembers it for the Train page.
pub fn handle_build(state: SharedState) -> HttpResponse {
    let params = match fetch_network_params(&state) {
        Ok(p) => p,
        Err(e) => return fail(&state, &e.to_string()),
    };
    let st = lock(&state);
    let finalized = st.store.finalize_for_build(params.num_label_classes, params.num_cols);
    let client = st.client.clone();
    drop(st);

    let config = match finalized {
        Ok(c) => c,
        Err(e) => return store_failure(&state, e),
    };
    if let Err(e) = client.save_model_config(&config) {
        log::warn!("save model config: {e}");
        return fail(&state, &format!("Error saving model configuration: {e}"));
    }

    log::info!(
        "model built: {} layers, {} inputs, {} outputs",
        config.layers.len(),
        params.num_cols,
        params.num_label_classes
    );
    let mut st = lock(&state);
    st.built = Some(config);
    st.flash = Some(FlashMessage::success("Model configuration saved successfully"));
    drop(st);
    redirect("/model")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fail(state: &SharedState, message: &str) -> HttpResponse {
    lock(state).flash = Some(FlashMessage::error(message));
    redirect("/model")
}

fn store_failure(state: &SharedState, err: StoreError) -> HttpResponse {
    log::debug!("layer edit rejected: {err}");
    fail(state, &err.to_string())
}

/// Blank fields are left out of the patch; anything else must parse.
fn patch_from_form(pairs: &[(String, String)]) -> Result<LayerPatch, &'static str> {
    let field = |key: &str| form_get(pairs, key).map(str::trim).filter(|v| !v.is_empty());

    let nodes = field("nodes").map(|v| v.parse::<usize>().map_err(|_| NOT_NUMERIC)).transpose()?;
    let rate  = field("rate").map(|v| v.parse::<f64>().map_err(|_| NOT_NUMERIC)).transpose()?;
    let activation = field("activation")
        .map(|v| Activation::parse(v).ok_or("Unknown activation function."))
        .transpose()?;

    Ok(LayerPatch { nodes, rate, activation })
}

fn kind_options(kinds: &[LayerKind], selected: Option<LayerKind>) -> String {
    kinds.iter().map(|k| {
        let sel = if Some(*k) == selected { " selected" } else { "" };
        format!(r#"<option value="{0}"{sel}>{0}</option>"#, k.as_str())
    }).collect()
}

fn activation_options(selected: Option<Activation>) -> String {
    Activation::ALL.iter().map(|a| {
        let sel = if Some(*a) == selected { " selected" } else { "" };
        format!(r#"<option value="{}"{sel}>{}</option>"#, a.as_str(), a.label())
    }).collect()
}

fn layer_rows(config: &ModelConfig) -> String {
    if config.layers.is_empty() {
        return r#"<tr><td colspan="4" class="hint">No layers yet. Add one below.</td></tr>"#.to_owned();
    }
    let mut out = String::new();
    for (i, layer) in config.layers.iter().enumerate() {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            i + 1,
            layer.kind,
            settings_cell(layer),
            actions_cell(layer),
        );
    }
    out
}

fn settings_cell(layer: &LayerConfig) -> String {
    let id = html_escape(&layer.id);
    if layer.is_output() {
        return format!(
            "{} nodes, {}",
            layer.settings.nodes.unwrap_or(0),
            layer.settings.activation.map(Activation::label).unwrap_or("-")
        );
    }
    let fields = match layer.kind {
        LayerKind::Dense => format!(
            r#"<input type="number" name="nodes" min="1" value="{}"><select name="activation">{}</select>"#,
            layer.settings.nodes.unwrap_or(0),
            activation_options(layer.settings.activation),
        ),
        LayerKind::Dropout => format!(
            r#"<input type="number" name="rate" min="0" max="1" step="0.05" value="{}">"#,
            layer.settings.rate.unwrap_or(0.0),
        ),
    };
    format!(
        r#"<form method="POST" action="/model/layers/update" class="inline"><input type="hidden" name="id" value="{id}">{fields}<button type="submit">Save</button></form>"#
    )
}

fn actions_cell(layer: &LayerConfig) -> String {
    if layer.is_output() {
        return r#"<span class="hint">output</span>"#.to_owned();
    }
    let id = html_escape(&layer.id);
    let other = match layer.kind {
        LayerKind::Dense   => LayerKind::Dropout,
        LayerKind::Dropout => LayerKind::Dense,
    };
    format!(
        r#"<form method="POST" action="/model/layers/retype" class="inline"><input type="hidden" name="id" value="{id}"><input type="hidden" name="type" value="{other}"><button type="submit">Make {other}</button></form><form method="POST" action="/model/layers/remove" class="inline"><input type="hidden" name="id" value="{id}"><button type="submit" class="danger">Remove</button></form>"#
    )
}

fn built_section(built: Option<&ModelConfig>) -> String {
    let Some(config) = built else {
        return r#"<p class="hint">Not built yet. Build the model to save it and unlock training.</p>"#.to_owned();
    };
    let json = config.to_json_pretty().unwrap_or_default();
    format!(
        r#"<pre class="config-json">{}</pre><a class="button" href="/model/config.json">Download configuration</a>"#,
        html_escape(&json)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn blank_fields_are_skipped() {
        let patch = patch_from_form(&pairs(&[("id", "layer1"), ("nodes", "32"), ("rate", "")])).unwrap();
        assert_eq!(patch, LayerPatch::nodes(32));
    }

    #[test]
    fn non_numeric_nodes_are_rejected() {
        assert_eq!(patch_from_form(&pairs(&[("nodes", "lots")])), Err(NOT_NUMERIC));
    }

    #[test]
    fn output_layer_has_no_edit_form() {
        let mut config = ModelConfig::new();
        config.layers.push(LayerConfig::new("layer1", LayerKind::Dense));
        config.layers.push(LayerConfig::new(netforge::model::OUTPUT_LAYER_ID, LayerKind::Dense));
        let rows = layer_rows(&config);
        assert_eq!(rows.matches("/model/layers/update").count(), 1);
        assert_eq!(rows.matches("/model/layers/remove").count(), 1);
    }
}
