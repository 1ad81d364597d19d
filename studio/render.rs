/// Central template renderer for the netforge studio.
///
/// The studio uses a single HTML template (`studio/assets/studio.html`) with
/// placeholder tokens like `{{TOKEN}}`. Page-wide tokens are resolved here;
/// page-specific ones are filled by the caller's closure, and whatever is
/// left over is blanked so raw tokens never reach the browser.

const TEMPLATE: &str = include_str!("assets/studio.html");

/// Which tab is active. Controls the active CSS class, which section is
/// shown, and the JS `ACTIVE_TAB` variable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Data  = 0,
    Model = 1,
    Train = 2,
}

/// Tab unlock bits: Data and Model are always open; Train opens once a model
/// has been built or a run exists.
pub fn tab_unlock_mask(model_built: bool, run_exists: bool) -> u8 {
    let mut mask: u8 = 0b011;
    if model_built || run_exists {
        mask |= 0b100;
    }
    mask
}

pub fn render_page<F>(page: Page, tab_unlock: u8, training_running: bool, fill: F) -> String
where
    F: FnOnce(String) -> String,
{
    let hide = |p: Page| if p == page { "" } else { "hidden" };

    let mut html = TEMPLATE.to_owned();
    html = html.replace("{{TAB_UNLOCK}}",       &tab_unlock.to_string());
    html = html.replace("{{ACTIVE_TAB}}",       &(page as u8).to_string());
    html = html.replace("{{TRAINING_RUNNING}}", if training_running { "true" } else { "false" });
    html = html.replace("{{DATA_HIDE}}",  hide(Page::Data));
    html = html.replace("{{MODEL_HIDE}}", hide(Page::Model));
    html = html.replace("{{TRAIN_HIDE}}", hide(Page::Train));

    html = fill(html);

    blank_remaining(html)
}

/// Replaces any `{{TOKEN}}` that wasn't already substituted with an empty string.
fn blank_remaining(mut html: String) -> String {
    let mut from = 0;
    while let Some(start) = html[from..].find("{{").map(|i| i + from) {
        match html[start..].find("}}") {
            Some(end) => {
                html.replace_range(start..start + end + 2, "");
                from = start;
            }
            None => break,
        }
    }
    html
}
