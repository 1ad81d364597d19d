use std::fmt::Write;

use rand::Rng;

use netforge::api::{ColumnHistogram, MissingValueReport};

use crate::state::{FlashKind, FlashMessage};

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
     .replace('<', "&lt;")
     .replace('>', "&gt;")
     .replace('"', "&quot;")
}

pub fn render_flash_html(flash: Option<&FlashMessage>) -> String {
    match flash {
        None    => String::new(),
        Some(f) => {
            let cls = match f.kind {
                FlashKind::Success => "flash-success",
                FlashKind::Error   => "flash-error",
            };
            format!(r#"<div class="flash {}">{}</div>"#, cls, html_escape(&f.text))
        }
    }
}

/// Confusion matrix with one `Predicted: j` column per class and one
/// `Actual: i` row per class.
pub fn confusion_matrix_table(matrix: &[Vec<u64>]) -> String {
    if matrix.is_empty() {
        return String::new();
    }
    let mut out = String::from(r#"<table class="confusion-matrix"><thead><tr><th></th>"#);
    for j in 0..matrix.len() {
        let _ = write!(out, "<th>Predicted: {j}</th>");
    }
    out.push_str("</tr></thead><tbody>");
    for (i, row) in matrix.iter().enumerate() {
        let _ = write!(out, "<tr><th>Actual: {i}</th>");
        for value in row {
            let _ = write!(out, "<td>{value}</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Missing-value metrics for one side of the processing comparison.
pub fn metrics_table(title: &str, report: &MissingValueReport) -> String {
    let mut out = format!(
        r#"<div class="metrics-table"><h4>{}</h4><table class="summary-table"><thead><tr><th>Column</th><th>Missing Values</th><th>Missing %</th></tr></thead><tbody>"#,
        html_escape(title)
    );
    for (column, missing) in &report.missing_values {
        let pct = report.missing_percentage.get(column).copied().unwrap_or(0.0);
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{missing}</td><td>{pct:.2}%</td></tr>",
            html_escape(column)
        );
    }
    let _ = write!(
        out,
        "</tbody></table><p>Rows: {} &middot; Duplicate rows: {}</p></div>",
        report.num_rows, report.duplicate_rows
    );
    out
}

/// Vertical bar chart of a column's value counts; each bar gets a random colour.
pub fn histogram_svg(histogram: &ColumnHistogram) -> String {
    const WIDTH: f64 = 640.0;
    const HEIGHT: f64 = 320.0;
    const LABEL_BAND: f64 = 40.0;

    let labels = histogram.label_text();
    let bars = histogram.values.len().min(labels.len());
    if bars == 0 {
        return r#"<p class="hint">No values to plot.</p>"#.to_owned();
    }
    let max = histogram.values.iter().copied().max().unwrap_or(1).max(1) as f64;
    let slot = WIDTH / bars as f64;
    let plot_h = HEIGHT - LABEL_BAND;
    let mut rng = rand::thread_rng();

    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="bar-chart" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    for (i, (label, value)) in labels.iter().zip(&histogram.values).take(bars).enumerate() {
        let h = *value as f64 / max * (plot_h - 16.0);
        let x = i as f64 * slot + slot * 0.1;
        let y = plot_h - h;
        let colour = format!("rgb({},{},{})", rng.gen_range(0..=255), rng.gen_range(0..=255), rng.gen_range(0..=255));
        let _ = write!(
            out,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{colour}"><title>{label}: {value}</title></rect>"#,
            w = slot * 0.8,
            label = html_escape(label),
        );
        let _ = write!(
            out,
            r#"<text x="{cx:.1}" y="{ty:.1}" text-anchor="middle" font-size="11">{label}</text>"#,
            cx = x + slot * 0.4,
            ty = plot_h + 16.0,
            label = html_escape(label),
        );
    }
    out.push_str("</svg>");
    out
}

/// `<option>` list with `selected` on the matching value.
pub fn select_options<'a>(values: impl IntoIterator<Item = &'a str>, selected: Option<&str>) -> String {
    values
        .into_iter()
        .map(|v| {
            let sel = if Some(v) == selected { " selected" } else { "" };
            format!(r#"<option value="{0}"{sel}>{0}</option>"#, html_escape(v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_class_confusion_matrix() {
        let html = confusion_matrix_table(&[vec![5, 1], vec![2, 8]]);
        assert_eq!(html.matches("Predicted: ").count(), 2);
        assert_eq!(html.matches("Actual: ").count(), 2);
        assert!(html.contains("<th>Predicted: 0</th><th>Predicted: 1</th>"));
        assert!(html.contains("<tr><th>Actual: 1</th><td>2</td><td>8</td></tr>"));
    }

    #[test]
    fn empty_matrix_renders_nothing() {
        assert_eq!(confusion_matrix_table(&[]), "");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn histogram_draws_one_bar_per_value() {
        let h = ColumnHistogram { labels: vec!["a".into(), 2.into()], values: vec![3, 1] };
        let svg = histogram_svg(&h);
        assert_eq!(svg.matches("<rect").count(), 2);
    }
}
