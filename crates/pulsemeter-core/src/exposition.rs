//! Prometheus text exposition (format 0.0.4).
//!
//! Samples are grouped by consecutive descriptor name; each group is preceded
//! by `# HELP` and `# TYPE` lines. Histograms expand into `_bucket`, `_sum` and
//! `_count` series.

use std::fmt::Write;

use crate::labels::{LabelSet, HISTOGRAM_BUCKET_LABEL};
use crate::metrics::{Sample, SampleValue};

/// Content type served by the scrape endpoint.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn render(samples: &[Sample]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;

    for sample in samples {
        let d = &sample.descriptor;
        if current != Some(d.name.as_str()) {
            let _ = writeln!(out, "# HELP {} {}", d.name, escape_help(&d.description));
            let _ = writeln!(out, "# TYPE {} {}", d.name, d.kind.as_str());
            current = Some(d.name.as_str());
        }

        match &sample.value {
            SampleValue::Counter(v) | SampleValue::Gauge(v) => {
                let _ = writeln!(out, "{}{} {}", d.name, braced(&sample.labels, None), format_value(*v));
            }
            SampleValue::Histogram(h) => {
                for (le, count) in &h.buckets {
                    let le = format_value(*le);
                    let _ = writeln!(
                        out,
                        "{}_bucket{} {}",
                        d.name,
                        braced(&sample.labels, Some(&le)),
                        count
                    );
                }
                let labels = braced(&sample.labels, None);
                let _ = writeln!(out, "{}_sum{} {}", d.name, labels, format_value(h.sum));
                let _ = writeln!(out, "{}_count{} {}", d.name, labels, h.count);
            }
        }
    }
    out
}

/// `{k="v",...}` with an optional trailing `le`, or nothing when empty.
fn braced(labels: &LabelSet, le: Option<&str>) -> String {
    let mut inner = labels.render();
    if let Some(le) = le {
        if !inner.is_empty() {
            inner.push(',');
        }
        let _ = write!(inner, "{}=\"{}\"", HISTOGRAM_BUCKET_LABEL, le);
    }
    if inner.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", inner)
    }
}

/// Float formatting with the exposition spellings of the special values.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
