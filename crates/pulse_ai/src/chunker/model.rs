use std::collections::BTreeMap;

use pulse_core::domain::SectionTag;
use serde::{Deserialize, Serialize};

/// Immutable retrievable unit derived from one profile section. Replaced
/// wholesale when its community is reindexed, deleted with its community,
/// never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Deterministic: `{slug}-{section}`, with a `-{subkey}` suffix for
    /// sub-category splits. Re-chunking the same profile reproduces it.
    pub chunk_id: String,
    pub community: String,
    pub section: SectionTag,
    /// Self-contained prose; every entry of `metrics` appears in it in
    /// canonical rendered form.
    pub text: String,
    pub metrics: BTreeMap<String, MetricValue>,
    pub viz_ref: Option<VizRef>,
}

impl Chunk {
    /// Number of named facts; the retriever's first tie-break.
    pub fn metrics_density(&self) -> usize {
        self.metrics.len()
    }
}

/// Pointer to the external visualization of a chunk's data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VizRef {
    pub locator: String,
    pub label: String,
}

/// A named fact with exactly one canonical rendering. Chunk text embeds the
/// `render()` form verbatim, which is what makes citations quotable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(i64),
    Dollars(f64),
    Percent(f64),
    /// Signed year-over-year / vs-city deltas.
    DeltaPercent(f64),
    Rate(f64),
    /// Scale value; the surrounding sentence names the scale (x/100, x/10).
    Score(f64),
    Label(String),
}

impl MetricValue {
    pub fn render(&self) -> String {
        match self {
            MetricValue::Count(v) => group_thousands(*v),
            MetricValue::Dollars(v) => format!("${}", group_thousands(v.round() as i64)),
            MetricValue::Percent(v) => format!("{}%", fmt_num(*v)),
            MetricValue::DeltaPercent(v) => {
                if *v >= 0.0 {
                    format!("+{}%", fmt_num(*v))
                } else {
                    format!("-{}%", fmt_num(v.abs()))
                }
            }
            MetricValue::Rate(v) | MetricValue::Score(v) => fmt_num(*v),
            MetricValue::Label(s) => s.clone(),
        }
    }
}

/// Whole numbers render without a decimal point, everything else with one
/// decimal place.
fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        group_thousands(v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

fn group_thousands(v: i64) -> String {
    let digits = v.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if v < 0 {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
