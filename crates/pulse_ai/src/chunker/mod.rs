//! Profile-to-chunk decomposition.
//!
//! One chunk per section by default. A section whose rendered prose exceeds
//! the configured cap splits by sub-category (amenities, schools) and then by
//! whole sentences; a fact is never cut in half. Every numeric or categorical
//! fact recorded in a chunk's `metrics` map is embedded in the prose through
//! [`SectionProse::fact`], in its canonical rendered form, at the moment it is
//! recorded.

pub mod model;
pub mod viz;

use std::collections::BTreeMap;

use pulse_core::domain::{NormalizedProfile, SectionTag};
use pulse_core::normalize::slugify;

use model::{Chunk, MetricValue, VizRef};

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Rendered-text cap per chunk, in characters.
    pub max_chars: usize,
    /// Base URL for visualization locators.
    pub viz_base_url: String,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 1600,
            viz_base_url: "https://calgarypulse.ca/communities".to_string(),
        }
    }
}

/// Deterministically chunk a normalized profile. Sections come out in fixed
/// tag order; empty sections produce an explicit "data unavailable" chunk so
/// retrieval can surface the absence instead of guessing.
pub fn chunk_profile(profile: &NormalizedProfile, cfg: &ChunkerConfig) -> Vec<Chunk> {
    let mut out = Vec::new();
    for tag in SectionTag::ALL {
        if profile.section_is_empty(tag) {
            out.push(unavailable_chunk(profile, tag));
            continue;
        }
        let segments = match tag {
            SectionTag::Overview => vec![(String::new(), overview_prose(profile))],
            SectionTag::Safety => vec![(String::new(), safety_prose(profile))],
            SectionTag::Housing => vec![(String::new(), housing_prose(profile))],
            SectionTag::ServiceRequests => vec![(String::new(), service_requests_prose(profile))],
            SectionTag::Schools => schools_segments(profile),
            SectionTag::Transit => vec![(String::new(), transit_prose(profile))],
            SectionTag::Demographics => vec![(String::new(), demographics_prose(profile))],
            SectionTag::Business => vec![(String::new(), business_prose(profile))],
            SectionTag::Amenities => amenities_segments(profile),
        };
        out.extend(emit_segments(profile, tag, cfg, segments));
    }
    out
}

/// Prose accumulator that records facts as it writes them. The rendered form
/// of a fact is pushed into the sentence and stored under its key in the
/// same call, so text and metrics cannot drift apart.
struct SectionProse {
    text: String,
    metrics: BTreeMap<String, MetricValue>,
}

impl SectionProse {
    fn new(lead: String) -> Self {
        Self {
            text: lead,
            metrics: BTreeMap::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn fact(&mut self, key: &str, value: MetricValue, before: &str, after: &str) {
        self.text.push_str(before);
        self.text.push_str(&value.render());
        self.text.push_str(after);
        self.metrics.insert(key.to_string(), value);
    }

    fn is_lead_only(&self, lead_len: usize) -> bool {
        self.text.len() <= lead_len
    }
}

/// Turn ordered segments into chunks. When everything fits the cap, the
/// segments merge into the section's single chunk; otherwise each segment
/// becomes its own chunk (`{base}-{subkey}`), sentence-splitting as a last
/// resort inside a segment.
fn emit_segments(
    profile: &NormalizedProfile,
    tag: SectionTag,
    cfg: &ChunkerConfig,
    segments: Vec<(String, SectionProse)>,
) -> Vec<Chunk> {
    let base_id = format!("{}-{}", profile.slug, tag.as_str());
    let viz = viz::viz_for_section(&cfg.viz_base_url, &profile.slug, tag);
    let total: usize = segments.iter().map(|(_, p)| p.text.len()).sum();

    if segments.len() == 1 || total <= cfg.max_chars {
        let mut merged: Option<SectionProse> = None;
        for (_, prose) in segments {
            match merged.as_mut() {
                None => merged = Some(prose),
                Some(m) => {
                    m.text.push_str(&prose.text);
                    m.metrics.extend(prose.metrics);
                }
            }
        }
        let merged = merged.expect("sections always render at least one segment");
        return finalize(merged, &base_id, profile, tag, viz, cfg.max_chars);
    }

    let mut out = Vec::new();
    for (subkey, prose) in segments {
        let id = if subkey.is_empty() {
            base_id.clone()
        } else {
            format!("{base_id}-{subkey}")
        };
        out.extend(finalize(prose, &id, profile, tag, viz.clone(), cfg.max_chars));
    }
    out
}

/// Build one or more chunks from finished prose. Oversize prose splits on
/// sentence boundaries only; each part keeps exactly the metrics whose
/// rendered value its text contains.
fn finalize(
    prose: SectionProse,
    base_id: &str,
    profile: &NormalizedProfile,
    tag: SectionTag,
    viz: Option<VizRef>,
    max_chars: usize,
) -> Vec<Chunk> {
    let text = prose.text.trim_end().to_string();
    if text.len() <= max_chars {
        return vec![Chunk {
            chunk_id: base_id.to_string(),
            community: profile.slug.clone(),
            section: tag,
            text,
            metrics: prose.metrics,
            viz_ref: viz,
        }];
    }

    let mut parts: Vec<String> = Vec::new();
    let mut buf = String::new();
    for sentence in split_sentences(&text) {
        if !buf.is_empty() && buf.len() + sentence.len() > max_chars {
            parts.push(buf.trim_end().to_string());
            buf = String::new();
        }
        buf.push_str(sentence);
    }
    if !buf.trim().is_empty() {
        parts.push(buf.trim_end().to_string());
    }

    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let metrics: BTreeMap<String, MetricValue> = prose
                .metrics
                .iter()
                .filter(|(_, v)| part.contains(&v.render()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Chunk {
                chunk_id: if i == 0 {
                    base_id.to_string()
                } else {
                    format!("{base_id}-{}", i + 1)
                },
                community: profile.slug.clone(),
                section: tag,
                text: part,
                metrics,
                viz_ref: viz.clone(),
            }
        })
        .collect()
}

/// Sentence pieces including their trailing ". " separators.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'.' && bytes[i + 1] == b' ' {
            let mut end = i + 2;
            while end < bytes.len() && bytes[end] == b' ' {
                end += 1;
            }
            out.push(&text[start..end]);
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn unavailable_chunk(profile: &NormalizedProfile, tag: SectionTag) -> Chunk {
    let phrase = match tag {
        SectionTag::Overview => "community overview",
        SectionTag::Safety => "safety and crime",
        SectionTag::Housing => "housing",
        SectionTag::ServiceRequests => "311 service request",
        SectionTag::Schools => "school",
        SectionTag::Transit => "transit",
        SectionTag::Demographics => "demographics",
        SectionTag::Business => "business and development",
        SectionTag::Amenities => "amenity",
    };
    Chunk {
        chunk_id: format!("{}-{}", profile.slug, tag.as_str()),
        community: profile.slug.clone(),
        section: tag,
        text: format!("No {} data is available for {}.", phrase, profile.name),
        metrics: BTreeMap::new(),
        viz_ref: None,
    }
}

fn overview_prose(p: &NormalizedProfile) -> SectionProse {
    let o = &p.overview;
    let mut w = SectionProse::new(format!("{} community overview. ", p.name));
    match (&o.sector, &o.district) {
        (Some(s), Some(d)) => w.push(&format!("Located in the {s} sector, district {d}. ")),
        (Some(s), None) => w.push(&format!("Located in the {s} sector. ")),
        (None, Some(d)) => w.push(&format!("District {d}. ")),
        (None, None) => {}
    }
    if let Some(km) = o.distance_to_downtown_km {
        w.fact("distance_to_downtown_km", MetricValue::Rate(km), "", " km from downtown. ");
    }
    if let Some(pop) = o.population {
        w.fact("population", MetricValue::Count(pop), "Population: ", ". ");
    }
    if let Some(pct) = o.safety_percentile {
        w.fact("safety_percentile", MetricValue::Score(pct), "Safety percentile: ", "/100. ");
    }
    if let Some(v) = o.avg_home_value {
        w.fact("avg_home_value", MetricValue::Dollars(v), "Average assessed home value: ", ". ");
    }
    if let Some(desc) = &o.description {
        w.push(desc.trim());
        w.push(" ");
    }
    w
}

fn safety_prose(p: &NormalizedProfile) -> SectionProse {
    let s = &p.safety;
    let mut w = SectionProse::new(format!("{} safety and crime data. ", p.name));
    if let Some(pct) = s.percentile {
        w.fact("percentile", MetricValue::Score(pct), "Safety percentile: ", "/100");
        if let Some(label) = &s.percentile_label {
            w.fact("percentile_label", MetricValue::Label(label.clone()), " (", ")");
        }
        w.push(". ");
    }
    if let Some(n) = s.incidents {
        w.fact("incidents", MetricValue::Count(n), "Crime incidents (latest quarter): ", ". ");
    }
    if let Some(r) = s.rate_per_1000 {
        w.fact("rate_per_1000", MetricValue::Rate(r), "Crime rate: ", " per 1,000 residents. ");
    }
    if let Some(r) = s.city_rate_per_1000 {
        w.fact("city_rate_per_1000", MetricValue::Rate(r), "City average: ", " per 1,000. ");
    }
    if let Some(d) = s.yoy_pct {
        w.fact("yoy_pct", MetricValue::DeltaPercent(d), "Year-over-year change: ", ". ");
    }
    if let Some(v) = s.property_pct {
        w.fact("property_pct", MetricValue::Percent(v), "Property crime share: ", ". ");
    }
    if let Some(v) = s.violent_pct {
        w.fact("violent_pct", MetricValue::Percent(v), "Violent crime share: ", ". ");
    }
    if let Some(n) = s.disorder_calls {
        w.fact("disorder_calls", MetricValue::Count(n), "Disorder calls: ", ". ");
    }
    if let Some(r) = s.disorder_rate_per_1000 {
        w.fact("disorder_rate_per_1000", MetricValue::Rate(r), "Disorder rate: ", " per 1,000. ");
    }
    w
}

fn housing_prose(p: &NormalizedProfile) -> SectionProse {
    let h = &p.housing;
    let mut w = SectionProse::new(format!("{} housing data. ", p.name));
    if let Some(v) = h.avg_assessed_value {
        w.fact("avg_assessed_value", MetricValue::Dollars(v), "Average assessed value: ", ". ");
    }
    if let Some(d) = h.value_vs_city_pct {
        w.fact("value_vs_city_pct", MetricValue::DeltaPercent(d), "Compared to city median: ", ". ");
    }
    if let Some(n) = h.property_count {
        w.fact("property_count", MetricValue::Count(n), "Total properties: ", ". ");
    }
    for t in &h.by_type {
        let key = slugify(&t.kind);
        let label = title_words(&t.kind);
        match (t.avg_value, t.count) {
            (Some(v), Some(n)) => {
                w.fact(&format!("{key}_avg_value"), MetricValue::Dollars(v), &format!("{label}: "), " avg (");
                w.fact(&format!("{key}_count"), MetricValue::Count(n), "", " properties");
                if let Some(d) = t.yoy_pct {
                    w.fact(&format!("{key}_yoy_pct"), MetricValue::DeltaPercent(d), ", ", " YoY");
                }
                w.push("). ");
            }
            (Some(v), None) => {
                w.fact(&format!("{key}_avg_value"), MetricValue::Dollars(v), &format!("{label}: "), " avg. ");
            }
            (None, Some(n)) => {
                w.fact(&format!("{key}_count"), MetricValue::Count(n), &format!("{label}: "), " properties. ");
            }
            (None, None) => {}
        }
    }
    w
}

fn service_requests_prose(p: &NormalizedProfile) -> SectionProse {
    let sr = &p.service_requests;
    let mut w = SectionProse::new(format!("{} 311 service requests. ", p.name));
    if let Some(n) = sr.total {
        w.fact("total", MetricValue::Count(n), "Total requests (24 months): ", ". ");
    }
    for c in &sr.top_categories {
        let key = slugify(&c.category);
        if let Some(n) = c.count {
            w.fact(&format!("{key}_count"), MetricValue::Count(n), &format!("{}: ", c.category), "");
            if let Some(d) = c.yoy_pct {
                w.fact(&format!("{key}_yoy_pct"), MetricValue::DeltaPercent(d), " (", " YoY)");
            }
            w.push(". ");
        }
    }
    w
}

fn schools_segments(p: &NormalizedProfile) -> Vec<(String, SectionProse)> {
    let sc = &p.schools;
    let mut base = SectionProse::new(format!("{} schools. ", p.name));
    if let Some(n) = sc.count {
        base.fact("count", MetricValue::Count(n), "", " schools in the community. ");
    }
    if let Some(r) = sc.avg_rating {
        base.fact("avg_rating", MetricValue::Score(r), "Average rating: ", "/10. ");
    }
    if let Some(n) = sc.rated_count {
        base.fact("rated_count", MetricValue::Count(n), "Rated schools: ", ". ");
    }

    // Sub-category split unit: school level, in first-appearance order.
    let mut groups: Vec<(String, String, SectionProse)> = Vec::new();
    for school in &sc.list {
        let level = school.level.clone().unwrap_or_else(|| "other".to_string());
        let subkey = slugify(&level);
        if !groups.iter().any(|(k, _, _)| *k == subkey) {
            let lead = format!("{} {} schools. ", p.name, level.to_lowercase());
            groups.push((subkey.clone(), level.clone(), SectionProse::new(lead)));
        }
        let prose = &mut groups.iter_mut().find(|(k, _, _)| *k == subkey).expect("group just ensured").2;

        let mut quals: Vec<String> = Vec::new();
        if let Some(b) = &school.board {
            quals.push(b.clone());
        }
        if let Some(l) = &school.level {
            quals.push(l.clone());
        }
        if quals.is_empty() && school.rating.is_none() {
            prose.push(&format!("{}. ", school.name));
            continue;
        }
        prose.push(&format!("{} ({}", school.name, quals.join(", ")));
        if let Some(r) = school.rating {
            let sep = if quals.is_empty() { "" } else { ", " };
            prose.fact(
                &format!("{}_rating", slugify(&school.name)),
                MetricValue::Score(r),
                &format!("{sep}rating: "),
                "/10",
            );
        }
        prose.push("). ");
    }

    let mut segments = vec![(String::new(), base)];
    segments.extend(groups.into_iter().map(|(subkey, _, prose)| (subkey, prose)));
    segments
}

fn transit_prose(p: &NormalizedProfile) -> SectionProse {
    let t = &p.transit;
    let mut w = SectionProse::new(format!("{} transit. ", p.name));
    if let Some(n) = t.stop_count {
        w.fact("stop_count", MetricValue::Count(n), "Transit stops: ", ". ");
    }
    if let Some(r) = t.stops_per_1000 {
        w.fact("stops_per_1000", MetricValue::Rate(r), "Stops per 1,000 residents: ", ". ");
    }
    if !t.routes.is_empty() {
        let routes: Vec<String> = t
            .routes
            .iter()
            .map(|r| match &r.destination {
                Some(d) => format!("Route {} ({d})", r.route),
                None => format!("Route {}", r.route),
            })
            .collect();
        w.push(&format!("Key routes: {}. ", routes.join(", ")));
    }
    w
}

fn demographics_prose(p: &NormalizedProfile) -> SectionProse {
    let d = &p.demographics;
    let mut w = SectionProse::new(format!("{} demographics (Census 2021). ", p.name));
    if let Some(v) = d.median_age {
        w.fact("median_age", MetricValue::Rate(v), "Median age: ", ". ");
    }
    if let Some(v) = d.avg_income {
        w.fact("avg_income", MetricValue::Dollars(v), "Average income: ", ". ");
    }
    if let Some(v) = d.owner_pct {
        w.fact("owner_pct", MetricValue::Percent(v), "Homeowners: ", "");
        if let Some(r) = d.renter_pct {
            w.fact("renter_pct", MetricValue::Percent(r), ", renters: ", "");
        }
        w.push(". ");
    } else if let Some(r) = d.renter_pct {
        w.fact("renter_pct", MetricValue::Percent(r), "Renters: ", ". ");
    }
    if let Some(v) = d.visible_minority_pct {
        w.fact("visible_minority_pct", MetricValue::Percent(v), "Visible minority: ", ". ");
    }
    w
}

fn business_prose(p: &NormalizedProfile) -> SectionProse {
    let b = &p.business;
    let mut w = SectionProse::new(format!("{} business and development. ", p.name));
    if let Some(c) = &b.character {
        w.fact("character", MetricValue::Label(c.clone()), "Business character: ", ". ");
    }
    if let Some(n) = b.total_businesses {
        w.fact("total_businesses", MetricValue::Count(n), "Total active businesses: ", ". ");
    }
    if let Some(n) = b.active_licenses {
        w.fact("active_licenses", MetricValue::Count(n), "Active business licenses: ", "");
        if let Some(avg) = b.city_avg_licenses {
            w.fact("city_avg_licenses", MetricValue::Rate(avg), " (city average: ", ")");
        }
        w.push(". ");
    }
    if !b.top_license_types.is_empty() {
        w.push("Top license types: ");
        let mut first = true;
        for t in &b.top_license_types {
            if let Some(n) = t.count {
                if !first {
                    w.push(", ");
                }
                w.fact(
                    &format!("{}_licenses", slugify(&t.kind)),
                    MetricValue::Count(n),
                    &format!("{} (", t.kind),
                    ")",
                );
                first = false;
            }
        }
        w.push(". ");
    }
    if let Some(n) = b.permits_12mo {
        w.fact("permits_12mo", MetricValue::Count(n), "Building permits (12 months): ", "");
        if let Some(d) = b.permits_yoy_pct {
            w.fact("permits_yoy_pct", MetricValue::DeltaPercent(d), " (", " YoY)");
        }
        w.push(". ");
    }
    if let Some(n) = b.units_created_12mo {
        w.fact("units_created_12mo", MetricValue::Count(n), "Units created: ", ". ");
    }
    if let Some(v) = b.permit_value_12mo {
        w.fact("permit_value_12mo", MetricValue::Dollars(v), "Total permit value: ", ". ");
    }
    w
}

fn amenities_segments(p: &NormalizedProfile) -> Vec<(String, SectionProse)> {
    let a = &p.amenities;
    let mut segments: Vec<(String, SectionProse)> = Vec::new();

    let lead = format!("{} amenities. ", p.name);
    let lead_len = lead.len();
    let mut essentials = SectionProse::new(lead);
    if !a.grocery.is_empty() {
        essentials.push(&format!("Grocery stores: {}", a.grocery[..a.grocery.len().min(5)].join(", ")));
        if a.grocery.len() > 5 {
            essentials.push(&format!(" (+{} more)", a.grocery.len() - 5));
        }
        essentials.push(". ");
    }
    if let Some(n) = a.restaurant_count {
        essentials.fact("restaurant_count", MetricValue::Count(n), "Restaurants: ", ". ");
    }
    if let Some(n) = a.cafe_count {
        essentials.fact("cafe_count", MetricValue::Count(n), "Cafes: ", ". ");
    }
    if !a.pharmacy.is_empty() {
        essentials.fact(
            "pharmacy_count",
            MetricValue::Count(a.pharmacy.len() as i64),
            "Pharmacies: ",
            ". ",
        );
    }
    if !a.childcare.is_empty() {
        essentials.fact(
            "childcare_count",
            MetricValue::Count(a.childcare.len() as i64),
            "Childcare centres: ",
            ". ",
        );
    }
    if !essentials.is_lead_only(lead_len) {
        segments.push(("essentials".to_string(), essentials));
    }

    let lead = format!("{} parks and landmarks. ", p.name);
    let lead_len = lead.len();
    let mut outdoors = SectionProse::new(lead);
    if !a.parks.is_empty() {
        outdoors.push(&format!("Parks: {}. ", a.parks[..a.parks.len().min(3)].join(", ")));
    }
    if !a.recreation.is_empty() {
        outdoors.push(&format!(
            "Recreation facilities: {}. ",
            a.recreation[..a.recreation.len().min(3)].join(", ")
        ));
    }
    if !a.landmarks.is_empty() {
        outdoors.push(&format!(
            "Landmarks: {}. ",
            a.landmarks[..a.landmarks.len().min(5)].join(", ")
        ));
    }
    if !outdoors.is_lead_only(lead_len) {
        segments.push(("outdoors".to_string(), outdoors));
    }

    segments
}

fn title_words(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::normalize::normalize_profile;
    use serde_json::json;

    #[test]
    fn empty_sections_state_their_absence() {
        let profile = normalize_profile(&json!({"name": "Seton"})).expect("normalize");
        let chunks = chunk_profile(&profile, &ChunkerConfig::default());
        assert_eq!(chunks.len(), 9);
        assert!(chunks.iter().all(|c| c.text.contains("is available for Seton")));
        assert!(chunks.iter().all(|c| c.metrics.is_empty()));
        assert!(chunks.iter().all(|c| c.viz_ref.is_none()));
    }

    #[test]
    fn sentence_splitter_keeps_separators() {
        let parts = split_sentences("One. Two and more. Three");
        assert_eq!(parts, vec!["One. ", "Two and more. ", "Three"]);
        assert_eq!(parts.concat(), "One. Two and more. Three");
    }
}
