use pretty_assertions::assert_eq;
use serde_json::json;

use pulse_ai::chunker::{chunk_profile, ChunkerConfig};
use pulse_core::domain::SectionTag;
use pulse_core::normalize::normalize_profile;

fn beltline() -> serde_json::Value {
    json!({
        "name": "Beltline",
        "overview": {
            "population": 25129,
            "safety_percentile": 10.0,
            "avg_home_value": 321000.0,
            "sector": "Centre",
            "district": "City Centre",
            "distance_to_downtown_km": 1.2,
            "description": "Dense inner-city neighbourhood south of downtown."
        },
        "safety": {
            "percentile": 10.0,
            "percentile_label": "less safe than most communities",
            "incidents": 1365,
            "rate_per_1000": 50.9,
            "yoy_pct": 6.8,
            "property_pct": 55.0,
            "violent_pct": 45.0
        },
        "housing": {
            "avg_assessed_value": 321000.0,
            "value_vs_city_pct": -38.2,
            "property_count": 18240,
            "by_type": [
                {"kind": "apartment", "avg_value": 298000.0, "count": 16100, "yoy_pct": 4.1},
                {"kind": "row", "avg_value": 455000.0, "count": 940}
            ]
        },
        "service-requests": {
            "total": 4512,
            "top_categories": [
                {"category": "Graffiti", "count": 412, "yoy_pct": 3.0},
                {"category": "Snow and Ice", "count": 210, "yoy_pct": -12.5}
            ]
        },
        "schools": {
            "count": 3,
            "avg_rating": 6.4,
            "rated_count": 2,
            "list": [
                {"name": "Connaught School", "board": "CBE", "level": "elementary", "rating": 5.8},
                {"name": "Western Canada High School", "board": "CBE", "level": "senior high", "rating": 7.0}
            ]
        },
        "transit": {
            "stop_count": 64,
            "stops_per_1000": 2.5,
            "routes": [
                {"route": "6", "destination": "Downtown"},
                {"route": "3", "destination": "Sandstone"}
            ]
        },
        "demographics": {
            "median_age": 33.0,
            "avg_income": 68400.0,
            "owner_pct": 28.0,
            "renter_pct": 72.0,
            "visible_minority_pct": 31.0
        },
        "business": {
            "character": "Mixed retail and hospitality",
            "total_businesses": 1240,
            "active_licenses": 982,
            "city_avg_licenses": 310.5,
            "top_license_types": [
                {"kind": "Restaurant", "count": 188},
                {"kind": "Retail", "count": 154}
            ],
            "permits_12mo": 86,
            "permits_yoy_pct": 12.0,
            "units_created_12mo": 1204,
            "permit_value_12mo": 98400000.0
        },
        "amenities": {
            "grocery": ["Community Natural Foods", "Safeway Beltline", "Blush Lane"],
            "pharmacy": ["Beltline Pharmacy", "Shoppers 17th Ave"],
            "childcare": ["Beltline Daycare"],
            "restaurant_count": 214,
            "cafe_count": 47,
            "parks": ["Central Memorial Park", "Thomson Family Park"],
            "recreation": ["Repsol Sport Centre"],
            "landmarks": ["Calgary Tower", "Lougheed House"]
        }
    })
}

#[test]
fn chunking_is_idempotent() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let cfg = ChunkerConfig::default();
    let a = chunk_profile(&profile, &cfg);
    let b = chunk_profile(&profile, &cfg);
    assert_eq!(a, b);
}

#[test]
fn one_chunk_per_section_with_deterministic_ids() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    assert_eq!(chunks.len(), 9);
    let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert!(ids.contains(&"beltline-overview"));
    assert!(ids.contains(&"beltline-safety"));
    assert!(ids.contains(&"beltline-service-requests"));
    for tag in SectionTag::ALL {
        assert!(chunks.iter().any(|c| c.section == tag), "missing {tag}");
    }
}

#[test]
fn safety_chunk_inlines_all_six_figures_verbatim() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    let safety = chunks
        .iter()
        .find(|c| c.section == SectionTag::Safety)
        .expect("safety chunk");

    for figure in ["10", "1,365", "50.9", "+6.8%", "55%", "45%"] {
        assert!(
            safety.text.contains(figure),
            "missing {figure} in: {}",
            safety.text
        );
    }
    assert_eq!(safety.metrics.len(), 7); // six figures plus the percentile label
}

#[test]
fn every_metric_appears_rendered_in_its_chunk_text() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    for chunk in &chunks {
        for (key, value) in &chunk.metrics {
            assert!(
                chunk.text.contains(&value.render()),
                "metric {key} ({}) not in text of {}: {}",
                value.render(),
                chunk.chunk_id,
                chunk.text
            );
        }
    }
}

#[test]
fn chunk_text_is_self_contained() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    for chunk in &chunks {
        assert!(
            chunk.text.contains("Beltline"),
            "chunk {} does not name its community",
            chunk.chunk_id
        );
    }
}

#[test]
fn populated_sections_carry_viz_refs_from_the_lookup_table() {
    let profile = normalize_profile(&beltline()).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    let safety = chunks.iter().find(|c| c.section == SectionTag::Safety).unwrap();
    let viz = safety.viz_ref.as_ref().expect("safety viz");
    assert_eq!(
        viz.locator,
        "https://calgarypulse.ca/communities/beltline#safety"
    );
    assert!(!viz.label.is_empty());

    let overview = chunks.iter().find(|c| c.section == SectionTag::Overview).unwrap();
    assert_eq!(
        overview.viz_ref.as_ref().unwrap().locator,
        "https://calgarypulse.ca/communities/beltline"
    );
}

#[test]
fn empty_sections_produce_explicit_unavailable_chunks() {
    let profile = normalize_profile(&json!({"name": "Quarry Park"})).expect("normalize");
    let chunks = chunk_profile(&profile, &ChunkerConfig::default());
    assert_eq!(chunks.len(), 9);
    let safety = chunks.iter().find(|c| c.section == SectionTag::Safety).unwrap();
    assert_eq!(
        safety.text,
        "No safety and crime data is available for Quarry Park."
    );
    assert!(safety.metrics.is_empty());
    assert!(safety.viz_ref.is_none());
}

#[test]
fn oversize_schools_split_by_level_without_cutting_facts() {
    let schools: Vec<serde_json::Value> = (0..30)
        .map(|i| {
            json!({
                "name": format!("Prairie View School Number {i}"),
                "board": "CBE",
                "level": if i % 2 == 0 { "elementary" } else { "senior high" },
                "rating": 5.0 + (i % 5) as f64
            })
        })
        .collect();
    let raw = json!({
        "name": "Prairie View",
        "schools": {"count": 30, "avg_rating": 6.0, "rated_count": 30, "list": schools}
    });
    let profile = normalize_profile(&raw).expect("normalize");
    let cfg = ChunkerConfig {
        max_chars: 600,
        ..ChunkerConfig::default()
    };
    let chunks = chunk_profile(&profile, &cfg);

    let school_chunks: Vec<_> = chunks
        .iter()
        .filter(|c| c.section == SectionTag::Schools)
        .collect();
    assert!(school_chunks.len() > 1, "expected a sub-category split");
    assert!(school_chunks
        .iter()
        .any(|c| c.chunk_id.contains("-schools-elementary")));
    assert!(school_chunks
        .iter()
        .any(|c| c.chunk_id.contains("-schools-senior-high")));

    // Never split inside a fact: each chunk still contains the canonical
    // rendering of every metric it claims.
    for chunk in &school_chunks {
        for (key, value) in &chunk.metrics {
            assert!(
                chunk.text.contains(&value.render()),
                "metric {key} cut in half in {}",
                chunk.chunk_id
            );
        }
    }

    // Splitting stays deterministic.
    let again = chunk_profile(&profile, &cfg);
    assert_eq!(chunks, again);
}

#[test]
fn oversize_amenities_split_by_sub_category() {
    let grocery: Vec<String> = (0..40).map(|i| format!("Market Number {i}")).collect();
    let parks: Vec<String> = (0..40).map(|i| format!("Park Number {i}")).collect();
    let raw = json!({
        "name": "Riverbend",
        "amenities": {
            "grocery": grocery,
            "restaurant_count": 12,
            "parks": parks,
            "landmarks": ["Riverbend Hall"]
        }
    });
    let profile = normalize_profile(&raw).expect("normalize");
    let cfg = ChunkerConfig {
        max_chars: 150,
        ..ChunkerConfig::default()
    };
    let chunks = chunk_profile(&profile, &cfg);
    let ids: Vec<&str> = chunks
        .iter()
        .filter(|c| c.section == SectionTag::Amenities)
        .map(|c| c.chunk_id.as_str())
        .collect();
    assert!(ids.iter().any(|id| id.contains("amenities-essentials")));
    assert!(ids.iter().any(|id| id.contains("amenities-outdoors")));
}
