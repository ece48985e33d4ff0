use pretty_assertions::assert_eq;
use serde_json::json;

use pulse_core::normalize::normalize_profile;

#[test]
fn normalizes_a_full_record_and_derives_the_slug() {
    let raw = json!({
        "name": "Beltline",
        "overview": {
            "population": 25129,
            "safety_percentile": 10.0,
            "avg_home_value": 321000.0,
            "sector": "Centre",
            "description": "Dense inner-city neighbourhood."
        },
        "safety": {
            "percentile": 10.0,
            "incidents": 1365,
            "rate_per_1000": 50.9,
            "yoy_pct": 6.8,
            "property_pct": 55.0,
            "violent_pct": 45.0
        },
        "unknown_extra_field": {"ignored": true}
    });

    let profile = normalize_profile(&raw).expect("normalize");
    assert_eq!(profile.name, "Beltline");
    assert_eq!(profile.slug, "beltline");
    assert_eq!(profile.overview.population, Some(25129));
    assert_eq!(profile.safety.incidents, Some(1365));

    // Missing sections come back explicitly empty, not absent.
    assert!(profile.housing.is_empty());
    assert!(profile.transit.is_empty());
    assert!(profile.amenities.is_empty());
    assert!(!profile.safety.is_empty());
}

#[test]
fn explicit_slug_wins_over_the_derived_one() {
    let raw = json!({"name": "Tuscany Hills", "slug": "tuscany"});
    let profile = normalize_profile(&raw).expect("normalize");
    assert_eq!(profile.slug, "tuscany");

    let raw = json!({"name": "Tuscany Hills"});
    let profile = normalize_profile(&raw).expect("normalize");
    assert_eq!(profile.slug, "tuscany-hills");
}

#[test]
fn rejects_a_record_without_a_name() {
    let err = normalize_profile(&json!({"safety": {"percentile": 50.0}})).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");

    let err = normalize_profile(&json!({"name": "   "})).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
}

#[test]
fn rejects_non_object_records() {
    let err = normalize_profile(&json!([1, 2, 3])).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
}

#[test]
fn rejects_out_of_range_percentiles_naming_the_field() {
    let raw = json!({"name": "Seton", "safety": {"percentile": 140.0}});
    let err = normalize_profile(&raw).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
    assert!(err.details.unwrap().contains("safety.percentile"));
}

#[test]
fn rejects_negative_counts_naming_the_field() {
    let raw = json!({"name": "Seton", "transit": {"stop_count": -3}});
    let err = normalize_profile(&raw).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
    assert!(err.details.unwrap().contains("transit.stop_count"));
}

#[test]
fn rejects_school_ratings_outside_the_scale() {
    let raw = json!({
        "name": "Seton",
        "schools": {"count": 1, "list": [{"name": "Seton School", "rating": 11.0}]}
    });
    let err = normalize_profile(&raw).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
    assert!(err.details.unwrap().contains("schools.list.rating"));
}

#[test]
fn rejects_type_mismatches_in_section_data() {
    let raw = json!({"name": "Seton", "safety": {"incidents": "many"}});
    let err = normalize_profile(&raw).unwrap_err();
    assert_eq!(err.code, "PROFILE_MALFORMED");
}

#[test]
fn normalization_is_deterministic() {
    let raw = json!({
        "name": "Mission",
        "demographics": {"median_age": 33.0, "owner_pct": 28.0, "renter_pct": 72.0}
    });
    let a = normalize_profile(&raw).expect("first");
    let b = normalize_profile(&raw).expect("second");
    assert_eq!(a, b);
}
