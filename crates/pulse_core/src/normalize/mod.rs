use serde_json::Value;

use crate::domain::{NormalizedProfile, RawProfile};
use crate::error::AppError;

/// Normalize a raw profile document into the fixed nine-section shape.
///
/// Contract:
/// - Pure transformation; no side effects.
/// - Unknown extra fields in the document are ignored.
/// - Missing sections become explicitly-empty section data.
/// - Fails with `PROFILE_MALFORMED` when the community name is missing, a
///   percentile/percentage lies outside [0, 100], a school rating lies
///   outside [0, 10], or any count/rate/amount is negative. The offending
///   field is named in `details`; no silent clamping or guessing.
pub fn normalize_profile(raw: &Value) -> Result<NormalizedProfile, AppError> {
    if !raw.is_object() {
        return Err(AppError::new(
            "PROFILE_MALFORMED",
            "Profile record must be a JSON object",
        ));
    }

    let parsed: RawProfile = serde_json::from_value(raw.clone()).map_err(|e| {
        AppError::new("PROFILE_MALFORMED", "Profile record failed to decode")
            .with_details(e.to_string())
    })?;

    let name = parsed
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::new("PROFILE_MALFORMED", "Profile community name is required"))?
        .to_string();

    let slug = match parsed.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => slugify(s),
        _ => slugify(&name),
    };
    if slug.is_empty() {
        return Err(
            AppError::new("PROFILE_MALFORMED", "Profile community name yields an empty slug")
                .with_details(format!("name={name}")),
        );
    }

    let profile = NormalizedProfile {
        name,
        slug,
        overview: parsed.overview.unwrap_or_default(),
        safety: parsed.safety.unwrap_or_default(),
        housing: parsed.housing.unwrap_or_default(),
        service_requests: parsed.service_requests.unwrap_or_default(),
        schools: parsed.schools.unwrap_or_default(),
        transit: parsed.transit.unwrap_or_default(),
        demographics: parsed.demographics.unwrap_or_default(),
        business: parsed.business.unwrap_or_default(),
        amenities: parsed.amenities.unwrap_or_default(),
    };

    validate_sections(&profile)?;
    Ok(profile)
}

/// Lowercase, alphanumeric runs joined by single hyphens.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn validate_sections(p: &NormalizedProfile) -> Result<(), AppError> {
    let o = &p.overview;
    check_count("overview.population", o.population)?;
    check_pct("overview.safety_percentile", o.safety_percentile)?;
    check_amount("overview.avg_home_value", o.avg_home_value)?;
    check_amount("overview.distance_to_downtown_km", o.distance_to_downtown_km)?;

    let s = &p.safety;
    check_pct("safety.percentile", s.percentile)?;
    check_count("safety.incidents", s.incidents)?;
    check_amount("safety.rate_per_1000", s.rate_per_1000)?;
    check_amount("safety.city_rate_per_1000", s.city_rate_per_1000)?;
    check_pct("safety.property_pct", s.property_pct)?;
    check_pct("safety.violent_pct", s.violent_pct)?;
    check_count("safety.disorder_calls", s.disorder_calls)?;
    check_amount("safety.disorder_rate_per_1000", s.disorder_rate_per_1000)?;

    let h = &p.housing;
    check_amount("housing.avg_assessed_value", h.avg_assessed_value)?;
    check_pct_abs("housing.value_vs_city_pct", h.value_vs_city_pct)?;
    check_count("housing.property_count", h.property_count)?;
    for t in &h.by_type {
        if t.kind.trim().is_empty() {
            return Err(AppError::new(
                "PROFILE_MALFORMED",
                "Housing type entry is missing its kind",
            ));
        }
        check_amount("housing.by_type.avg_value", t.avg_value)?;
        check_count("housing.by_type.count", t.count)?;
    }

    let sr = &p.service_requests;
    check_count("service-requests.total", sr.total)?;
    for c in &sr.top_categories {
        if c.category.trim().is_empty() {
            return Err(AppError::new(
                "PROFILE_MALFORMED",
                "Service request category entry is missing its name",
            ));
        }
        check_count("service-requests.top_categories.count", c.count)?;
    }

    let sc = &p.schools;
    check_count("schools.count", sc.count)?;
    check_count("schools.rated_count", sc.rated_count)?;
    check_rating("schools.avg_rating", sc.avg_rating)?;
    for school in &sc.list {
        if school.name.trim().is_empty() {
            return Err(AppError::new(
                "PROFILE_MALFORMED",
                "School entry is missing its name",
            ));
        }
        check_rating("schools.list.rating", school.rating)?;
    }

    let t = &p.transit;
    check_count("transit.stop_count", t.stop_count)?;
    check_amount("transit.stops_per_1000", t.stops_per_1000)?;

    let d = &p.demographics;
    check_amount("demographics.median_age", d.median_age)?;
    check_amount("demographics.avg_income", d.avg_income)?;
    check_pct("demographics.owner_pct", d.owner_pct)?;
    check_pct("demographics.renter_pct", d.renter_pct)?;
    check_pct("demographics.visible_minority_pct", d.visible_minority_pct)?;

    let b = &p.business;
    check_count("business.total_businesses", b.total_businesses)?;
    check_count("business.active_licenses", b.active_licenses)?;
    check_amount("business.city_avg_licenses", b.city_avg_licenses)?;
    for l in &b.top_license_types {
        check_count("business.top_license_types.count", l.count)?;
    }
    check_count("business.permits_12mo", b.permits_12mo)?;
    check_count("business.units_created_12mo", b.units_created_12mo)?;
    check_amount("business.permit_value_12mo", b.permit_value_12mo)?;

    let a = &p.amenities;
    check_count("amenities.restaurant_count", a.restaurant_count)?;
    check_count("amenities.cafe_count", a.cafe_count)?;

    Ok(())
}

fn check_pct(field: &str, v: Option<f64>) -> Result<(), AppError> {
    match v {
        Some(x) if !(0.0..=100.0).contains(&x) => Err(AppError::new(
            "PROFILE_MALFORMED",
            "Percentage value outside [0, 100]",
        )
        .with_details(format!("{field}={x}"))),
        _ => Ok(()),
    }
}

// Vs-city deltas may be negative; below -100 is not a percentage.
fn check_pct_abs(field: &str, v: Option<f64>) -> Result<(), AppError> {
    match v {
        Some(x) if x < -100.0 => Err(AppError::new(
            "PROFILE_MALFORMED",
            "Comparison percentage below -100",
        )
        .with_details(format!("{field}={x}"))),
        _ => Ok(()),
    }
}

fn check_rating(field: &str, v: Option<f64>) -> Result<(), AppError> {
    match v {
        Some(x) if !(0.0..=10.0).contains(&x) => Err(AppError::new(
            "PROFILE_MALFORMED",
            "Rating value outside [0, 10]",
        )
        .with_details(format!("{field}={x}"))),
        _ => Ok(()),
    }
}

fn check_count(field: &str, v: Option<i64>) -> Result<(), AppError> {
    match v {
        Some(x) if x < 0 => Err(AppError::new("PROFILE_MALFORMED", "Negative count")
            .with_details(format!("{field}={x}"))),
        _ => Ok(()),
    }
}

fn check_amount(field: &str, v: Option<f64>) -> Result<(), AppError> {
    match v {
        Some(x) if x < 0.0 => Err(AppError::new("PROFILE_MALFORMED", "Negative amount")
            .with_details(format!("{field}={x}"))),
        _ => Ok(()),
    }
}
