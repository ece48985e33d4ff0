use pulse_core::domain::SectionTag;

use super::model::VizRef;

/// Fixed per-section visualization lookup. Locators are page-anchor URLs on
/// the public profile site; labels describe what the reader will find there.
/// Sections without a known visualization return `None`.
pub fn viz_for_section(base_url: &str, slug: &str, section: SectionTag) -> Option<VizRef> {
    let (fragment, label) = match section {
        SectionTag::Overview => ("", "Population, safety score, and assessed value stat cards"),
        SectionTag::Safety => ("#safety", "Crime and disorder trend charts with city comparison"),
        SectionTag::Housing => ("#housing", "Assessed values by property type"),
        SectionTag::ServiceRequests => ("#311", "Top 311 request categories bar chart"),
        SectionTag::Schools => ("#schools", "School list with ratings"),
        SectionTag::Transit => ("#transit", "Transit stop density and key routes"),
        SectionTag::Demographics => ("#demographics", "Census demographics stat grid"),
        SectionTag::Business => ("#business", "Business licences and building permits"),
        SectionTag::Amenities => ("#amenities", "Amenity and landmark lists"),
    };
    Some(VizRef {
        locator: format!("{}/{}{}", base_url.trim_end_matches('/'), slug, fragment),
        label: label.to_string(),
    })
}
