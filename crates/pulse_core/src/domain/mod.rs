use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine fixed profile sections. Every normalized profile carries all of
/// them, populated or explicitly empty; chunk ids and citations are keyed by
/// the kebab-case wire form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SectionTag {
    Overview,
    Safety,
    Housing,
    ServiceRequests,
    Schools,
    Transit,
    Demographics,
    Business,
    Amenities,
}

impl SectionTag {
    pub const ALL: [SectionTag; 9] = [
        SectionTag::Overview,
        SectionTag::Safety,
        SectionTag::Housing,
        SectionTag::ServiceRequests,
        SectionTag::Schools,
        SectionTag::Transit,
        SectionTag::Demographics,
        SectionTag::Business,
        SectionTag::Amenities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionTag::Overview => "overview",
            SectionTag::Safety => "safety",
            SectionTag::Housing => "housing",
            SectionTag::ServiceRequests => "service-requests",
            SectionTag::Schools => "schools",
            SectionTag::Transit => "transit",
            SectionTag::Demographics => "demographics",
            SectionTag::Business => "business",
            SectionTag::Amenities => "amenities",
        }
    }

    pub fn parse(s: &str) -> Option<SectionTag> {
        SectionTag::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for SectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw community profile as submitted for indexing. Every field is optional;
/// unknown extra fields are ignored at deserialization. Missing sections are
/// treated as empty section data by the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawProfile {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub overview: Option<OverviewSection>,
    pub safety: Option<SafetySection>,
    pub housing: Option<HousingSection>,
    #[serde(rename = "service-requests")]
    pub service_requests: Option<ServiceRequestsSection>,
    pub schools: Option<SchoolsSection>,
    pub transit: Option<TransitSection>,
    pub demographics: Option<DemographicsSection>,
    pub business: Option<BusinessSection>,
    pub amenities: Option<AmenitiesSection>,
}

/// Fixed-shape profile produced by the normalizer. All nine sections are
/// present; emptiness is explicit via each section's `is_empty`, so
/// downstream code never branches on field presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedProfile {
    pub name: String,
    pub slug: String,
    pub overview: OverviewSection,
    pub safety: SafetySection,
    pub housing: HousingSection,
    #[serde(rename = "service-requests")]
    pub service_requests: ServiceRequestsSection,
    pub schools: SchoolsSection,
    pub transit: TransitSection,
    pub demographics: DemographicsSection,
    pub business: BusinessSection,
    pub amenities: AmenitiesSection,
}

impl NormalizedProfile {
    pub fn section_is_empty(&self, tag: SectionTag) -> bool {
        match tag {
            SectionTag::Overview => self.overview.is_empty(),
            SectionTag::Safety => self.safety.is_empty(),
            SectionTag::Housing => self.housing.is_empty(),
            SectionTag::ServiceRequests => self.service_requests.is_empty(),
            SectionTag::Schools => self.schools.is_empty(),
            SectionTag::Transit => self.transit.is_empty(),
            SectionTag::Demographics => self.demographics.is_empty(),
            SectionTag::Business => self.business.is_empty(),
            SectionTag::Amenities => self.amenities.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverviewSection {
    pub population: Option<i64>,
    pub safety_percentile: Option<f64>,
    pub avg_home_value: Option<f64>,
    pub sector: Option<String>,
    pub district: Option<String>,
    pub distance_to_downtown_km: Option<f64>,
    pub description: Option<String>,
}

impl OverviewSection {
    pub fn is_empty(&self) -> bool {
        self.population.is_none()
            && self.safety_percentile.is_none()
            && self.avg_home_value.is_none()
            && self.sector.is_none()
            && self.district.is_none()
            && self.distance_to_downtown_km.is_none()
            && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetySection {
    pub percentile: Option<f64>,
    pub percentile_label: Option<String>,
    pub incidents: Option<i64>,
    pub rate_per_1000: Option<f64>,
    pub city_rate_per_1000: Option<f64>,
    pub yoy_pct: Option<f64>,
    pub property_pct: Option<f64>,
    pub violent_pct: Option<f64>,
    pub disorder_calls: Option<i64>,
    pub disorder_rate_per_1000: Option<f64>,
}

impl SafetySection {
    pub fn is_empty(&self) -> bool {
        self.percentile.is_none()
            && self.incidents.is_none()
            && self.rate_per_1000.is_none()
            && self.yoy_pct.is_none()
            && self.property_pct.is_none()
            && self.violent_pct.is_none()
            && self.disorder_calls.is_none()
            && self.disorder_rate_per_1000.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HousingType {
    pub kind: String,
    pub avg_value: Option<f64>,
    pub count: Option<i64>,
    pub yoy_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HousingSection {
    pub avg_assessed_value: Option<f64>,
    pub value_vs_city_pct: Option<f64>,
    pub property_count: Option<i64>,
    pub by_type: Vec<HousingType>,
}

impl HousingSection {
    pub fn is_empty(&self) -> bool {
        self.avg_assessed_value.is_none()
            && self.value_vs_city_pct.is_none()
            && self.property_count.is_none()
            && self.by_type.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceCategory {
    pub category: String,
    pub count: Option<i64>,
    pub yoy_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceRequestsSection {
    pub total: Option<i64>,
    pub top_categories: Vec<ServiceCategory>,
}

impl ServiceRequestsSection {
    pub fn is_empty(&self) -> bool {
        self.total.is_none() && self.top_categories.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct School {
    pub name: String,
    pub board: Option<String>,
    pub level: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchoolsSection {
    pub count: Option<i64>,
    pub avg_rating: Option<f64>,
    pub rated_count: Option<i64>,
    pub list: Vec<School>,
}

impl SchoolsSection {
    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.avg_rating.is_none() && self.list.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitRoute {
    pub route: String,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitSection {
    pub stop_count: Option<i64>,
    pub stops_per_1000: Option<f64>,
    pub routes: Vec<TransitRoute>,
}

impl TransitSection {
    pub fn is_empty(&self) -> bool {
        self.stop_count.is_none() && self.stops_per_1000.is_none() && self.routes.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemographicsSection {
    pub median_age: Option<f64>,
    pub avg_income: Option<f64>,
    pub owner_pct: Option<f64>,
    pub renter_pct: Option<f64>,
    pub visible_minority_pct: Option<f64>,
}

impl DemographicsSection {
    pub fn is_empty(&self) -> bool {
        self.median_age.is_none()
            && self.avg_income.is_none()
            && self.owner_pct.is_none()
            && self.renter_pct.is_none()
            && self.visible_minority_pct.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LicenseType {
    pub kind: String,
    pub count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BusinessSection {
    pub character: Option<String>,
    pub total_businesses: Option<i64>,
    pub active_licenses: Option<i64>,
    pub city_avg_licenses: Option<f64>,
    pub top_license_types: Vec<LicenseType>,
    pub permits_12mo: Option<i64>,
    pub permits_yoy_pct: Option<f64>,
    pub units_created_12mo: Option<i64>,
    pub permit_value_12mo: Option<f64>,
}

impl BusinessSection {
    pub fn is_empty(&self) -> bool {
        self.character.is_none()
            && self.total_businesses.is_none()
            && self.active_licenses.is_none()
            && self.top_license_types.is_empty()
            && self.permits_12mo.is_none()
            && self.units_created_12mo.is_none()
            && self.permit_value_12mo.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmenitiesSection {
    pub grocery: Vec<String>,
    pub pharmacy: Vec<String>,
    pub childcare: Vec<String>,
    pub restaurant_count: Option<i64>,
    pub cafe_count: Option<i64>,
    pub parks: Vec<String>,
    pub recreation: Vec<String>,
    pub landmarks: Vec<String>,
}

impl AmenitiesSection {
    pub fn is_empty(&self) -> bool {
        self.grocery.is_empty()
            && self.pharmacy.is_empty()
            && self.childcare.is_empty()
            && self.restaurant_count.is_none()
            && self.cafe_count.is_none()
            && self.parks.is_empty()
            && self.recreation.is_empty()
            && self.landmarks.is_empty()
    }
}
