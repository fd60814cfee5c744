//! Payload builders and a structural test indexer.
//!
//! The indexer is a small stand-in for a real search parameter extractor: it
//! reads a handful of well-known elements by shape and emits entries of every
//! kind the store supports, which is enough to exercise each index table
//! without dragging profile tooling into the tests.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};

use fhir_store::error::IndexError;
use fhir_store::index::{
    DateIndex, DateTimeIndex, NumberIndex, PositionIndex, QuantityIndex, ReferenceIndex,
    StringIndex, TokenIndex, UriIndex,
};
use fhir_store::{Resource, ResourceIndexer, ResourceIndices};

/// Content key that makes [`TestIndexer`] fail, for write atomicity tests.
pub const FAIL_INDEXING_KEY: &str = "failIndexing";

/// A structural indexer covering every index kind.
pub struct TestIndexer;

impl ResourceIndexer for TestIndexer {
    fn index(&self, resource: &Resource) -> Result<ResourceIndices, IndexError> {
        let content = resource.content();
        let type_name = resource.resource_type().to_string();

        if content.get(FAIL_INDEXING_KEY).is_some() {
            return Err(IndexError::Extraction {
                message: "payload marked to fail".to_string(),
            });
        }

        let mut indices = ResourceIndices::default();

        if let Some(status) = str_at(content, "/status") {
            indices.token_indexes.push(TokenIndex::new(
                "status",
                format!("{type_name}.status"),
                None,
                status,
            ));
        }
        if let (Some(system), Some(code)) = (
            str_at(content, "/code/coding/0/system"),
            str_at(content, "/code/coding/0/code"),
        ) {
            indices.token_indexes.push(TokenIndex::new(
                "code",
                format!("{type_name}.code"),
                Some(system.to_string()),
                code,
            ));
        }
        if let Some(reference) = str_at(content, "/subject/reference") {
            indices.reference_indexes.push(ReferenceIndex::new(
                "subject",
                format!("{type_name}.subject"),
                reference,
            ));
        }
        if let Some(items) = content.get("generalPractitioner").and_then(Value::as_array) {
            for item in items {
                if let Some(reference) = item.get("reference").and_then(Value::as_str) {
                    indices.reference_indexes.push(ReferenceIndex::new(
                        "general-practitioner",
                        format!("{type_name}.generalPractitioner"),
                        reference,
                    ));
                }
            }
        }
        if let Some(family) = str_at(content, "/name/0/family") {
            indices.string_indexes.push(StringIndex::new(
                "family",
                format!("{type_name}.name.family"),
                family,
            ));
        }
        if let Some(date) = str_at(content, "/birthDate").and_then(|s| s.parse::<NaiveDate>().ok())
        {
            indices.date_indexes.push(DateIndex::day(
                "birthdate",
                format!("{type_name}.birthDate"),
                date,
            ));
        }
        if let Some(at) = instant_at(content, "/effectiveDateTime") {
            indices.date_time_indexes.push(DateTimeIndex::instant(
                "date",
                format!("{type_name}.effective"),
                at,
            ));
        }
        if let Some(value) = content
            .pointer("/valueQuantity/value")
            .and_then(Value::as_f64)
        {
            indices.quantity_indexes.push(QuantityIndex::new(
                "value-quantity",
                format!("{type_name}.value"),
                str_at(content, "/valueQuantity/system").map(str::to_string),
                str_at(content, "/valueQuantity/unit").map(str::to_string),
                value,
            ));
        }
        if let Some(value) = content
            .pointer("/prediction/0/probabilityDecimal")
            .and_then(Value::as_f64)
        {
            indices.number_indexes.push(NumberIndex::new(
                "probability",
                format!("{type_name}.prediction.probability"),
                value,
            ));
        }
        if let (Some(latitude), Some(longitude)) = (
            content.pointer("/position/latitude").and_then(Value::as_f64),
            content
                .pointer("/position/longitude")
                .and_then(Value::as_f64),
        ) {
            indices.position_indexes.push(PositionIndex::new(
                "near",
                format!("{type_name}.position"),
                latitude,
                longitude,
            ));
        }
        if let Some(url) = str_at(content, "/url") {
            indices
                .uri_indexes
                .push(UriIndex::new("url", format!("{type_name}.url"), url));
        }
        if let Some(at) = instant_at(content, "/meta/lastUpdated") {
            indices.date_time_indexes.push(DateTimeIndex::instant(
                "_lastUpdated",
                format!("{type_name}.meta.lastUpdated"),
                at,
            ));
        }

        Ok(indices)
    }
}

fn str_at<'a>(content: &'a Value, pointer: &str) -> Option<&'a str> {
    content.pointer(pointer).and_then(Value::as_str)
}

fn instant_at(content: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    str_at(content, pointer)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Builds a resource from fixture JSON, panicking on malformed fixtures.
pub fn resource(content: Value) -> Resource {
    Resource::from_content(content).expect("fixture payload should be valid")
}

/// A patient with a family name and birth date.
pub fn patient(id: &str, family: &str) -> Resource {
    resource(json!({
        "resourceType": "Patient",
        "id": id,
        "active": true,
        "name": [{"family": family}],
        "birthDate": "1990-04-02"
    }))
}

/// A patient whose care team points at a practitioner.
pub fn patient_with_practitioner(id: &str, family: &str, practitioner_ref: &str) -> Resource {
    resource(json!({
        "resourceType": "Patient",
        "id": id,
        "name": [{"family": family}],
        "generalPractitioner": [{"reference": practitioner_ref}]
    }))
}

/// A practitioner with a family name.
pub fn practitioner(id: &str, family: &str) -> Resource {
    resource(json!({
        "resourceType": "Practitioner",
        "id": id,
        "name": [{"family": family}]
    }))
}

/// A blood pressure observation pointing at a subject.
pub fn observation(id: &str, subject_ref: &str) -> Resource {
    resource(json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"coding": [{"system": "http://loinc.org", "code": "85354-9"}]},
        "subject": {"reference": subject_ref},
        "effectiveDateTime": "2024-05-10T09:30:00Z",
        "valueQuantity": {
            "value": 120.0,
            "unit": "mmHg",
            "system": "http://unitsofmeasure.org"
        }
    }))
}

/// A payload whose elements touch all nine index kinds at once.
///
/// The element mix is not clinically meaningful; the structural indexer only
/// looks at shapes, and one record per table keeps cascade assertions short.
pub fn fully_indexed(id: &str) -> Resource {
    resource(json!({
        "resourceType": "Patient",
        "id": id,
        "status": "active",
        "code": {"coding": [{"system": "http://example.org/cs", "code": "x-1"}]},
        "subject": {"reference": "Patient/someone-else"},
        "name": [{"family": "Everywhere"}],
        "birthDate": "1990-04-02",
        "effectiveDateTime": "2024-05-10T09:30:00Z",
        "valueQuantity": {"value": 12.5, "unit": "mg", "system": "http://unitsofmeasure.org"},
        "prediction": [{"probabilityDecimal": 0.25}],
        "position": {"latitude": 52.52, "longitude": 13.405},
        "url": "http://example.org/instances/1"
    }))
}
