//! Patients and encounters.

use hms_core::{
    AdmitPatient, ApiRequest, CreateEncounter, CreatePatient, EncounterFilter, EntityTag,
    GetPatientsQuery, Mutation, QueryDescriptor, UpdatePatient,
};
use serde_json::json;

pub const DEFAULT_LATEST_ENCOUNTERS: u32 = 10;
pub const DEFAULT_ENCOUNTER_LIMIT: u32 = 20;

/// Paged, searchable patient listing.
pub fn get_patients(query: &GetPatientsQuery) -> QueryDescriptor {
    let request = ApiRequest::get("/patients")
        .param("page", query.page)
        .param("limit", query.limit)
        .param("search", &query.search);
    QueryDescriptor::new("getPatients", query, request).provides([EntityTag::patient()])
}

/// One patient with their most recent encounters.
pub fn get_patient(id: &str, latest_encounters: Option<u32>) -> QueryDescriptor {
    let latest = latest_encounters.unwrap_or(DEFAULT_LATEST_ENCOUNTERS);
    let request = ApiRequest::get(format!("/patients/{id}")).param("latestEncounters", latest);
    QueryDescriptor::new(
        "getPatient",
        &json!({ "id": id, "latestEncounters": latest }),
        request,
    )
    .provides([EntityTag::patient_id(id)])
}

/// Encounter history for one patient. Empty filter values are treated as
/// absent, both on the wire and in the cache key.
pub fn get_patient_encounters(id: &str, filter: &EncounterFilter) -> QueryDescriptor {
    let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
    let args = EncounterFilter {
        limit: Some(filter.limit.unwrap_or(DEFAULT_ENCOUNTER_LIMIT)),
        search: non_empty(&filter.search),
        start_date: non_empty(&filter.start_date),
        end_date: non_empty(&filter.end_date),
    };
    let mut request = ApiRequest::get(format!("/encounters/patients/{id}/encounters"))
        .param("limit", args.limit.unwrap_or(DEFAULT_ENCOUNTER_LIMIT));
    let optional = [
        ("search", &args.search),
        ("startDate", &args.start_date),
        ("endDate", &args.end_date),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            request = request.param(name, value);
        }
    }
    QueryDescriptor::new(
        "getPatientEncounters",
        &json!({ "id": id, "filter": args }),
        request,
    )
    .provides([EntityTag::patient_id(id)])
}

pub fn create_patient(body: &CreatePatient) -> Mutation {
    Mutation::new("createPatient", ApiRequest::post("/patients").json(body))
        .invalidates([EntityTag::patient(), EntityTag::dashboard()])
}

pub fn create_encounter(patient_id: &str, body: &CreateEncounter) -> Mutation {
    let request = ApiRequest::post(format!("/encounters/patients/{patient_id}")).json(body);
    Mutation::new("createEncounter", request)
        .invalidates([EntityTag::patient_id(patient_id), EntityTag::dashboard()])
}

pub fn update_patient(id: &str, body: &UpdatePatient) -> Mutation {
    Mutation::new("updatePatient", ApiRequest::put(format!("/patients/{id}")).json(body))
        .invalidates([EntityTag::patient_id(id), EntityTag::patient()])
}

pub fn discharge_patient(id: &str) -> Mutation {
    Mutation::new(
        "dischargePatient",
        ApiRequest::post(format!("/patients/{id}/discharge")),
    )
    .invalidates([
        EntityTag::patient_id(id),
        EntityTag::patient(),
        EntityTag::dashboard(),
    ])
}

pub fn admit_patient(id: &str, body: &AdmitPatient) -> Mutation {
    Mutation::new(
        "admitPatient",
        ApiRequest::post(format!("/patients/{id}/admit")).json(body),
    )
    .invalidates([
        EntityTag::patient_id(id),
        EntityTag::patient(),
        EntityTag::dashboard(),
    ])
}

pub fn delete_patient(id: &str) -> Mutation {
    Mutation::new("deletePatient", ApiRequest::delete(format!("/patients/{id}")))
        .invalidates([EntityTag::patient()])
}
