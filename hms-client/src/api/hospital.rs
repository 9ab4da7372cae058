//! The signed-in user's hospital.

use hms_core::{ApiRequest, EntityTag, Mutation, QueryDescriptor, UpdateHospital};

pub fn get_hospital() -> QueryDescriptor {
    QueryDescriptor::new("getHospital", &(), ApiRequest::get("/hospitals"))
        .provides([EntityTag::hospital()])
}

pub fn update_hospital(body: &UpdateHospital) -> Mutation {
    Mutation::new("updateHospital", ApiRequest::put("/hospitals").json(body))
        .invalidates([EntityTag::hospital()])
}
