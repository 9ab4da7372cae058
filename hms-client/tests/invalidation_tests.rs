//! Integration Tests for Tag Invalidation
//!
//! **Property 3: Invalidation Correctness**
//!
//! After a mutation declaring `Patient:42` succeeds, a cached entry tagged
//! `Patient:42` is marked stale and, when subscribed, refetched; an entry
//! tagged only `Dashboard` is untouched.
//!
//! **Property 4: Stale Overwrite Immunity**
//!
//! A fetch still in flight when its entry is invalidated has its result
//! discarded on arrival; the entry stays stale until explicitly refetched.

use hms_client::api::{dashboard, patients};
use hms_client::{GetPatientsQuery, HmsClient, QueryStatus};
use hms_core::{ApiRequest, EntityTag, Method, Mutation, UpdatePatient};
use hms_test_utils::{failure, fixtures, ok, MockTransport};
use serde_json::json;
use std::sync::Arc;

fn client(mock: &Arc<MockTransport>) -> HmsClient {
    HmsClient::with_transport(mock.clone(), Default::default(), None)
}

#[tokio::test]
async fn test_instance_tag_invalidates_only_matching_entries() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Get, "/patients/42", ok(json!({ "data": { "version": 1 } })))
        .respond(Method::Get, "/patients/42", ok(json!({ "data": { "version": 2 } })))
        .respond_always(Method::Get, "/dashboard/stats", ok(fixtures::dashboard_stats(10)))
        .respond_always(Method::Put, "/patients/42", ok(json!({ "data": {} })));
    let client = client(&mock);

    let mut patient = client.query(patients::get_patient("42", None));
    let mut stats = client.query(dashboard::get_dashboard_stats());
    assert_eq!(patient.settled().await.unwrap()["data"]["version"], 1);
    stats.settled().await.unwrap();
    let stats_before = stats.current();

    let (_, report) = client
        .coordinator()
        .mutate_with_report(&patients::update_patient("42", &UpdatePatient::default()))
        .await
        .unwrap();
    assert_eq!(report.invalidated, vec![patient.key().clone()]);
    assert_eq!(report.refetched, vec![patient.key().clone()]);

    let refreshed = patient.settled().await.unwrap();
    assert_eq!(refreshed["data"]["version"], 2);
    assert_eq!(mock.call_count(Method::Get, "/patients/42"), 2);

    assert_eq!(stats.current(), stats_before);
    assert_eq!(mock.call_count(Method::Get, "/dashboard/stats"), 1);
}

#[tokio::test]
async fn test_collection_tag_does_not_reach_instances() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_always(Method::Get, "/patients", ok(fixtures::patients_page(&["Ann"])))
        .respond_always(Method::Get, "/patients/7", ok(json!({ "data": {} })));
    let client = client(&mock);

    let list = patients::get_patients(&GetPatientsQuery::default());
    let single = patients::get_patient("7", None);
    client.fetch(list.clone()).await.unwrap();
    client.fetch(single.clone()).await.unwrap();

    let report = client
        .coordinator()
        .engine()
        .apply(&[EntityTag::patient()].into_iter().collect());

    assert_eq!(report.invalidated, vec![list.key().clone()]);
    assert!(report.refetched.is_empty());
    assert_eq!(client.store().get(list.key()).unwrap().status, QueryStatus::Stale);
    assert_eq!(client.store().get(single.key()).unwrap().status, QueryStatus::Resolved);
}

#[tokio::test]
async fn test_unsubscribed_entry_stays_stale_until_used() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Get, "/patients", ok(fixtures::patients_page(&["Ann"])))
        .respond(Method::Get, "/patients", ok(fixtures::patients_page(&["Ann", "Bo"])))
        .respond_always(Method::Post, "/patients", ok(json!({ "data": {} })));
    let client = client(&mock);
    let list = patients::get_patients(&GetPatientsQuery::default());

    client.fetch(list.clone()).await.unwrap();
    client
        .mutate(&patients::create_patient(&Default::default()))
        .await
        .unwrap();

    assert_eq!(client.store().get(list.key()).unwrap().status, QueryStatus::Stale);
    assert_eq!(mock.call_count(Method::Get, "/patients"), 1);

    let page = client.fetch(list).await.unwrap();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(mock.call_count(Method::Get, "/patients"), 2);
}

#[tokio::test]
async fn test_failed_mutation_invalidates_nothing() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_always(Method::Get, "/hospitals", ok(fixtures::hospital("St. Mary")))
        .respond_always(Method::Put, "/hospitals", failure(422, "Name is required"));
    let client = client(&mock);
    let hospital = hms_client::api::hospital::get_hospital();

    client.fetch(hospital.clone()).await.unwrap();
    let err = client
        .mutate(&hms_client::api::hospital::update_hospital(&Default::default()))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Name is required");
    assert_eq!(client.store().get(hospital.key()).unwrap().status, QueryStatus::Resolved);
}

#[tokio::test]
async fn test_in_flight_result_discarded_after_invalidation() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Get, "/patients", ok(fixtures::patients_page(&["Old"])))
        .respond(Method::Get, "/patients", ok(fixtures::patients_page(&["New"])));
    let gate = mock.gate(Method::Get, "/patients");
    let client = client(&mock);
    let list = patients::get_patients(&GetPatientsQuery::default());

    drop(client.query(list.clone()));
    mock.wait_for_calls(Method::Get, "/patients", 1).await;
    let flight = client.store().in_flight(list.key()).unwrap();

    let report = client
        .coordinator()
        .engine()
        .apply(&[EntityTag::patient()].into_iter().collect());
    assert!(report.refetched.is_empty());

    gate.open();
    let late = flight.await.unwrap();
    assert_eq!(late["data"][0]["firstName"], "Old");

    let snapshot = client.store().get(list.key()).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Stale);
    assert!(snapshot.data.is_none());
    assert_eq!(client.store().stats().discarded_results, 1);

    let fresh = client.fetch(list).await.unwrap();
    assert_eq!(fresh["data"][0]["firstName"], "New");
}

#[tokio::test]
async fn test_mutation_without_tags_touches_nothing() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_always(Method::Get, "/dashboard/wards", ok(json!({ "data": [] })))
        .respond_always(Method::Post, "/auth/change-password", ok(json!({ "success": true })));
    let client = client(&mock);
    let wards = dashboard::get_ward_occupancy();
    client.fetch(wards.clone()).await.unwrap();

    let (_, report) = client
        .coordinator()
        .mutate_with_report(&Mutation::new("noop", ApiRequest::post("/auth/change-password")))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(client.store().get(wards.key()).unwrap().status, QueryStatus::Resolved);
}
