//! HMS Test Utilities
//!
//! Shared test infrastructure for the HMS workspace:
//! - [`MockTransport`], a scripted in-memory [`Transport`]
//! - Proptest generators for query arguments and tags
//! - Fixtures for backend payloads

pub use hms_core::{
    ApiRequest, AuthUser, EntityTag, HmsResult, HttpFailure, Method, QueryDescriptor, QueryKey,
    TagSet, Transport,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Holds matching requests until opened.
///
/// The response for a held request is chosen when the request arrives, so
/// scripted queues are consumed in arrival order regardless of release time.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    open: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every held request and let later ones through.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Default)]
struct Route {
    queue: VecDeque<HmsResult<Value>>,
    fallback: Option<HmsResult<Value>>,
    gate: Option<Gate>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), Route>,
    calls: Vec<ApiRequest>,
}

/// In-memory transport scripted per (method, path).
///
/// Each route answers from its queue first and then from its fallback.
/// Requests to unscripted routes get a 404 `Validation` failure. Every request
/// is recorded, including the `Authorization` header it carried.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    arrivals: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, method: Method, path: &str) -> RouteScript<'_> {
        RouteScript {
            transport: self,
            key: (method, path.to_string()),
        }
    }

    /// Queue a one-shot response.
    pub fn respond(&self, method: Method, path: &str, response: HmsResult<Value>) -> &Self {
        self.route(method, path).push(response);
        self
    }

    /// Queue the same response `times` times.
    pub fn respond_times(
        &self,
        method: Method,
        path: &str,
        times: usize,
        response: HmsResult<Value>,
    ) -> &Self {
        for _ in 0..times {
            self.route(method, path).push(response.clone());
        }
        self
    }

    /// Response used once the queue for the route is empty.
    pub fn respond_always(&self, method: Method, path: &str, response: HmsResult<Value>) -> &Self {
        self.route(method, path).fallback(response);
        self
    }

    /// Hold requests to the route until the returned gate is opened.
    pub fn gate(&self, method: Method, path: &str) -> Gate {
        let gate = Gate::new();
        let key = (method, path.to_string());
        self.lock().routes.entry(key).or_default().gate = Some(gate.clone());
        gate
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    /// Wait until at least `count` requests hit the route.
    ///
    /// # Panics
    ///
    /// Panics after five seconds; a test waiting that long is deadlocked.
    pub async fn wait_for_calls(&self, method: Method, path: &str, count: usize) {
        let wait = async {
            loop {
                let arrived = self.arrivals.notified();
                if self.call_count(method, path) >= count {
                    return;
                }
                arrived.await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(5), wait).await.is_err() {
            panic!(
                "timed out waiting for {count} calls to {method} {path}, saw {}",
                self.call_count(method, path)
            );
        }
    }
}

struct RouteScript<'a> {
    transport: &'a MockTransport,
    key: (Method, String),
}

impl RouteScript<'_> {
    fn push(self, response: HmsResult<Value>) {
        let mut state = self.transport.lock();
        state.routes.entry(self.key).or_default().queue.push_back(response);
    }

    fn fallback(self, response: HmsResult<Value>) {
        let mut state = self.transport.lock();
        state.routes.entry(self.key).or_default().fallback = Some(response);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> HmsResult<Value> {
        let (response, gate) = {
            let mut state = self.lock();
            state.calls.push(request.clone());
            let key = (request.method, request.path.clone());
            match state.routes.get_mut(&key) {
                Some(route) => {
                    let response = route
                        .queue
                        .pop_front()
                        .or_else(|| route.fallback.clone())
                        .unwrap_or_else(|| Err(unscripted(request)));
                    (response, route.gate.clone())
                }
                None => (Err(unscripted(request)), None),
            }
        };
        self.arrivals.notify_waiters();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        response
    }
}

fn unscripted(request: &ApiRequest) -> HttpFailure {
    HttpFailure::from_status(404, &json!({ "error": format!("no mock route for {request}") }))
}

// ============================================================================
// RESPONSE HELPERS
// ============================================================================

pub fn ok(body: Value) -> HmsResult<Value> {
    Ok(body)
}

/// The backend's answer to an expired access token.
pub fn unauthorized() -> HmsResult<Value> {
    Err(HttpFailure::from_status(401, &json!({ "error": "Unauthorized" })))
}

pub fn failure(status: u16, message: &str) -> HmsResult<Value> {
    Err(HttpFailure::from_status(status, &json!({ "error": message })))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for query arguments and tags.

    use super::*;
    use proptest::prelude::*;

    /// Flat JSON scalar, null included.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z0-9 ]{0,8}".prop_map(Value::from),
        ]
    }

    /// Argument object with up to six members of scalar or array values.
    pub fn arb_args() -> impl Strategy<Value = serde_json::Map<String, Value>> {
        let member = prop_oneof![
            3 => arb_scalar(),
            1 => prop::collection::vec(arb_scalar(), 0..4).prop_map(Value::Array),
        ];
        prop::collection::btree_map("[a-zA-Z]{1,8}", member, 0..6)
            .prop_map(|members| members.into_iter().collect())
    }

    pub fn arb_entity_tag() -> impl Strategy<Value = EntityTag> {
        prop_oneof![
            Just(EntityTag::patient()),
            Just(EntityTag::dashboard()),
            Just(EntityTag::hospital()),
            "[a-f0-9]{4}".prop_map(EntityTag::patient_id),
        ]
    }

    pub fn arb_tag_set() -> impl Strategy<Value = TagSet> {
        prop::collection::btree_set(arb_entity_tag(), 0..4)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Backend payloads as the server returns them.

    use super::*;
    use chrono::{TimeZone, Utc};

    pub fn auth_user() -> AuthUser {
        AuthUser {
            id: "u1".to_string(),
            name: "Ada Admin".to_string(),
            email: "ada@example.org".to_string(),
            role: "admin".to_string(),
            hospital_id: Some("h1".to_string()),
        }
    }

    pub fn login_body() -> Value {
        json!({
            "user": {
                "_id": "u1",
                "name": "Ada Admin",
                "email": "ada@example.org",
                "role": "admin",
                "hospitalId": "h1"
            }
        })
    }

    pub fn patient(id: &str, first_name: &str) -> Value {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single().unwrap_or_default();
        json!({
            "_id": id,
            "firstName": first_name,
            "lastName": "Doe",
            "gender": "female",
            "createdAt": created.to_rfc3339(),
        })
    }

    /// One page of the patients listing.
    pub fn patients_page(names: &[&str]) -> Value {
        let data: Vec<Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| patient(&format!("p{}", i + 1), name))
            .collect();
        json!({
            "data": data,
            "meta": { "page": 1, "limit": 10, "total": names.len(), "totalPages": 1 }
        })
    }

    pub fn dashboard_stats(total_patients: u64) -> Value {
        json!({
            "data": {
                "totalPatients": total_patients,
                "admittedPatients": 3,
                "dischargedPatients": 1,
                "totalEncounters": 12
            }
        })
    }

    pub fn hospital(name: &str) -> Value {
        json!({ "data": { "_id": "h1", "name": name, "address": "1 Main St" } })
    }
}
