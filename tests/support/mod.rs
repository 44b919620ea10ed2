#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hypercache::cache::CacheConfig;
use hypercache::data::{BaseDataService, GenericStrategy};
use hypercache::domain::{Method, RemoteData};
use hypercache::infra::{
    ManualClock, RawRequest, RawResponse, SequentialGenerator, Transport, TransportError,
};
use hypercache::registry::{LinkDefinition, TypeRegistry};
use serde_json::{Value, json};
use tokio::sync::Semaphore;

/// Transport answering from a fixed table of routes. Unknown routes get a
/// `404`. With a gate, every request waits for one permit.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), RawResponse>>,
    calls: Mutex<Vec<RawRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (Arc::new(transport), gate)
    }

    pub fn route(&self, method: Method, href: &str, response: RawResponse) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert((method, href.to_string()), response);
    }

    pub fn get_json(&self, href: &str, body: Value) {
        self.route(Method::Get, href, RawResponse::json(200, &body));
    }

    pub fn calls(&self) -> Vec<RawRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, method: Method, href: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method && call.url == href)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|err| TransportError::Http(err.to_string()))?
                .forget();
        }
        let response = self
            .routes
            .lock()
            .expect("routes lock")
            .get(&(request.method, request.url.clone()))
            .cloned();
        Ok(response.unwrap_or_else(|| {
            RawResponse::json(404, &json!({ "message": format!("no route for {}", request.url) }))
                .with_status_text("Not Found")
        }))
    }
}

/// item → owningCollection (single), item → bundles (list),
/// bundle → bitstreams (list).
pub fn registry() -> TypeRegistry {
    TypeRegistry::builder()
        .register("item", Arc::new(GenericStrategy::new()))
        .and_then(|b| b.register("collection", Arc::new(GenericStrategy::new())))
        .and_then(|b| b.register("bundle", Arc::new(GenericStrategy::new())))
        .and_then(|b| b.register("bitstream", Arc::new(GenericStrategy::new())))
        .and_then(|b| b.declare_link("item", "owningCollection", LinkDefinition::single("collection")))
        .and_then(|b| b.declare_link("item", "bundles", LinkDefinition::list("bundle")))
        .and_then(|b| b.declare_link("bundle", "bitstreams", LinkDefinition::list("bitstream")))
        .and_then(|b| b.build())
        .expect("test registry")
}

pub const TTL_MS: u64 = 1_000;

pub fn config() -> CacheConfig {
    CacheConfig {
        default_time_to_live_ms: TTL_MS,
        ..CacheConfig::default()
    }
}

pub fn service(transport: Arc<ScriptedTransport>, clock: Arc<ManualClock>) -> BaseDataService {
    service_with(transport, clock, config())
}

pub fn service_with(
    transport: Arc<ScriptedTransport>,
    clock: Arc<ManualClock>,
    config: CacheConfig,
) -> BaseDataService {
    BaseDataService::builder(registry(), transport)
        .config(config)
        .clock(clock)
        .ids(Arc::new(SequentialGenerator::default()))
        .build()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(10_000))
}

pub fn item(id: u32) -> Value {
    json!({
        "type": "item",
        "name": format!("Item {id}"),
        "_links": {
            "self": { "href": format!("/items/{id}") },
            "owningCollection": { "href": format!("/items/{id}/owningCollection") },
            "bundles": { "href": format!("/items/{id}/bundles") }
        }
    })
}

pub fn collection(id: u32) -> Value {
    json!({
        "type": "collection",
        "name": format!("Collection {id}"),
        "_links": { "self": { "href": format!("/collections/{id}") } }
    })
}

pub fn bundle(id: u32) -> Value {
    json!({
        "type": "bundle",
        "name": format!("Bundle {id}"),
        "_links": {
            "self": { "href": format!("/bundles/{id}") },
            "bitstreams": { "href": format!("/bundles/{id}/bitstreams") }
        }
    })
}

pub fn bitstream(id: u32) -> Value {
    json!({
        "type": "bitstream",
        "name": format!("Bitstream {id}"),
        "_links": { "self": { "href": format!("/bitstreams/{id}") } }
    })
}

/// A one-page list document with its elements embedded under `key`.
pub fn page(self_href: &str, key: &str, elements: Vec<Value>) -> Value {
    let total = elements.len();
    json!({
        "_links": { "self": { "href": self_href } },
        "page": { "size": 20, "totalElements": total, "totalPages": 1, "number": 0 },
        "_embedded": { key: elements }
    })
}

pub fn name<T>(data: &RemoteData<T>, f: impl Fn(&T) -> Option<&Value>) -> Option<String> {
    data.payload()
        .and_then(f)
        .and_then(Value::as_str)
        .map(str::to_string)
}
