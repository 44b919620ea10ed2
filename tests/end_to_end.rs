mod support;

use std::sync::Arc;

use hypercache::data::BaseDataService;
use hypercache::domain::{FindListOptions, Method, RemoteData, Resource, follow_link};
use hypercache::infra::RawResponse;
use hypercache::links::ResolvedLink;
use serde_json::{Value, json};

use support::{ScriptedTransport, clock, collection, item, page, service};

#[tokio::test]
async fn embedded_link_is_served_from_a_single_request() {
    let transport = ScriptedTransport::new();
    let mut body = item(1);
    body["_embedded"] = json!({ "owningCollection": collection(7) });
    transport.get_json("/items/1?embed=owningCollection", body);
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/1", true, true, &[follow_link("owningCollection")])
        .completed()
        .await
        .expect("declared link");

    assert!(data.has_succeeded());
    let item = data.payload().expect("item payload");
    assert_eq!(item.self_link(), Some("/items/1"));
    assert!(item.get("_embedded").is_none());

    let Some(ResolvedLink::Single(owner)) = item.resolved("owningCollection") else {
        panic!("owningCollection should resolve to a single resource");
    };
    let owner = owner.completed().await.expect("no nested links");
    assert_eq!(
        owner.payload().and_then(|c| c.get("name")).and_then(Value::as_str),
        Some("Collection 7")
    );

    assert_eq!(transport.calls().len(), 1);
}

/// Fetch `/items/1` without embeds and resolve its owning collection.
async fn item_with_owner(service: &BaseDataService) -> RemoteData<Resource> {
    let links = [follow_link("owningCollection").without_embed()];
    let data = service
        .find_by_href("/items/1", true, true, &links)
        .completed()
        .await
        .expect("declared link");
    let item = data.payload().expect("item payload");
    let Some(ResolvedLink::Single(owner)) = item.resolved("owningCollection") else {
        panic!("owningCollection should resolve to a single resource");
    };
    owner.completed().await.expect("no nested links")
}

fn owner_scripted() -> Arc<ScriptedTransport> {
    let transport = ScriptedTransport::new();
    transport.get_json("/items/1", item(1));
    transport.get_json("/items/1/owningCollection", collection(7));
    transport
}

fn is_stale(service: &BaseDataService, data: &RemoteData<Resource>) -> bool {
    data.request_id()
        .and_then(|id| service.store().request(id))
        .is_some_and(|record| record.is_stale)
}

#[tokio::test]
async fn followed_link_costs_one_request_per_href() {
    let transport = owner_scripted();
    let service = service(transport.clone(), clock());

    let owner = item_with_owner(&service).await;

    assert_eq!(
        owner.payload().and_then(Resource::self_link),
        Some("/collections/7")
    );
    let urls: Vec<_> = transport.calls().into_iter().map(|call| call.url).collect();
    assert_eq!(urls, ["/items/1", "/items/1/owningCollection"]);

    // No dependency declared: only the item itself goes stale.
    assert_eq!(service.invalidate_by_href("/items/1"), 1);
    assert!(!is_stale(&service, &owner));
}

#[tokio::test]
async fn declared_dependency_carries_invalidation_to_the_followed_link() {
    let service = service(owner_scripted(), clock());

    let owner = item_with_owner(&service).await;
    assert!(service.add_dependency_on(&owner, "/items/1"));

    assert_eq!(service.invalidate_by_href("/items/1"), 2);
    assert!(is_stale(&service, &owner));
}

#[tokio::test]
async fn embedded_resource_is_reused_by_its_own_href() {
    let transport = ScriptedTransport::new();
    let mut body = item(1);
    body["_embedded"] = json!({ "owningCollection": collection(7) });
    transport.get_json("/items/1?embed=owningCollection", body);
    let service = service(transport.clone(), clock());

    service
        .find_by_href("/items/1", true, true, &[follow_link("owningCollection")])
        .completed()
        .await
        .expect("declared link");

    let cached = service
        .find_by_href("/collections/7", true, true, &[])
        .completed()
        .await
        .expect("no links");
    assert!(cached.has_succeeded());
    assert_eq!(
        cached.payload().and_then(Resource::self_link),
        Some("/collections/7")
    );

    // The bare item href was stored as an alternative key of the embed request.
    let bare = service
        .find_by_href("/items/1", true, true, &[])
        .completed()
        .await
        .expect("no links");
    assert!(bare.has_succeeded());

    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn list_elements_are_cached_individually() {
    let transport = ScriptedTransport::new();
    transport.get_json("/items", page("/items", "items", vec![item(1), item(2)]));
    let service = service(transport.clone(), clock());

    let list = service
        .find_list_by_href("/items", &FindListOptions::default(), true, true, &[])
        .completed()
        .await
        .expect("no links");
    let list = list.payload().expect("list payload");
    assert_eq!(list.len(), 2);
    assert_eq!(list.total_elements(), 2);
    let links: Vec<_> = list.iter().filter_map(Resource::self_link).collect();
    assert_eq!(links, ["/items/1", "/items/2"]);

    let second = service
        .find_by_href("/items/2", true, true, &[])
        .completed()
        .await
        .expect("no links");
    assert_eq!(
        second.payload().and_then(|r| r.get("name")).and_then(Value::as_str),
        Some("Item 2")
    );
    assert_eq!(transport.count(Method::Get, "/items/2"), 0);
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn paged_list_href_carries_zero_based_page() {
    let transport = ScriptedTransport::new();
    transport.get_json(
        "/items?page=1&size=1",
        page("/items?page=1&size=1", "items", vec![item(2)]),
    );
    let service = service(transport.clone(), clock());

    let options = FindListOptions::default().page(2).size(1);
    let handle = service.find_list_by_href("/items", &options, true, true, &[]);
    assert_eq!(handle.href(), Some("/items?page=1&size=1"));

    let list = handle.completed().await.expect("no links");
    assert_eq!(list.payload().map(|list| list.len()), Some(1));
}

#[tokio::test]
async fn not_found_is_a_failed_result() {
    let transport = ScriptedTransport::new();
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/404", true, true, &[])
        .completed()
        .await
        .expect("no links");

    assert!(data.has_failed());
    assert_eq!(data.status_code(), Some(404));
    assert_eq!(data.error_message(), Some("no route for /items/404"));
    assert!(data.payload().is_none());
}

#[tokio::test]
async fn no_content_succeeds_without_payload() {
    let transport = ScriptedTransport::new();
    transport.route(Method::Get, "/items/1/thumbnail", RawResponse::no_content());
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/1/thumbnail", true, true, &[])
        .completed()
        .await
        .expect("no links");

    assert!(data.has_no_content());
    assert_eq!(data.status_code(), Some(204));
}

#[tokio::test]
async fn body_without_self_link_is_returned_but_not_cached() {
    let transport = ScriptedTransport::new();
    transport.get_json("/status", json!({ "type": "status", "okay": true }));
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/status", true, true, &[])
        .completed()
        .await
        .expect("no links");

    let status = data.payload().expect("status payload");
    assert_eq!(status.resource_type().as_str(), "status");
    assert_eq!(status.get("okay"), Some(&Value::Bool(true)));
    assert!(service.store().get("/status").expect("readable").is_none());
}
