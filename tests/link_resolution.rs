mod support;

use hypercache::domain::{Method, Resource, follow_link, follow_list};
use hypercache::links::{LinkError, ResolvedLink};
use serde_json::Value;

use support::{ScriptedTransport, bitstream, bundle, clock, collection, item, page, service};

fn names(list: &hypercache::domain::PaginatedList<Resource>) -> Vec<String> {
    list.iter()
        .filter_map(|element| element.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn nested_list_links_resolve_without_embeds() {
    let transport = ScriptedTransport::new();
    transport.get_json("/items/1", item(1));
    transport.get_json(
        "/items/1/bundles",
        page("/items/1/bundles", "bundles", vec![bundle(1), bundle(2)]),
    );
    transport.get_json(
        "/bundles/1/bitstreams",
        page("/bundles/1/bitstreams", "bitstreams", vec![bitstream(1)]),
    );
    transport.get_json(
        "/bundles/2/bitstreams",
        page("/bundles/2/bitstreams", "bitstreams", Vec::new()),
    );
    let service = service(transport.clone(), clock());

    let links = [follow_list("bundles")
        .without_embed()
        .with_nested(follow_list("bitstreams").without_embed())];
    let handle = service.find_by_href("/items/1", true, true, &links);
    assert_eq!(handle.href(), Some("/items/1"));
    let item = handle.completed().await.expect("declared links");
    let item = item.payload().expect("item");

    let bundles = item
        .resolved("bundles")
        .and_then(ResolvedLink::list)
        .expect("bundles resolved as a list");
    let bundles = bundles.completed().await.expect("declared links");
    let bundles = bundles.payload().expect("bundle page");
    assert_eq!(names(bundles), ["Bundle 1", "Bundle 2"]);

    let mut per_bundle = Vec::new();
    for bundle in bundles.iter() {
        let bitstreams = bundle
            .resolved("bitstreams")
            .and_then(ResolvedLink::list)
            .expect("bitstreams resolved as a list");
        let bitstreams = bitstreams.completed().await.expect("no nested links");
        per_bundle.push(names(bitstreams.payload().expect("bitstream page")));
    }
    assert_eq!(per_bundle, [vec!["Bitstream 1".to_string()], Vec::new()]);

    for href in [
        "/items/1",
        "/items/1/bundles",
        "/bundles/1/bitstreams",
        "/bundles/2/bitstreams",
    ] {
        assert_eq!(transport.count(Method::Get, href), 1, "{href}");
    }
}

#[tokio::test]
async fn nested_embed_is_requested_in_one_href() {
    let transport = ScriptedTransport::new();
    let service = service(transport.clone(), clock());

    let links = [follow_list("bundles").with_nested(follow_list("bitstreams"))];
    let handle = service.find_by_href("/items/1", true, true, &links);

    assert_eq!(handle.href(), Some("/items/1?embed=bundles%2Fbitstreams"));
}

#[tokio::test]
async fn undeclared_optional_link_is_absent() {
    let transport = ScriptedTransport::new();
    transport.get_json("/collections/7", collection(7));
    let service = service(transport.clone(), clock());

    let links = [follow_link("logo").optional().without_embed()];
    let data = service
        .find_by_href("/collections/7", true, true, &links)
        .completed()
        .await
        .expect("optional link");

    let collection = data.payload().expect("collection");
    assert!(collection.resolved("logo").is_some_and(ResolvedLink::is_absent));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn declared_link_without_href_is_absent() {
    let transport = ScriptedTransport::new();
    let mut body = item(3);
    body["_links"]
        .as_object_mut()
        .expect("links object")
        .remove("owningCollection");
    transport.get_json("/items/3", body);
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/3", true, true, &[follow_link("owningCollection").without_embed()])
        .completed()
        .await
        .expect("declared link");

    let item = data.payload().expect("item");
    assert!(
        item.resolved("owningCollection")
            .is_some_and(ResolvedLink::is_absent)
    );
}

#[tokio::test]
async fn undeclared_required_link_is_an_error() {
    let transport = ScriptedTransport::new();
    transport.get_json("/collections/7", collection(7));
    let service = service(transport.clone(), clock());

    let result = service
        .find_by_href("/collections/7", true, true, &[follow_link("logo").without_embed()])
        .completed()
        .await;

    match result {
        Err(LinkError::MissingLinkDeclaration {
            resource_type,
            link,
        }) => {
            assert_eq!(resource_type.as_str(), "collection");
            assert_eq!(link, "logo");
        }
        other => panic!("expected a missing declaration, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_cardinality_is_an_error() {
    let transport = ScriptedTransport::new();
    transport.get_json("/items/1", item(1));
    let service = service(transport.clone(), clock());

    let result = service
        .find_by_href("/items/1", true, true, &[follow_link("bundles").without_embed()])
        .completed()
        .await;

    assert!(matches!(
        result,
        Err(LinkError::CardinalityMismatch {
            declared_list: true,
            ..
        })
    ));
}

#[tokio::test]
async fn failed_link_target_is_reported_on_the_link() {
    let transport = ScriptedTransport::new();
    transport.get_json("/items/1", item(1));
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/1", true, true, &[follow_link("owningCollection").without_embed()])
        .completed()
        .await
        .expect("declared link");
    assert!(data.has_succeeded());

    let owner = data
        .payload()
        .and_then(|item| item.resolved("owningCollection"))
        .and_then(ResolvedLink::single)
        .expect("single link");
    let owner = owner.completed().await.expect("no nested links");
    assert!(owner.has_failed());
    assert_eq!(owner.status_code(), Some(404));
}

#[tokio::test]
async fn resolved_links_can_be_removed() {
    let transport = ScriptedTransport::new();
    transport.get_json("/items/1", item(1));
    transport.get_json("/items/1/owningCollection", collection(7));
    let service = service(transport.clone(), clock());

    let data = service
        .find_by_href("/items/1", true, true, &[follow_link("owningCollection").without_embed()])
        .completed()
        .await
        .expect("declared link");
    let item = data.into_payload().expect("item");
    assert!(item.has_resolved_links());

    let cleared = service.links().remove_resolved_links(&item);
    assert!(!cleared.has_resolved_links());
    assert_eq!(cleared, item);
}
