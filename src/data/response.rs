//! Response normalization.
//!
//! A HAL document is flattened into one cache entry per self-linked object:
//! `_embedded` children are stored separately (reachable under the parent's
//! link href as an alternative key) and removed from the parent body. A list
//! document is stored as a `paginated-list` entry whose `page` link lists the
//! self links of its elements in server order.

use hypercache_hal::{self as hal, EMBEDDED_KEY, HalLink, LINKS_KEY, LinkValue, PAGE_KEY};
use serde_json::{Map, Value, json};

use crate::cache::ResponsePayload;
use crate::domain::Resource;
use crate::infra::{RawResponse, TransportError};

/// Type tag of stored list entries.
pub const PAGINATED_LIST_TYPE: &str = "paginated-list";

/// Status recorded for requests that never reached the server.
pub(crate) const TRANSPORT_FAILURE_STATUS: u16 = 0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedObject {
    pub resource: Resource,
    pub alternative_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedResponse {
    Success {
        status_code: u16,
        /// Children first, the top-level document last.
        objects: Vec<NormalizedObject>,
        payload: ResponsePayload,
    },
    Failure {
        status_code: u16,
        message: String,
    },
}

impl ParsedResponse {
    pub(crate) fn from_transport_error(err: &TransportError) -> Self {
        Self::Failure {
            status_code: TRANSPORT_FAILURE_STATUS,
            message: err.to_string(),
        }
    }
}

pub(crate) fn parse_response(href: &str, response: &RawResponse) -> ParsedResponse {
    let status_code = response.status_code;
    let body = match response.body_json() {
        Ok(body) => body,
        Err(err) if response.is_success() => {
            return ParsedResponse::Failure {
                status_code,
                message: format!("response body is not valid JSON: {err}"),
            };
        }
        Err(_) => None,
    };

    if !response.is_success() {
        return ParsedResponse::Failure {
            status_code,
            message: failure_message(response, body.as_ref()),
        };
    }

    let Some(mut body) = body else {
        return ParsedResponse::Success {
            status_code,
            objects: Vec::new(),
            payload: ResponsePayload::None,
        };
    };

    if hal::self_href(&body).is_none() && body.get(PAGE_KEY).is_some() {
        hal::set_link(&mut body, hal::SELF_LINK, LinkValue::Single(HalLink::new(href)));
    }

    let mut objects = Vec::new();
    let alternative = hal::self_href(&body)
        .filter(|self_link| *self_link != href)
        .map(|_| href.to_string());
    let payload = match normalize(&body, alternative, &mut objects) {
        Some(self_link) => ResponsePayload::Link(self_link),
        None => ResponsePayload::Uncacheable(body),
    };
    ParsedResponse::Success {
        status_code,
        objects,
        payload,
    }
}

fn failure_message(response: &RawResponse, body: Option<&Value>) -> String {
    body.and_then(|body| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| (!response.status_text.is_empty()).then(|| response.status_text.clone()))
        .unwrap_or_else(|| format!("request failed with status {}", response.status_code))
}

/// Flatten `document` into `out`. Returns its self link when it was stored.
fn normalize(
    document: &Value,
    alternative_key: Option<String>,
    out: &mut Vec<NormalizedObject>,
) -> Option<String> {
    let self_link = hal::self_href(document)?.to_string();
    let mut body = document.clone();
    let embedded = body
        .as_object_mut()
        .and_then(|object| object.remove(EMBEDDED_KEY));

    let stored = if body.get(PAGE_KEY).is_some() {
        list_body(&body, embedded.as_ref(), out)
    } else {
        if let Some(embedded) = embedded {
            let kept = normalize_embedded(document, embedded, out);
            if !kept.is_empty()
                && let Some(object) = body.as_object_mut()
            {
                object.insert(EMBEDDED_KEY.to_string(), Value::Object(kept));
            }
        }
        body
    };

    let resource = Resource::from_json(stored)?;
    out.push(NormalizedObject {
        resource,
        alternative_key,
    });
    Some(self_link)
}

/// Store each embedded child on its own. Children that cannot be stored stay
/// embedded in the parent.
fn normalize_embedded(
    parent: &Value,
    embedded: Value,
    out: &mut Vec<NormalizedObject>,
) -> Map<String, Value> {
    let Value::Object(children) = embedded else {
        return Map::new();
    };

    let mut kept = Map::new();
    for (name, child) in children {
        match child {
            Value::Array(elements) => {
                let unstored: Vec<Value> = elements
                    .into_iter()
                    .filter(|element| normalize(element, None, out).is_none())
                    .collect();
                if !unstored.is_empty() {
                    kept.insert(name, Value::Array(unstored));
                }
            }
            child => {
                let alternative = hal::link_href(parent, &name)
                    .filter(|href| Some(*href) != hal::self_href(&child))
                    .map(str::to_string);
                if normalize(&child, alternative, out).is_none() {
                    kept.insert(name, child);
                }
            }
        }
    }
    kept
}

fn list_body(list: &Value, embedded: Option<&Value>, out: &mut Vec<NormalizedObject>) -> Value {
    let elements = embedded
        .and_then(Value::as_object)
        .and_then(|children| children.values().find_map(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default();

    let page: Vec<HalLink> = elements
        .iter()
        .filter_map(|element| normalize(element, None, out))
        .map(HalLink::new)
        .collect();

    let mut links = list
        .get(LINKS_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    links.insert(
        hal::PAGE_LINK.to_string(),
        serde_json::to_value(LinkValue::Many(page)).unwrap_or(Value::Null),
    );

    json!({
        "type": PAGINATED_LIST_TYPE,
        "page": list.get(PAGE_KEY).cloned().unwrap_or(Value::Null),
        "_links": Value::Object(links),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn success(parsed: ParsedResponse) -> (Vec<NormalizedObject>, ResponsePayload) {
        match parsed {
            ParsedResponse::Success {
                objects, payload, ..
            } => (objects, payload),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn no_content_has_no_payload() {
        let (objects, payload) = success(parse_response("/items/1", &RawResponse::no_content()));
        assert!(objects.is_empty());
        assert_eq!(payload, ResponsePayload::None);
    }

    #[test]
    fn error_status_prefers_server_message() {
        let response = RawResponse::json(404, &json!({ "message": "no such item" }))
            .with_status_text("Not Found");
        assert_eq!(
            parse_response("/items/9", &response),
            ParsedResponse::Failure {
                status_code: 404,
                message: "no such item".into()
            }
        );

        let bare = RawResponse::new(500, "").with_status_text("Internal Server Error");
        assert_eq!(
            parse_response("/items/9", &bare),
            ParsedResponse::Failure {
                status_code: 500,
                message: "Internal Server Error".into()
            }
        );
    }

    #[test]
    fn unparseable_success_body_fails() {
        let parsed = parse_response("/items/1", &RawResponse::new(200, "<html>"));
        assert!(matches!(parsed, ParsedResponse::Failure { status_code: 200, .. }));
    }

    #[test]
    fn embedded_children_are_stored_separately() {
        let body = json!({
            "type": "item",
            "_links": {
                "self": { "href": "/items/1" },
                "owningCollection": { "href": "/items/1/owningCollection" }
            },
            "_embedded": {
                "owningCollection": {
                    "type": "collection",
                    "_links": { "self": { "href": "/collections/7" } }
                }
            }
        });
        let (objects, payload) = success(parse_response(
            "/items/1?embed=owningCollection",
            &RawResponse::json(200, &body),
        ));

        assert_eq!(payload, ResponsePayload::Link("/items/1".into()));
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].resource.self_link(), Some("/collections/7"));
        assert_eq!(
            objects[0].alternative_key.as_deref(),
            Some("/items/1/owningCollection")
        );
        assert_eq!(objects[1].resource.self_link(), Some("/items/1"));
        assert!(objects[1].resource.get(EMBEDDED_KEY).is_none());
        assert_eq!(
            objects[1].alternative_key.as_deref(),
            Some("/items/1?embed=owningCollection")
        );
    }

    #[test]
    fn list_documents_keep_element_order() {
        let body = json!({
            "_links": { "self": { "href": "/items" } },
            "page": { "size": 2, "totalElements": 5, "totalPages": 3, "number": 0 },
            "_embedded": {
                "items": [
                    { "type": "item", "_links": { "self": { "href": "/items/2" } } },
                    { "type": "item", "_links": { "self": { "href": "/items/1" } } }
                ]
            }
        });
        let (objects, payload) = success(parse_response("/items", &RawResponse::json(200, &body)));

        assert_eq!(payload, ResponsePayload::Link("/items".into()));
        let list = &objects.last().expect("list entry").resource;
        assert_eq!(list.resource_type().as_str(), PAGINATED_LIST_TYPE);
        assert_eq!(
            hal::links_of(list.body())
                .get(hal::PAGE_LINK)
                .map(LinkValue::hrefs),
            Some(vec!["/items/2", "/items/1"])
        );
        assert_eq!(hal::page_info(list.body()).map(|page| page.total_elements), Some(5));
    }

    #[test]
    fn list_without_self_link_uses_request_href() {
        let body = json!({
            "page": { "size": 0, "totalElements": 0, "totalPages": 0, "number": 0 }
        });
        let (_, payload) = success(parse_response(
            "/items/search?query=x",
            &RawResponse::json(200, &body),
        ));
        assert_eq!(payload, ResponsePayload::Link("/items/search?query=x".into()));
    }

    #[test]
    fn bodies_without_self_link_are_uncacheable() {
        let body = json!({ "type": "status", "authenticated": false });
        let (objects, payload) = success(parse_response("/authn/status", &RawResponse::json(200, &body)));
        assert!(objects.is_empty());
        assert_eq!(payload, ResponsePayload::Uncacheable(body));
    }

    #[test]
    fn transport_errors_have_status_zero() {
        let parsed = ParsedResponse::from_transport_error(&TransportError::Timeout {
            url: "/items/1".into(),
        });
        assert!(matches!(parsed, ParsedResponse::Failure { status_code: 0, .. }));
    }
}
