use std::{process, sync::Arc};

use hypercache::{
    config::{self, FetchArgs, Settings},
    data::{BaseDataService, DataAccessStrategy, GenericStrategy},
    domain::{FindListOptions, FollowLinkConfig, RemoteData, Resource, follow_link, follow_list},
    error::AppError,
    infra::{ReqwestTransport, telemetry},
    links::ResolvedLink,
    registry::{LinkDefinition, TypeRegistry},
};
use serde_json::{Map, Value, json};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Fetch(args) => run_fetch(settings, args).await,
    }
}

fn build_registry(settings: &Settings) -> Result<TypeRegistry, AppError> {
    let mut builder = TypeRegistry::builder();
    for declaration in &settings.types {
        let strategy: Arc<dyn DataAccessStrategy> = match declaration.time_to_live_ms {
            Some(ttl) => Arc::new(GenericStrategy::with_time_to_live(ttl)),
            None => Arc::new(GenericStrategy::new()),
        };
        builder = builder.register(declaration.name.as_str(), strategy)?;
        for link in &declaration.links {
            let definition = if link.list {
                LinkDefinition::list(link.target.as_str())
            } else {
                LinkDefinition::single(link.target.as_str())
            };
            builder = builder.declare_link(declaration.name.as_str(), link.name.as_str(), definition)?;
        }
    }
    Ok(builder.build()?)
}

async fn run_fetch(settings: Settings, args: FetchArgs) -> Result<(), AppError> {
    if !args.list && (args.page.is_some() || args.size.is_some()) {
        return Err(AppError::validation("--page and --size require --list"));
    }

    let registry = build_registry(&settings)?;
    let transport = Arc::new(ReqwestTransport::new(&settings.transport)?);
    let service = BaseDataService::new(registry, transport, settings.cache.clone());

    let links: Vec<FollowLinkConfig> = args
        .follow
        .iter()
        .map(follow_link)
        .chain(args.follow_list.iter().map(follow_list))
        .collect();
    let use_cached = !args.no_cache;

    info!(
        href = %args.href,
        base_url = %settings.transport.base_url,
        list = args.list,
        links = links.len(),
        "fetching"
    );

    let output = if args.list {
        let mut options = FindListOptions::default();
        if let Some(page) = args.page {
            options = options.page(page);
        }
        if let Some(size) = args.size {
            options = options.size(size);
        }
        let data = service
            .find_list_by_href(&args.href, &options, use_cached, true, &links)
            .completed()
            .await?;
        match successful_payload(data, &args.href)? {
            Some(list) => {
                let mut elements = Vec::with_capacity(list.len());
                for element in list.iter() {
                    elements.push(render_resource(element).await?);
                }
                json!({ "page": list.page_info, "elements": elements })
            }
            None => Value::Null,
        }
    } else {
        let data = service
            .find_by_href(&args.href, use_cached, true, &links)
            .completed()
            .await?;
        match successful_payload(data, &args.href)? {
            Some(resource) => render_resource(&resource).await?,
            None => Value::Null,
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn successful_payload<T>(data: RemoteData<T>, href: &str) -> Result<Option<T>, AppError> {
    if data.has_failed() {
        return Err(AppError::request(format!(
            "`{href}` returned {}: {}",
            data.status_code().unwrap_or_default(),
            data.error_message().unwrap_or_default()
        )));
    }
    Ok(data.into_payload())
}

/// Resource body plus a `_resolved` object holding each followed link.
async fn render_resource(resource: &Resource) -> Result<Value, AppError> {
    let mut resolved = Map::new();
    for name in resource.resolved_names() {
        let value = match resource.resolved(name) {
            Some(ResolvedLink::Single(handle)) => {
                describe(handle.completed().await?.map(Resource::into_body))
            }
            Some(ResolvedLink::List(handle)) => describe(handle.completed().await?.map(|list| {
                let elements: Vec<Value> = list.page.into_iter().map(Resource::into_body).collect();
                json!({ "page": list.page_info, "elements": elements })
            })),
            Some(ResolvedLink::Absent) | None => Value::Null,
        };
        resolved.insert(name.to_string(), value);
    }

    let mut rendered = resource.body().clone();
    if !resolved.is_empty()
        && let Some(object) = rendered.as_object_mut()
    {
        object.insert("_resolved".to_string(), Value::Object(resolved));
    }
    Ok(rendered)
}

fn describe(data: RemoteData<Value>) -> Value {
    if data.has_failed() {
        return json!({
            "error": {
                "status": data.status_code(),
                "message": data.error_message(),
            }
        });
    }
    data.into_payload().unwrap_or(Value::Null)
}
