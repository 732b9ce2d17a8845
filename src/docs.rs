use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::config::{AppConfig, DEFAULT_MOUNT_PATH};
use crate::errors::ErrorResponse;
use crate::routes;

const SECURITY_SCHEME: &str = "identityHeader";

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::documents::list_documents,
		routes::documents::update_document,
		routes::documents::delete_document,
		routes::reports::list_reports
	),
	components(
		schemas(
			ErrorResponse,
			routes::ActionResponse,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Health", description = "Service health"),
		(name = "Documents", description = "Permission-gated document routes"),
		(name = "Reports", description = "Permission-gated report routes")
	)
)]
pub struct ApiDoc;

/// OpenAPI document for the running configuration: protected paths moved
/// under the configured mount path and the identity header declared as the
/// security scheme.
pub fn build_openapi(config: &AppConfig) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	remount_paths(&mut doc, &config.mount_path);
	ensure_security_components(&mut doc, config.identity_header.as_str());
	ensure_servers(&mut doc, config.port);

	Ok(serde_json::from_value(doc)?)
}

fn remount_paths(doc: &mut Value, mount_path: &str) {
	if mount_path == DEFAULT_MOUNT_PATH {
		return;
	}

	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else {
		return;
	};

	let remounted: Map<String, Value> = std::mem::take(paths)
		.into_iter()
		.map(|(path, item)| match path.strip_prefix(DEFAULT_MOUNT_PATH) {
			Some(rest) if rest.is_empty() || rest.starts_with('/') => (format!("{mount_path}{rest}"), item),
			_ => (path, item),
		})
		.collect();

	*paths = remounted;
}

fn ensure_security_components(doc: &mut Value, header: &str) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));

	if let Some(components) = components.as_object_mut() {
		let schemes = components
			.entry("securitySchemes")
			.or_insert_with(|| Value::Object(Map::new()));

		if let Some(schemes) = schemes.as_object_mut() {
			schemes.insert(
				SECURITY_SCHEME.to_string(),
				json!({
					"type": "apiKey",
					"in": "header",
					"name": header
				}),
			);
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
