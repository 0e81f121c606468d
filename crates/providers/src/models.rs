//! Model-listing call for the options UI dropdown.

use serde::Deserialize;

use shared::error::GatewayError;

use crate::gemini::DEFAULT_BASE_URL;

const MODEL_NAMESPACE: &str = "models/";

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Fetch the model identifiers available to this API key, with the
/// `models/` namespace prefix stripped for presentation.
pub async fn list_models(api_key: &str) -> Result<Vec<String>, GatewayError> {
    list_models_at(DEFAULT_BASE_URL, api_key).await
}

pub async fn list_models_at(
    base_url: &str,
    api_key: &str,
) -> Result<Vec<String>, GatewayError> {
    if api_key.trim().is_empty() {
        return Err(GatewayError::validation("API key is not configured"));
    }

    let url = format!("{base_url}/v1beta/models?key={api_key}");
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| GatewayError::transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::protocol(format!(
            "model listing failed ({status})"
        )));
    }

    let body: ModelList = resp
        .json()
        .await
        .map_err(|e| GatewayError::malformed(e.to_string()))?;

    Ok(body
        .models
        .into_iter()
        .map(|m| {
            m.name
                .strip_prefix(MODEL_NAMESPACE)
                .map(str::to_string)
                .unwrap_or(m.name)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_endpoint(status: u16, body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let response =
                    tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_names_are_stripped_of_the_namespace_prefix() {
        let base = spawn_endpoint(
            200,
            r#"{"models":[{"name":"models/gemini-2.0-flash"},{"name":"bare-name"}]}"#,
        );
        let models = list_models_at(&base, "k").await.unwrap();
        assert_eq!(models, vec!["gemini-2.0-flash", "bare-name"]);
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected_locally() {
        let err = list_models_at("http://127.0.0.1:1", "  ").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_error_status_is_a_protocol_error() {
        let base = spawn_endpoint(403, "{}");
        let err = list_models_at(&base, "k").await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol { .. }));
    }
}
