use std::time::Duration;

use covermatch_core::EncodeError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Text sent to a service at startup to confirm it answers and to learn the
/// output dimension.
pub(crate) const SAMPLE_TEXT: &str = "covermatch encoder sample";

pub(crate) fn build_client(encoder: &str, timeout: Duration) -> Result<Client, EncodeError> {
    Client::builder().timeout(timeout).build().map_err(|error| EncodeError::Unavailable {
        encoder: encoder.to_string(),
        message: format!("failed to build http client: {error}"),
    })
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) async fn post_json<B, R>(
    client: &Client,
    url: &str,
    body: &B,
    api_key: Option<&SecretString>,
) -> Result<R, EncodeError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut request = client.post(url).json(body);
    if let Some(api_key) = api_key {
        request = request.bearer_auth(api_key.expose_secret());
    }

    let response = request
        .send()
        .await
        .map_err(|error| EncodeError::Transport(format!("request to {url} failed: {error}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EncodeError::Transport(format!("{url} returned {status}")));
    }

    response.json::<R>().await.map_err(|error| {
        EncodeError::InvalidResponse(format!("failed to decode response from {url}: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::endpoint;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(endpoint("http://localhost:11434/", "/api/embed"), "http://localhost:11434/api/embed");
        assert_eq!(endpoint("http://tei:8080", "embed_all"), "http://tei:8080/embed_all");
    }
}
