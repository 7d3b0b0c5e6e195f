use crate::error::{ConnectionError, ConnectionResult};
use crate::types::{Credentials, NetworkAddress};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// HTTP client shared by a strategy; redirects are not followed so a 3xx
/// answer counts as reachable.
pub(crate) fn build_http_client(request_timeout: Duration) -> ConnectionResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ConnectionError::transport(format!("failed to create HTTP client: {}", e)))
}

/// Whole milliseconds for log fields, saturating at `u64::MAX`
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn with_auth(request: reqwest::RequestBuilder, credentials: Option<&Credentials>) -> reqwest::RequestBuilder {
    match credentials {
        Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
        None => request,
    }
}

/// Bounded GET; any 2xx/3xx response is a pass
pub(crate) async fn http_reachable(
    client: &reqwest::Client,
    url: &str,
    credentials: Option<&Credentials>,
    limit: Duration,
) -> bool {
    let start = Instant::now();
    let request = with_auth(client.get(url).timeout(limit), credentials);
    let result = timeout(limit, request.send()).await;
    let elapsed_ms = duration_ms(start.elapsed());

    match result {
        Ok(Ok(response)) => {
            let status = response.status();
            debug!(url = %url, status = %status, elapsed_ms, "HTTP probe answered");
            status.is_success() || status.is_redirection()
        }
        Ok(Err(e)) => {
            debug!(url = %url, error = %e, elapsed_ms, "HTTP probe failed");
            false
        }
        Err(_) => {
            debug!(url = %url, elapsed_ms, "HTTP probe timeout");
            false
        }
    }
}

/// Bounded TCP connect, no protocol handshake
pub(crate) async fn tcp_reachable(address: &NetworkAddress, limit: Duration) -> bool {
    let start = Instant::now();
    let result = timeout(limit, TcpStream::connect((address.host.as_str(), address.port))).await;
    let elapsed_ms = duration_ms(start.elapsed());

    match result {
        Ok(Ok(_stream)) => {
            debug!(address = %address, elapsed_ms, "TCP probe connected");
            true
        }
        Ok(Err(e)) => {
            debug!(address = %address, error = %e, elapsed_ms, "TCP probe failed");
            false
        }
        Err(_) => {
            debug!(address = %address, elapsed_ms, "TCP probe timeout");
            false
        }
    }
}

/// Bounded GET returning the body; non-2xx and empty bodies are errors
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    credentials: Option<&Credentials>,
    limit: Duration,
) -> ConnectionResult<Vec<u8>> {
    let request = with_auth(client.get(url).timeout(limit), credentials);
    let response = timeout(limit, request.send())
        .await
        .map_err(|_| ConnectionError::transport(format!("request to {} timed out", url)))??;

    let status = response.status();
    if !status.is_success() {
        return Err(ConnectionError::transport(format!(
            "request to {} returned {}",
            url, status
        )));
    }

    let body = timeout(limit, response.bytes())
        .await
        .map_err(|_| ConnectionError::transport(format!("reading {} timed out", url)))??;
    if body.is_empty() {
        return Err(ConnectionError::transport(format!("{} returned an empty body", url)));
    }

    Ok(body.to_vec())
}

/// Bounded SOAP POST returning the response text
pub(crate) async fn post_soap(
    client: &reqwest::Client,
    url: &str,
    envelope: &'static str,
    credentials: Option<&Credentials>,
    limit: Duration,
) -> ConnectionResult<String> {
    let request = with_auth(
        client
            .post(url)
            .timeout(limit)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(envelope),
        credentials,
    );

    let response = timeout(limit, request.send())
        .await
        .map_err(|_| ConnectionError::transport(format!("SOAP request to {} timed out", url)))??;

    let status = response.status();
    if !status.is_success() {
        return Err(ConnectionError::transport(format!(
            "SOAP request to {} returned {}",
            url, status
        )));
    }

    Ok(response.text().await?)
}

/// Extract element text, with or without a namespace prefix (simple parser, not full XML)
pub(crate) fn extract_xml_content(xml: &str, tag: &str) -> Option<String> {
    let plain = format!("<{}>", tag);
    let prefixed = format!(":{}>", tag);

    let content_start = match xml.find(&plain) {
        Some(pos) => pos + plain.len(),
        None => xml.find(&prefixed)? + prefixed.len(),
    };
    let rest = &xml[content_start..];
    let content_end = rest.find("</")?;
    let value = rest[..content_end].trim();

    (!value.is_empty()).then(|| value.to_string())
}
