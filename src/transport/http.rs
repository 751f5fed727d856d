//! `ureq`-backed transport rooted at the configured base URL.

use std::io;
use std::time::Duration;
use url::Url;

use super::{HttpResponse, Transport, TransportError};

pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("wastewatch/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Connect(format!("invalid endpoint '{}': {}", path, e)))
    }
}

impl Transport for HttpTransport {
    fn is_online(&self) -> bool {
        match self.base_url.socket_addrs(|| None) {
            Ok(addrs) => !addrs.is_empty(),
            Err(err) => {
                log::debug!("cannot resolve {}: {}", self.base_url, err);
                false
            }
        }
    }

    fn get(&self, path: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint(path)?;
        let result = self
            .agent
            .get(url.as_str())
            .timeout(timeout)
            .set("Accept", "application/json")
            .call();
        finish(result)
    }

    fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint(path)?;
        let payload = body.to_string();
        let result = self
            .agent
            .post(url.as_str())
            .timeout(timeout)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_string(&payload);
        finish(result)
    }
}

fn finish(result: Result<ureq::Response, ureq::Error>) -> Result<HttpResponse, TransportError> {
    match result {
        Ok(response) => read_response(response),
        // Non-2xx still carries a body the caller wants to inspect.
        Err(ureq::Error::Status(_, response)) => read_response(response),
        Err(ureq::Error::Transport(transport)) => Err(classify_transport(&transport)),
    }
}

fn read_response(response: ureq::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status();
    let body = response.into_string().map_err(|e| classify_io(&e))?;
    Ok(HttpResponse { status, body })
}

fn classify_transport(err: &ureq::Transport) -> TransportError {
    if is_timeout(err) {
        return TransportError::Timeout;
    }
    match err.kind() {
        ureq::ErrorKind::Dns => TransportError::Offline(err.to_string()),
        _ => TransportError::Connect(err.to_string()),
    }
}

fn classify_io(err: &io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
        _ => TransportError::Connect(format!("read response body: {}", err)),
    }
}

fn is_timeout(err: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    err.to_string().contains("timed out")
}
