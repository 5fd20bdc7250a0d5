//! Minimal HTTP/1.1 client over hyper, shared by HTTP probes and the
//! metrics push sink. One request per connection; `http://` only.

use bytes::Bytes;
use http::uri::Authority;
use http::{Method, StatusCode, Uri, header};
use http_body_util::Full;
use thiserror::Error;

const USER_AGENT: &str = "svcwatch/0.1";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url {url:?}: {message}")]
    Url { url: String, message: String },

    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("request failed: {0}")]
    Send(#[source] hyper::Error),
}

/// Where a request goes, split out of an `http://` URL.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    authority: Authority,
    /// `host:port` to connect to; port defaults to 80.
    address: String,
    path: String,
}

impl HttpTarget {
    pub fn parse(url: &str) -> Result<Self, HttpError> {
        let url_error = |message: String| HttpError::Url {
            url: url.to_string(),
            message,
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| url_error(e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(url_error("only http:// is supported".to_string()));
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| url_error("no host".to_string()))?;
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let path = uri.path_and_query().map_or("/", |p| p.as_str()).to_string();

        Ok(Self {
            authority,
            address,
            path,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Send one request and return the response status. The body of the
/// response is not read. Callers bound the whole call with their timeout.
pub async fn send(
    target: &HttpTarget,
    method: Method,
    content_type: Option<&str>,
    body: Bytes,
) -> Result<StatusCode, HttpError> {
    let stream = tokio::net::TcpStream::connect(&target.address)
        .await
        .map_err(|source| HttpError::Connect {
            address: target.address.clone(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(HttpError::Handshake)?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut builder = http::Request::builder()
        .method(method)
        .uri(target.path.as_str())
        .header(header::HOST, target.authority.as_str())
        .header(header::USER_AGENT, USER_AGENT);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Full::new(body))?;

    let response = sender.send_request(request).await.map_err(HttpError::Send)?;
    Ok(response.status())
}
