//! Access log in the Apache combined format.
//!
//! # Format
//! ```text
//! :remote-addr - - [:date] ":method :url HTTP/:version" :status :content-length ":referrer" ":user-agent"
//! ```
//!
//! Each line is handed to the structured logger as an `info` event once the
//! response head is ready.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, Version},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::observability::logging;

/// Request-side fields of an access-log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub remote_addr: Option<String>,
    pub method: String,
    pub url: String,
    pub version: &'static str,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessEntry {
    pub fn from_request(request: &Request) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            remote_addr,
            method: request.method().to_string(),
            url,
            version: version_str(request.version()),
            referrer: header_str(request.headers(), header::REFERER),
            user_agent: header_str(request.headers(), header::USER_AGENT),
        }
    }

    /// Render the combined-format line for a response.
    pub fn format(&self, status: u16, content_length: Option<&str>, at: DateTime<Utc>) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"",
            self.remote_addr.as_deref().unwrap_or("-"),
            at.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.url,
            self.version,
            status,
            content_length.unwrap_or("-"),
            self.referrer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }
}

/// Middleware function emitting one access-log line per request.
pub async fn access_log(request: Request, next: Next) -> Response {
    let entry = AccessEntry::from_request(&request);
    let response = next.run(request).await;

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok());
    let line = entry.format(response.status().as_u16(), content_length, Utc::now());
    logging::forward_access_line(&line);

    response
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "-",
    }
}
