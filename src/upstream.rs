use crate::{
    config,
    errors::{AppError, AppResult},
};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{header, Method, StatusCode};
use std::time::Duration;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Backtest,
    Analytics,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Backtest => "backtest",
            Service::Analytics => "analytics",
        }
    }
}

/// An upstream reply relayed to the client as-is.
#[derive(Debug)]
pub struct Forwarded {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl IntoResponse for Forwarded {
    fn into_response(self) -> Response {
        (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

pub struct Upstream {
    client: reqwest::Client,
    backtest_base: String,
    analytics_base: String,
}

impl Upstream {
    pub fn new(cfg: &config::Upstream) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_s))
            .build()?;
        Ok(Self {
            client,
            backtest_base: cfg.backtest_url.trim().trim_end_matches('/').to_string(),
            analytics_base: cfg.analytics_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, service: Service, path: &str, query: Option<&str>) -> String {
        let base = match service {
            Service::Backtest => &self.backtest_base,
            Service::Analytics => &self.analytics_base,
        };
        let mut url = format!("{base}/{}", path.trim_start_matches('/'));
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Sends method, content type, query and body through unchanged and
    /// returns whatever status and body the service answered with. Only
    /// transport failures become errors.
    pub async fn forward(
        &self,
        service: Service,
        method: Method,
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> AppResult<Forwarded> {
        let url = self.url_for(service, path, query);
        let bodyless = matches!(method, Method::GET | Method::HEAD) && body.is_empty();
        let mut req = self.client.request(method, &url);
        if !bodyless {
            req = req
                .header(header::CONTENT_TYPE, content_type.unwrap_or(DEFAULT_CONTENT_TYPE))
                .body(body);
        }
        let resp = req.send().await.map_err(|e| {
            tracing::warn!(service = service.as_str(), error = %e, "upstream request failed");
            AppError::Upstream(service.as_str().to_string())
        })?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|_| AppError::Upstream(service.as_str().to_string()))?;
        Ok(Forwarded { status, content_type, body })
    }
}
