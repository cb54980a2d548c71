use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::session;

const SESSION_COOKIE: &str = "nos_session";

/// Wire error envelope nosd emits: `{error:{code,message,retryAfterSec?}}`.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(rename = "retryAfterSec")]
    retry_after_sec: Option<u64>,
}

/// Thin HTTP client for nosd's `/api/v1` surface. Carries the session cookie
/// by hand rather than via `reqwest`'s cookie jar, since the cookie must
/// survive across separate `nosctl` process invocations.
pub struct NosClient {
    base_url: String,
    http: reqwest::Client,
    session_cookie: Option<String>,
}

impl NosClient {
    pub fn new(base_url: String) -> Result<Self> {
        let session_cookie = session::load()?;
        Ok(Self {
            base_url,
            http: reqwest::Client::builder()
                .build()
                .context("building http client")?,
            session_cookie,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url.trim_end_matches('/'))
    }

    fn apply_cookie(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => builder.header("cookie", format!("{SESSION_COOKIE}={cookie}")),
            None => builder,
        }
    }

    /// Stores the session cookie from a `Set-Cookie` response header, if
    /// present, so the caller doesn't have to parse it themselves.
    fn remember_session(&mut self, response: &reqwest::Response) -> Result<()> {
        for value in response.headers().get_all("set-cookie") {
            let text = value.to_str().unwrap_or_default();
            if let Some(rest) = text.strip_prefix(&format!("{SESSION_COOKIE}=")) {
                let cookie = rest.split(';').next().unwrap_or_default().to_string();
                if !cookie.is_empty() {
                    session::save(&cookie)?;
                    self.session_cookie = Some(cookie);
                }
            }
        }
        Ok(())
    }

    pub async fn get<R: DeserializeOwned>(&mut self, path: &str) -> Result<R> {
        let request = self.apply_cookie(self.http.get(self.url(path)));
        let response = request.send().await.context("sending request")?;
        self.handle(response).await
    }

    pub async fn post<P: Serialize, R: DeserializeOwned>(&mut self, path: &str, body: &P) -> Result<R> {
        let request = self.apply_cookie(self.http.post(self.url(path)).json(body));
        let response = request.send().await.context("sending request")?;
        self.handle(response).await
    }

    pub async fn patch<P: Serialize, R: DeserializeOwned>(&mut self, path: &str, body: &P) -> Result<R> {
        let request = self.apply_cookie(self.http.patch(self.url(path)).json(body));
        let response = request.send().await.context("sending request")?;
        self.handle(response).await
    }

    pub async fn delete<R: DeserializeOwned>(&mut self, path: &str) -> Result<R> {
        let request = self.apply_cookie(self.http.delete(self.url(path)));
        let response = request.send().await.context("sending request")?;
        self.handle(response).await
    }

    async fn handle<R: DeserializeOwned>(&mut self, response: reqwest::Response) -> Result<R> {
        self.remember_session(&response)?;
        let status = response.status();
        let body: Value = response.json().await.context("decoding response body")?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_value(body)
                .with_context(|| format!("server returned {status} with an unrecognized body"))?;
            let retry = envelope
                .error
                .retry_after_sec
                .map(|secs| format!(" (retry after {secs}s)"))
                .unwrap_or_default();
            bail!("{} ({}){retry}", envelope.error.message, envelope.error.code);
        }

        serde_json::from_value(body).context("decoding response payload")
    }
}
