//! Per-site fetch driver.
//!
//! One [`SiteFetcher`] per worker. For each hostname it runs the
//! [`machine::SiteMachine`] decision loop against real HTTP attempts and
//! collapses the outcome into a single [`FetchResult`].
//!
//! The worker's HTTP client holds at most one connection, and requests are
//! normally sent with `Connection: close`, so the pool is empty by the time a
//! site finishes. The exception is the redirect-to-self latch, which keeps
//! the connection open; after such a site the client is dropped and the
//! worker pauses two seconds so background socket teardown finishes before
//! the next site dials out.

pub mod classify;
pub mod machine;
pub mod url;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sitegrab_core::{FetchResult, GrabConfig};
use tokio_util::sync::CancellationToken;

use crate::tls::{TlsConfigs, TlsError, TlsMode, build_http_client};
use classify::AttemptFailure;
use machine::{AttemptPlan, SiteMachine, Step};

/// Pause after dropping a client that may still own a live connection.
const CLEANUP_PAUSE: Duration = Duration::from_secs(2);

/// One worker's reusable fetch state.
pub struct SiteFetcher {
    config: Arc<GrabConfig>,
    tls: TlsConfigs,
    client: Option<CachedClient>,
}

struct CachedClient {
    client: reqwest::Client,
    mode: TlsMode,
    /// At least one request went out without `Connection: close`.
    kept_alive: bool,
}

enum AttemptOutcome {
    Response {
        code: u16,
        ip: String,
        location: Option<String>,
        /// Header block and body, captured only for success codes.
        payload: Option<(String, String)>,
    },
    Failed(AttemptFailure),
}

impl SiteFetcher {
    pub fn new(config: Arc<GrabConfig>) -> Result<Self, TlsError> {
        Ok(Self { config, tls: TlsConfigs::new()?, client: None })
    }

    /// Fetch one site to completion, producing exactly one record.
    pub async fn fetch_site(&mut self, site: &str, cancel: &CancellationToken) -> FetchResult {
        self.recycle_client().await;
        self.tls.chain().clear();

        let mut machine = SiteMachine::new(site, &self.config);
        let mut ip = String::new();
        let mut header = String::new();
        let mut body = String::new();

        loop {
            if cancel.is_cancelled() {
                machine.cancel();
            }
            let Some(plan) = machine.plan() else { break };

            let step = match self.attempt(&plan).await {
                AttemptOutcome::Response { code, ip: peer, location, payload } => {
                    ip = peer;
                    if let Some((block, entity)) = payload {
                        header = block;
                        body = entity;
                    }
                    machine.on_response(code, location.as_deref())
                }
                AttemptOutcome::Failed(failure) => {
                    ip.clear();
                    if self.config.show_errors {
                        tracing::warn!(site, url = %plan.url, error = %failure, "attempt failed");
                    }
                    machine.on_failure(&failure)
                }
            };

            match step {
                Step::Retry { pause } => {
                    if let Some(delay) = pause {
                        tokio::time::sleep(delay).await;
                    }
                }
                Step::Done => break,
            }
        }

        let certificates = self.tls.chain().snapshot();
        let verdict = machine.into_verdict();
        tracing::debug!(
            site,
            url = %verdict.url,
            code = verdict.code,
            error = %verdict.error,
            "site decided"
        );

        FetchResult {
            site: site.to_string(),
            url: verdict.url,
            ip,
            code: verdict.code,
            certificates,
            error: verdict.error,
            warnings: verdict.warnings,
            body,
            header,
        }
    }

    async fn attempt(&mut self, plan: &AttemptPlan) -> AttemptOutcome {
        let client = match self.client_for(plan) {
            Ok(client) => client,
            Err(e) => return AttemptOutcome::Failed(classify::classify(&e)),
        };

        let mut request = client.get(&plan.url);
        if plan.close_connection {
            request = request.header(reqwest::header::CONNECTION, "close");
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Failed(classify::classify(&e)),
        };

        let code = response.status().as_u16();
        let ip = response.remote_addr().map(|addr| addr.to_string()).unwrap_or_default();

        if code == 200 || code == 206 {
            let block = header_block(&response);
            match read_body(response, self.config.max_response_size).await {
                Ok(bytes) => AttemptOutcome::Response {
                    code,
                    ip,
                    location: None,
                    payload: Some((block, String::from_utf8_lossy(&bytes).into_owned())),
                },
                Err(failure) => AttemptOutcome::Failed(failure),
            }
        } else {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            AttemptOutcome::Response { code, ip, location, payload: None }
        }
    }

    /// Reuse the cached client when the TLS posture matches, rebuild
    /// otherwise.
    fn client_for(&mut self, plan: &AttemptPlan) -> Result<reqwest::Client, reqwest::Error> {
        let rebuild = self.client.as_ref().is_none_or(|cached| cached.mode != plan.tls);
        if rebuild {
            let kept_alive = self.client.take().is_some_and(|old| old.kept_alive);
            let client = build_http_client(
                &self.tls.config(plan.tls),
                &self.config.user_agent,
                self.config.timeout(),
            )?;
            self.client = Some(CachedClient { client, mode: plan.tls, kept_alive });
        }

        let cached = self.client.as_mut().expect("client just ensured");
        cached.kept_alive |= !plan.close_connection;
        Ok(cached.client.clone())
    }

    /// Drop the previous site's client; if it may still hold a live
    /// connection, give the background teardown time to finish.
    async fn recycle_client(&mut self) {
        if let Some(old) = self.client.take() {
            let lingering = old.kept_alive;
            drop(old);
            if lingering {
                tokio::time::sleep(CLEANUP_PAUSE).await;
            }
        }
    }
}

/// Rebuild the response's header block: status line plus one `name: value`
/// line per header, CRLF-separated, blank-line terminated.
fn header_block(response: &reqwest::Response) -> String {
    let status = response.status();
    let mut out = format!("{:?} {}", response.version(), status.as_str());
    if let Some(reason) = status.canonical_reason() {
        out.push(' ');
        out.push_str(reason);
    }
    out.push_str("\r\n");
    for (name, value) in response.headers() {
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(&String::from_utf8_lossy(value.as_bytes()));
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}

/// Stream the body, refusing to buffer more than `cap` bytes.
async fn read_body(response: reqwest::Response, cap: usize) -> Result<Vec<u8>, AttemptFailure> {
    let declared = response.content_length();
    if let Some(length) = declared
        && length > cap as u64
    {
        return Err(AttemptFailure::BodyTooLarge(length));
    }

    let mut stream = response.bytes_stream();
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Err(classify::classify(&e)),
        };
        if data.len() + chunk.len() > cap {
            return Err(AttemptFailure::BodyTooLarge(
                declared.unwrap_or((data.len() + chunk.len()) as u64),
            ));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
