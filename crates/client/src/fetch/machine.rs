//! The per-site retry/redirect/TLS decision machine.
//!
//! Pure state: the machine never touches the network. The driver asks it for
//! an [`AttemptPlan`], performs the request, reports the outcome, and obeys
//! the returned [`Step`]. Terminal outcomes collapse into a [`Verdict`].
//!
//! Retries come in two prices. Cost-free retries (redirects, trying the next
//! URL path, the one-shot `www.` prefix, pool starvation) never touch the
//! retry budget; everything else burns one retry and pauses a second first.

use std::time::Duration;

use sitegrab_core::GrabConfig;
use sitegrab_core::record::{SUCCESS_CODES, normalize_warnings};

use super::classify::AttemptFailure;
use super::url::{self, Protocol};
use crate::tls::TlsMode;

/// Pause before a cost-consuming retry.
const RETRY_PAUSE: Duration = Duration::from_secs(1);
/// Pause when the connection pool had nothing free.
const POOL_PAUSE: Duration = Duration::from_secs(1);

/// What the driver should fetch next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPlan {
    pub url: String,
    pub tls: TlsMode,
    /// Ask the server to close the connection after responding.
    pub close_connection: bool,
}

/// What the driver should do after reporting an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run another attempt, optionally after a pause.
    Retry { pause: Option<Duration> },
    /// The site is decided; collect the verdict.
    Done,
}

/// Terminal summary of one site's attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The last URL attempted, possibly empty if none was ever built.
    pub url: String,
    /// Final HTTP status, or 0 when the fetch ended in a non-HTTP error.
    pub code: u16,
    /// Empty on success.
    pub error: String,
    /// Sorted, deduplicated.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct SiteMachine {
    url_paths: Vec<String>,
    max_url_path: usize,

    protocol: Protocol,
    host: String,
    url_path_index: usize,
    /// Current request path; redirects overwrite it.
    path: String,
    retries_left: u32,
    redirects_left: u32,
    close_connection: bool,
    just_not_close: bool,
    tls: TlsMode,

    warnings: Vec<String>,
    current_url: String,
    last_code: u16,
    last_error: String,
    decided: bool,
}

impl SiteMachine {
    pub fn new(site: &str, config: &GrabConfig) -> Self {
        let url_paths = config.url_paths.clone();
        let max_url_path = url_paths.len();
        let path = forced_path(url_paths.first().map(String::as_str).unwrap_or("/"));
        Self {
            url_paths,
            max_url_path,
            protocol: Protocol::Https,
            host: site.to_string(),
            url_path_index: 0,
            path,
            retries_left: config.max_retries,
            redirects_left: config.max_redirects,
            close_connection: true,
            just_not_close: false,
            tls: TlsMode::Strict,
            warnings: Vec::new(),
            current_url: String::new(),
            last_code: 0,
            last_error: String::new(),
            decided: false,
        }
    }

    /// Build the next attempt, or `None` when the site is already decided
    /// (URL assembly failure included).
    pub fn plan(&mut self) -> Option<AttemptPlan> {
        if self.decided {
            return None;
        }

        match url::assemble(self.protocol, &self.host, &self.path) {
            Ok(assembled) => {
                self.current_url = assembled.clone();
                Some(AttemptPlan { url: assembled, tls: self.tls, close_connection: self.close_connection })
            }
            Err(e) => {
                self.last_code = 0;
                self.fail_terminal(e.to_string());
                None
            }
        }
    }

    /// Report a received HTTP response.
    pub fn on_response(&mut self, code: u16, location: Option<&str>) -> Step {
        self.last_code = code;
        self.last_error.clear();

        if SUCCESS_CODES.contains(&code) {
            self.decided = true;
            return Step::Done;
        }

        if is_redirect(code) {
            return self.on_redirect(location);
        }

        self.just_not_close = false;

        if self.url_path_index + 1 < self.max_url_path {
            self.url_path_index += 1;
            self.path = forced_path(&self.url_paths[self.url_path_index]);
            return Step::Retry { pause: None };
        }

        // Out of paths and not a storable status. The status becomes the
        // terminal error, so a non-2xx record always explains itself.
        let error = format!("unexpected status {code}");
        self.warnings.push(warning_token(&error));
        self.retry_with_cost(error)
    }

    /// Report a failed attempt.
    pub fn on_failure(&mut self, failure: &AttemptFailure) -> Step {
        self.last_code = 0;
        self.just_not_close = false;

        match failure {
            AttemptFailure::BodyTooLarge(_) => self.fail_terminal(failure.to_string()),

            AttemptFailure::NoFreeConnection => Step::Retry { pause: Some(POOL_PAUSE) },

            AttemptFailure::Dns(_) => {
                if !self.host.starts_with("www.") {
                    self.host.insert_str(0, "www.");
                    self.warnings.push("prefix_www".to_string());
                    Step::Retry { pause: None }
                } else {
                    self.fail_terminal(failure.to_string())
                }
            }

            AttemptFailure::TlsWrongHost(_) => {
                self.warnings.push("tls_wrong_host".to_string());
                self.tls = TlsMode::Insecure;
                self.retry_with_cost(failure.to_string())
            }

            AttemptFailure::TlsUnknownAuthority(_) => {
                self.warnings.push("tls_unknown_authority".to_string());
                self.tls = TlsMode::Insecure;
                self.retry_with_cost(failure.to_string())
            }

            AttemptFailure::TlsExpiredCert(_) => {
                self.warnings.push("tls_expired_cert".to_string());
                self.tls = TlsMode::Insecure;
                self.retry_with_cost(failure.to_string())
            }

            AttemptFailure::TlsInternalError(_) => {
                self.warnings.push("unencrypted_http_failback".to_string());
                self.protocol = Protocol::Http;
                self.retry_with_cost(failure.to_string())
            }

            AttemptFailure::ConnectionRefused(_) => {
                self.warnings.push("connection_refused".to_string());
                self.fail_terminal(failure.to_string())
            }

            AttemptFailure::ClosedBeforeResponse => self.retry_with_cost(failure.to_string()),

            AttemptFailure::Other(text) => {
                self.warnings.push(warning_token(text));
                self.retry_with_cost(text.clone())
            }
        }
    }

    /// End the site early; the cancellation handle fired between retries.
    pub fn cancel(&mut self) {
        if !self.decided {
            self.last_code = 0;
            self.fail_terminal("cancelled".to_string());
        }
    }

    fn on_redirect(&mut self, location: Option<&str>) -> Step {
        self.warnings.push("redirect".to_string());

        self.redirects_left = self.redirects_left.saturating_sub(1);
        if self.redirects_left == 0 {
            return self.fail_redirect_exhausted();
        }

        let Some(location) = location else {
            return self.fail_terminal("missing Location header in redirect".to_string());
        };

        let target = match url::resolve_redirect(&self.current_url, location) {
            Ok(target) => target,
            Err(e) => return self.fail_terminal(e.to_string()),
        };

        if target.url.eq_ignore_ascii_case(&self.current_url) {
            if self.just_not_close {
                return self.fail_redirect_exhausted();
            }
            self.warnings.push("redirect_to_self".to_string());
            self.close_connection = false;
            self.just_not_close = true;
        } else {
            self.just_not_close = false;
        }

        if self.host != target.host {
            self.warnings.push("redirect_to_other_host".to_string());
        }
        if self.path != target.path {
            self.warnings.push("redirect_to_other_path".to_string());
        }
        if self.protocol == Protocol::Https && target.protocol == Protocol::Http {
            self.warnings.push("https_to_http_redirect".to_string());
        }

        self.host = target.host;
        self.path = target.path;
        self.protocol = target.protocol;

        Step::Retry { pause: None }
    }

    // The redirect responses were real HTTP traffic, so the last status
    // code (a 3xx) stays on the record.
    fn fail_redirect_exhausted(&mut self) -> Step {
        self.fail_terminal("too many redirects".to_string())
    }

    fn retry_with_cost(&mut self, error: String) -> Step {
        self.last_error = error;
        self.retries_left = self.retries_left.saturating_sub(1);
        if self.retries_left == 0 {
            self.decided = true;
            return Step::Done;
        }
        Step::Retry { pause: Some(RETRY_PAUSE) }
    }

    fn fail_terminal(&mut self, error: String) -> Step {
        self.last_error = error;
        self.decided = true;
        Step::Done
    }

    /// Number of cost-consuming retries still available.
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Collapse into the terminal summary.
    pub fn into_verdict(mut self) -> Verdict {
        normalize_warnings(&mut self.warnings);
        Verdict {
            url: self.current_url,
            code: self.last_code,
            error: self.last_error,
            warnings: self.warnings,
        }
    }
}

fn is_redirect(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

fn forced_path(path: &str) -> String {
    if path.starts_with('/') { path.to_string() } else { format!("/{path}") }
}

/// Turn error text into a warning token: spaces become underscores.
pub fn warning_token(text: &str) -> String {
    text.replace(' ', "_")
}
