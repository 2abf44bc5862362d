//! Command-line surface of the grab binary.
//!
//! Flags override the layered `GrabConfig` (defaults, then config file, then
//! environment). The sitelist value is resolved in three ways: a readable
//! file of newline-separated hostnames, a comma-separated literal list, or a
//! bare hostname.

use clap::Parser;
use sitegrab_core::{Error, GrabConfig};

#[derive(Parser, Debug)]
#[command(name = "sitegrab", about = "Bulk HTTP(S) site grabber with bucketed on-disk output")]
pub struct Cli {
    /// File with one hostname per line, a comma-separated list, or a single hostname
    #[arg(long)]
    pub sitelist: String,

    /// Path to grab; repeat to try several in order
    #[arg(long = "urlpath")]
    pub urlpaths: Vec<String>,

    /// Status codes to store data from; repeat for several (default: store all)
    #[arg(long = "storecodes")]
    pub storecodes: Vec<u16>,

    /// Number of parallel requests
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Max number of retries
    #[arg(long)]
    pub retries: Option<u32>,

    /// Max number of redirects
    #[arg(long)]
    pub redirects: Option<u32>,

    /// Max response size in bytes
    #[arg(long)]
    pub maxresponsesize: Option<usize>,

    /// User agent to send to servers
    #[arg(long)]
    pub useragent: Option<String>,

    /// Log connection errors as they happen
    #[arg(long)]
    pub showerrors: bool,

    /// Results output folder
    #[arg(long)]
    pub outputfolder: Option<String>,

    /// Output format (json, txt)
    #[arg(long)]
    pub format: Option<String>,

    /// Store LZ4 compressed
    #[arg(long)]
    pub compress: bool,

    /// Number of records in each file
    #[arg(long = "perfile")]
    pub perfile: Option<usize>,

    /// Number of buckets to place files in
    #[arg(long)]
    pub buckets: Option<u64>,

    /// Skip sites whose output file is newer than N minutes (perfile=1 only)
    #[arg(long = "skipnewerthan")]
    pub skipnewerthan: Option<u64>,

    /// Abort when resident memory exceeds this many bytes (0 = off)
    #[arg(long = "memlimit")]
    pub memlimit: Option<u64>,
}

impl Cli {
    /// Lay the flags that were actually given over the loaded config.
    pub fn apply(&self, config: &mut GrabConfig) {
        if !self.urlpaths.is_empty() {
            config.url_paths = self.urlpaths.clone();
        }
        if !self.storecodes.is_empty() {
            config.store_codes = self.storecodes.clone();
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(redirects) = self.redirects {
            config.max_redirects = redirects;
        }
        if let Some(size) = self.maxresponsesize {
            config.max_response_size = size;
        }
        if let Some(ref agent) = self.useragent {
            config.user_agent = agent.clone();
        }
        if self.showerrors {
            config.show_errors = true;
        }
        if let Some(ref folder) = self.outputfolder {
            config.output_folder = folder.clone();
        }
        if let Some(ref format) = self.format {
            config.format = format.clone();
        }
        if self.compress {
            config.compress = true;
        }
        if let Some(perfile) = self.perfile {
            config.records_per_file = perfile;
        }
        if let Some(buckets) = self.buckets {
            config.buckets = buckets;
        }
        if let Some(minutes) = self.skipnewerthan {
            config.skip_newer_than_min = minutes;
        }
        if let Some(limit) = self.memlimit {
            config.mem_limit_bytes = limit;
        }
    }
}

/// Turn the `--sitelist` value into hostnames.
///
/// Lines keep their position even when empty; trailing carriage returns are
/// trimmed. No other normalization happens here or anywhere downstream.
pub fn resolve_sitelist(value: &str) -> Result<Vec<String>, Error> {
    if value.contains(',') {
        return Ok(value.split(',').map(|s| trim_cr(s).to_string()).collect());
    }

    match std::fs::read_to_string(value) {
        Ok(raw) => Ok(raw.split('\n').map(|s| trim_cr(s).to_string()).collect()),
        Err(e) => {
            if looks_like_path(value) {
                Err(Error::Sitelist(format!("{value}: {e}")))
            } else {
                tracing::info!(sitelist = value, "sitelist is not a readable file, assuming a hostname");
                Ok(vec![value.to_string()])
            }
        }
    }
}

fn trim_cr(s: &str) -> &str {
    s.trim_end_matches('\r')
}

fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\')
}
