//! The three-stage fetch pipeline.
//!
//! ```text
//! source ──► site queue ──► fetch workers ──► encoded queue ──► writers
//! ```
//!
//! Both queues are bounded, so back-pressure propagates from disk to source:
//! a slow writer fills the encoded queue, fetch workers block on send, the
//! site queue fills, and the source loop stalls. Shutdown is the mirror
//! image: the source closes the site queue, fetch workers drain and drop
//! their encoded senders, writers drain and close their files.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sitegrab_client::SiteFetcher;
use sitegrab_core::{EncodedRecord, Error, GrabConfig, OutputFormat, bucket, cpu_count, record};
use tokio_util::sync::CancellationToken;

use crate::writer::RecordWriter;

/// Run the pipeline over the resolved sitelist.
pub async fn run(config: GrabConfig, sites: Vec<String>) -> Result<(), Error> {
    let format = config.output_format()?;
    let config = Arc::new(config);

    let (site_tx, site_rx) = async_channel::bounded::<String>(config.parallel * 4);
    let (encoded_tx, encoded_rx) = async_channel::bounded::<EncodedRecord>(cpu_count() * 4);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, draining pipeline");
                cancel.cancel();
            }
        });
    }

    let progress = ProgressBar::new(sites.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} sites ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let writer_count = if config.records_per_file > 1 { 1 } else { cpu_count() };
    let mut writer_handles = Vec::with_capacity(writer_count);
    for _ in 0..writer_count {
        let rx = encoded_rx.clone();
        let cfg = Arc::clone(&config);
        writer_handles.push(tokio::task::spawn_blocking(move || {
            let mut writer = RecordWriter::new(&cfg, format);
            while let Ok(encoded) = rx.recv_blocking() {
                if let Err(e) = writer.write(&encoded) {
                    tracing::error!(error = %e, "fatal writer error");
                    std::process::exit(1);
                }
            }
            writer.finish();
        }));
    }
    drop(encoded_rx);

    let mut fetch_handles = Vec::with_capacity(config.parallel);
    for _ in 0..config.parallel {
        let rx = site_rx.clone();
        let tx = encoded_tx.clone();
        let cfg = Arc::clone(&config);
        let cancel = cancel.clone();
        fetch_handles.push(tokio::spawn(async move {
            let mut fetcher = match SiteFetcher::new(Arc::clone(&cfg)) {
                Ok(fetcher) => fetcher,
                Err(e) => {
                    tracing::error!(error = %e, "cannot build TLS configuration");
                    return;
                }
            };

            while let Ok(site) = rx.recv().await {
                if cancel.is_cancelled() {
                    break;
                }
                if skip_recent(&cfg, format, &site) {
                    continue;
                }

                let result = fetcher.fetch_site(&site, &cancel).await;

                if !cfg.stores_code(result.code) {
                    continue;
                }
                let data = record::encode(&result, format);
                if tx.send(EncodedRecord { site: result.site, data }).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(site_rx);
    drop(encoded_tx);

    for site in sites {
        if cancel.is_cancelled() {
            break;
        }
        if site_tx.send(site).await.is_err() {
            break;
        }
        progress.inc(1);
    }
    drop(site_tx);

    for handle in fetch_handles {
        let _ = handle.await;
    }
    // All encoded senders are gone now; writers drain what is left.
    for handle in writer_handles {
        let _ = handle.await;
    }
    progress.finish();

    Ok(())
}

/// With one record per file, sites whose output file is fresh enough are
/// skipped entirely. A prior failed attempt also counts as fresh; those
/// sites come back once the window lapses.
fn skip_recent(config: &GrabConfig, format: OutputFormat, site: &str) -> bool {
    if config.records_per_file != 1 || config.skip_newer_than_min == 0 {
        return false;
    }

    let path = bucket::record_path(&config.output_folder, site, config.buckets, format, config.compress);
    match std::fs::metadata(&path).and_then(|m| m.modified()) {
        Ok(modified) => match modified.elapsed() {
            Ok(age) => age < Duration::from_secs(config.skip_newer_than_min * 60),
            // A timestamp from the future is as fresh as it gets.
            Err(_) => true,
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> GrabConfig {
        GrabConfig {
            output_folder: dir.display().to_string(),
            records_per_file: 1,
            buckets: 1,
            skip_newer_than_min: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_skip_recent_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(!skip_recent(&config, OutputFormat::Txt, "absent.test"));
    }

    #[test]
    fn test_skip_recent_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(dir.path().join("fresh.test.txt"), b"x").unwrap();
        assert!(skip_recent(&config, OutputFormat::Txt, "fresh.test"));
    }

    #[test]
    fn test_skip_recent_requires_one_record_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GrabConfig { records_per_file: 100, ..config_in(dir.path()) };
        std::fs::write(dir.path().join("fresh.test.txt"), b"x").unwrap();
        assert!(!skip_recent(&config, OutputFormat::Txt, "fresh.test"));
    }

    #[test]
    fn test_skip_recent_disabled_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = GrabConfig { skip_newer_than_min: 0, ..config_in(dir.path()) };
        std::fs::write(dir.path().join("fresh.test.txt"), b"x").unwrap();
        assert!(!skip_recent(&config, OutputFormat::Txt, "fresh.test"));
    }
}
