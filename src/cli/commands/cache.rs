//! Cache command - inspect and check the precache bucket

use crate::cache::{format_bytes, CacheBucket, CacheStore, PrecacheManifest};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::HttpNetwork;
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;
use std::time::Duration;
use url::Url;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> SwgateResult<()> {
    match args.action {
        CacheAction::Plan { format } => show_plan(config, format),
        CacheAction::Check { origin, timeout } => {
            let origin = origin.unwrap_or_else(|| config.app.origin.clone());
            check(config, &origin, Duration::from_secs(timeout)).await
        }
    }
}

fn show_plan(config: &Config, format: OutputFormat) -> SwgateResult<()> {
    let bucket = config.bucket_name();
    let manifest = config.manifest();

    match format {
        OutputFormat::Json => {
            let plan = serde_json::json!({
                "bucket": bucket.to_string(),
                "origin": config.app.origin,
                "manifest": manifest.entries(),
                "digest": manifest.digest(),
                "offline_fallback": config.cache.offline_fallback,
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => print_plan(config, &manifest),
    }
    Ok(())
}

fn print_plan(config: &Config, manifest: &PrecacheManifest) {
    println!("{:<10} {}", "BUCKET", style(config.bucket_name()).bold());
    println!("{:<10} {}", "ORIGIN", config.app.origin);
    println!("{:<10} {}", "DIGEST", manifest.digest());
    if let Some(fallback) = &config.cache.offline_fallback {
        println!("{:<10} {}", "OFFLINE", fallback);
    }
    println!();
    for entry in manifest.entries() {
        println!("  {}", entry);
    }
    println!();
    println!(
        "Bump cache.version when the digest changes; older buckets are removed on activation."
    );
}

/// Precache the manifest from a live origin into a scratch store
async fn check(config: &Config, origin: &str, timeout: Duration) -> SwgateResult<()> {
    let ctx = UiContext::detect();
    let url = Url::parse(origin).map_err(|e| SwgateError::InvalidUrl {
        url: origin.to_string(),
        reason: e.to_string(),
    })?;
    let bucket = config.bucket_name();
    let manifest = config.manifest();
    let network = HttpNetwork::new(timeout);
    let store = CacheStore::new();

    ui::intro(&ctx, &format!("swgate cache check: {}", bucket));

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Precaching {} resources from {}",
        manifest.len(),
        url
    ));

    match store.install(&bucket, &manifest, &url, &network).await {
        Ok(count) => spinner.stop(&format!("Precached {} resources", count)),
        Err(e) => {
            spinner.stop_error(&e.to_string());
            ui::outro_error(&ctx, "The install would fail; the current version keeps serving");
            return Err(e);
        }
    }

    let snapshot = store
        .snapshot(&bucket)
        .await
        .ok_or_else(|| SwgateError::BucketNotFound(bucket.to_string()))?;
    print_bucket(&ctx, &snapshot);

    ui::outro_success(&ctx, &format!("{} installs cleanly", bucket));
    Ok(())
}

fn print_bucket(ctx: &UiContext, bucket: &CacheBucket) {
    ui::section(ctx, &bucket.name.to_string());
    for key in bucket.keys() {
        if let Some(stored) = bucket.get(key) {
            let size = format_bytes(stored.response.body.len() as u64);
            let content_type = stored
                .response
                .headers
                .get("content-type")
                .map(String::as_str)
                .unwrap_or("-");
            ui::key_value(
                ctx,
                key,
                &format!("{} {} {}", stored.response.status, size, content_type),
            );
        }
    }
    ui::key_value(ctx, "total", &format_bytes(bucket.size_bytes()));
}
