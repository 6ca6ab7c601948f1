//! Simulate command - run the update handshake across in-memory tabs
//!
//! Serves the configured manifest from an in-memory origin, activates the
//! configured version, then publishes the next version and follows every tab
//! through discovery, skip-waiting, the update notice and the reload.

use crate::audit::AuditLog;
use crate::cache::{BucketName, CacheStore};
use crate::cli::args::SimulateArgs;
use crate::config::{Config, UpdatePolicy};
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{MemoryNetwork, Request};
use crate::lifecycle::{ClientEvent, ClientUpdateListener, Origin, WorkerScript, WorkerState};
use crate::ui::{self, UiContext};
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Upper bound on one tab's handshake, reload delay included
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute the simulate command
pub async fn execute(args: SimulateArgs, config: &Config) -> SwgateResult<()> {
    let ctx = UiContext::detect();
    let policy = args.policy.unwrap_or(config.update.policy);
    let mut update = config.update.clone();
    update.policy = policy;

    let origin_url = Url::parse(&config.app.origin).map_err(|e| SwgateError::InvalidUrl {
        url: config.app.origin.clone(),
        reason: e.to_string(),
    })?;
    let manifest = config.manifest();
    let current = config.bucket_name();
    let next = current.next()?;

    if let Some(resource) = &args.fail {
        if !manifest.contains(resource) {
            return Err(SwgateError::User(format!(
                "{} is not in the precache manifest",
                resource
            )));
        }
    }

    ui::intro(
        &ctx,
        &format!("swgate simulate: {} -> {} ({} tabs)", current, next, args.tabs),
    );

    let network = MemoryNetwork::serving(&origin_url, manifest.entries(), current.version)?;
    let origin = Origin::from_config(
        config,
        CacheStore::new(),
        Arc::new(network.clone()),
        AuditLog::new(config),
    )?;

    let mut tabs = Vec::with_capacity(usize::from(args.tabs));
    for _ in 0..args.tabs {
        tabs.push(ClientUpdateListener::connect(origin.clone(), &update).await);
    }

    // First install: activates on its own and claims every tab
    let first = tabs[0]
        .register(WorkerScript::new(current.clone(), manifest.clone()))
        .await?;
    let state = first
        .wait_for(|s| s == WorkerState::Activated || s.is_terminal())
        .await;
    if state != WorkerState::Activated {
        ui::outro_error(&ctx, &format!("{} did not activate", current));
        return Err(SwgateError::PrecacheFailed {
            resource: current.to_string(),
            reason: "initial install failed".to_string(),
        });
    }
    ui::step_ok(
        &ctx,
        &format!("{} {} and controls {} tabs", current, ui::worker_state(state), args.tabs),
    );

    // Publish the next version
    for entry in manifest.entries() {
        let url = origin_url.join(entry).map_err(|e| SwgateError::InvalidUrl {
            url: entry.clone(),
            reason: e.to_string(),
        })?;
        network.serve(url.as_str(), 200, format!("{} (v{})", entry, next.version));
        if args.fail.as_deref() == Some(entry.as_str()) {
            network.set_reachable(url.as_str(), false);
        }
    }

    let candidate = tabs[0]
        .register(WorkerScript::new(next.clone(), manifest.clone()))
        .await?;
    let state = candidate
        .wait_for(|s| !matches!(s, WorkerState::Installing))
        .await;

    if state == WorkerState::Redundant {
        return report_failed_install(&ctx, &origin, &origin_url, &current, &next).await;
    }
    ui::step_ok(
        &ctx,
        &format!("{} {}, waiting behind {}", next, ui::worker_state(state), current),
    );

    let policy_note = match policy {
        UpdatePolicy::Prompt => "tab 1 accepts the update prompt",
        UpdatePolicy::Immediate => "tabs apply the update on discovery",
    };
    ui::step_info(&ctx, &format!("Policy {:?}: {}", policy, policy_note));

    let handles: Vec<_> = tabs
        .into_iter()
        .enumerate()
        .map(|(index, tab)| tokio::spawn(drive_tab(index, tab, policy)))
        .collect();

    ui::section(&ctx, "Tabs");
    for (index, handle) in handles.into_iter().enumerate() {
        let events = handle
            .await
            .map_err(|e| SwgateError::Internal(format!("tab {} task failed: {}", index + 1, e)))??;
        print_tab(index, &events);
    }

    ui::section(&ctx, "Result");
    let controller = origin
        .controller()
        .await
        .map(|w| w.bucket().to_string())
        .unwrap_or_else(|| "none".to_string());
    ui::key_value(&ctx, "controller", &controller);
    ui::key_value(&ctx, "buckets", &origin.store().bucket_names().await.join(", "));
    if config.general.audit_log {
        ui::key_value(
            &ctx,
            "journal",
            &AuditLog::new(config).path().display().to_string(),
        );
    }

    ui::outro_success(&ctx, &format!("All tabs reloaded onto {}", next));
    Ok(())
}

/// Follow one tab until it reloads
async fn drive_tab(
    index: usize,
    mut tab: ClientUpdateListener,
    policy: UpdatePolicy,
) -> SwgateResult<Vec<ClientEvent>> {
    let run = async {
        let mut events = Vec::new();
        while let Some(event) = tab.next_event().await {
            if matches!(event, ClientEvent::UpdateAvailable { .. })
                && policy == UpdatePolicy::Prompt
                && index == 0
            {
                tab.apply_update()?;
            }
            let done = event == ClientEvent::Reload;
            events.push(event);
            if done {
                break;
            }
        }
        Ok::<_, SwgateError>(events)
    };

    tokio::time::timeout(HANDSHAKE_TIMEOUT, run)
        .await
        .map_err(|_| SwgateError::Internal(format!("tab {} never reloaded", index + 1)))?
}

fn print_tab(index: usize, events: &[ClientEvent]) {
    let rendered: Vec<String> = events
        .iter()
        .map(|event| match event {
            ClientEvent::UpdateAvailable { bucket } => {
                format!("{} {}", style("update available").yellow(), bucket)
            }
            ClientEvent::AppUpdated { message } => {
                format!("{} {:?}", style("APP_UPDATED").cyan(), message)
            }
            ClientEvent::Reload => style("reload").green().to_string(),
        })
        .collect();
    println!("  tab {:<3} {}", index + 1, rendered.join(" -> "));
}

async fn report_failed_install(
    ctx: &UiContext,
    origin: &Origin,
    origin_url: &Url,
    current: &BucketName,
    next: &BucketName,
) -> SwgateResult<()> {
    ui::step_error(ctx, &format!("{} failed to precache and became redundant", next));

    let request = Request::get(origin_url.clone());
    let outcome = origin.fetch(&request).await?;
    debug!("Fetch after failed install served from {:?}", outcome.source);
    ui::step_ok(
        ctx,
        &format!(
            "{} still serves {} ({:?}): {}",
            current,
            request.url,
            outcome.source,
            String::from_utf8_lossy(&outcome.response.body)
        ),
    );
    ui::key_value(ctx, "buckets", &origin.store().bucket_names().await.join(", "));
    ui::step_warn_hint(
        ctx,
        "No update was offered to the tabs",
        "Fix the unreachable resource and register again",
    );
    Ok(())
}
