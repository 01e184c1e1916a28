//! Watch command implementation

use crate::cli::output::{format_jobs_table, format_roster_event, JobView};
use crate::cli::WatchArgs;
use crate::client::JobsClient;
use crate::config::LookoutConfig;
use crate::roster::RosterPoller;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Handle `lookout watch` command: print the roster, then follow changes
/// until interrupted.
pub async fn handle_watch(
    args: &WatchArgs,
    mut config: LookoutConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(interval) = args.interval {
        if interval == 0 {
            return Err("--interval must be at least 1 second".into());
        }
        // An explicit flag beats the configured cadence, auto-refresh included.
        config.poll.interval_seconds = interval;
        config.poll.auto_refresh = false;
    }

    let client = Arc::new(JobsClient::new(&config.service)?);
    let poller = Arc::new(RosterPoller::new(client, config.poll.clone()));
    let mut events = poller.subscribe();

    // Prime the roster and show the starting state before going quiet.
    poller.poll_once().await?;
    print_roster(&poller);

    let cancel = CancellationToken::new();
    let handle = Arc::clone(&poller).start(cancel.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", format_roster_event(&event));
                    if args.table {
                        print_roster(&poller);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed roster notifications, reprinting roster");
                    print_roster(&poller);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    let _ = handle.await;
    Ok(())
}

fn print_roster(poller: &RosterPoller) {
    let snapshot = poller.snapshot();
    let mut views: Vec<JobView> = snapshot.values().map(JobView::from).collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    println!("{}", format_jobs_table(&views));
}
