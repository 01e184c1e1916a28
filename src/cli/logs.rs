//! Logs command implementation

use crate::cli::LogsArgs;
use crate::client::{JobsClient, ServiceError};
use crate::config::LookoutConfig;
use crate::roster::JobId;
use crate::stream::{LogLine, StreamKey, StreamKind, StreamObserver, StreamSupervisor};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Prints each fresh line and reports the stream's terminal state.
struct LinePrinter {
    done: mpsc::UnboundedSender<Result<(), ServiceError>>,
}

impl StreamObserver for LinePrinter {
    fn on_line(&self, _key: &StreamKey, line: &LogLine) {
        println!("{}", line.display_line());
    }

    fn on_error(&self, _key: &StreamKey, error: &ServiceError) {
        let _ = self.done.send(Err(error.clone()));
    }

    fn on_complete(&self, _key: &StreamKey) {
        let _ = self.done.send(Ok(()));
    }
}

/// Handle `lookout logs` command
pub async fn handle_logs(
    args: &LogsArgs,
    mut config: LookoutConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.no_timestamps {
        config.stream.include_timestamps = false;
    }

    let client = Arc::new(JobsClient::new(&config.service)?);
    let job = JobId::from(args.job.as_str());

    if args.snapshot {
        let lines = client
            .fetch_log_snapshot(&job, config.stream.include_timestamps)
            .await?;
        for line in lines {
            println!("{}", line.display_line());
        }
        return Ok(());
    }

    let supervisor = StreamSupervisor::new(Arc::clone(&client), config.stream.clone());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let observer = Arc::new(LinePrinter { done: done_tx });

    supervisor.start(job.clone(), StreamKind::Logs, observer);
    let key = StreamKey::logs(job);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            supervisor.cancel(&key);
            Ok(())
        }
        outcome = done_rx.recv() => match outcome {
            Some(Ok(())) | None => Ok(()),
            Some(Err(error)) => Err(error.into()),
        },
    }
}
