//! Metrics command implementation

use crate::cli::output::format_sample;
use crate::cli::MetricsArgs;
use crate::client::{JobsClient, ServiceError};
use crate::config::LookoutConfig;
use crate::roster::JobId;
use crate::stream::{MetricSample, StreamKey, StreamKind, StreamObserver, StreamSupervisor};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Prints each sample and reports the stream's terminal state.
struct SamplePrinter {
    json: bool,
    done: mpsc::UnboundedSender<Result<(), ServiceError>>,
}

impl StreamObserver for SamplePrinter {
    fn on_sample(&self, _key: &StreamKey, sample: &MetricSample) {
        if self.json {
            match serde_json::to_string(sample) {
                Ok(line) => println!("{}", line),
                Err(error) => tracing::warn!(error = %error, "Failed to serialize sample"),
            }
        } else {
            println!("{}", format_sample(sample));
        }
    }

    fn on_error(&self, _key: &StreamKey, error: &ServiceError) {
        let _ = self.done.send(Err(error.clone()));
    }

    fn on_complete(&self, _key: &StreamKey) {
        let _ = self.done.send(Ok(()));
    }
}

/// Handle `lookout metrics` command
pub async fn handle_metrics(
    args: &MetricsArgs,
    config: LookoutConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(JobsClient::new(&config.service)?);
    let job = JobId::from(args.job.as_str());

    if args.snapshot {
        let sample = client.fetch_metric_snapshot(&job).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&sample)?);
        } else {
            println!("{}", format_sample(&sample));
        }
        return Ok(());
    }

    let supervisor = StreamSupervisor::new(Arc::clone(&client), config.stream.clone());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let observer = Arc::new(SamplePrinter {
        json: args.json,
        done: done_tx,
    });

    supervisor.start(job.clone(), StreamKind::Metrics, observer);
    let key = StreamKey::metrics(job);

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
