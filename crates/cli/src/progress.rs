//! Prints dispatcher events to stdout as they arrive.

use sketchcast_pipeline::events::DispatchEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Print events until every sender is dropped.
pub fn spawn_printer(mut rx: broadcast::Receiver<DispatchEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Progress printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &DispatchEvent) {
    match event {
        DispatchEvent::BatchStarted { total, service } => {
            println!("{service}: {total} request(s)");
        }
        DispatchEvent::Started { index, name, total } => {
            println!("[{}/{total}] Generating: {name}", index + 1);
        }
        DispatchEvent::Finished {
            completed,
            total,
            result,
        } => match (&result.output_path, &result.error) {
            (Some(path), _) if result.success => {
                println!("  ✓ {completed}/{total} {} -> {}", result.name, path.display());
            }
            (_, error) => {
                println!(
                    "  ✗ {completed}/{total} {}: {}",
                    result.name,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        },
        DispatchEvent::Waiting { delay } => {
            println!("  Waiting {}s before next request...", delay.as_secs());
        }
    }
}
