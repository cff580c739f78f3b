use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use crate::{network::AbstractNetworkModel, pipeline::Stage};

/// Receives the model at configured checkpoints for progress observers.
///
/// Publishing is fire-and-forget: implementations must not block and must not fail the build,
/// so the method has no error channel. Problems are logged.
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, stage: Stage, anm: &AbstractNetworkModel);
}

/// Publishing disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl SnapshotPublisher for NullPublisher {
    fn publish(&self, _stage: Stage, _anm: &AbstractNetworkModel) {}
}

/// The model serialized as JSON after `stage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub stage: Stage,
    pub body: String,
}

/// Pushes snapshots onto an unbounded channel; whoever holds the receiver forwards them on.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: UnboundedSender<Snapshot>,
}

impl ChannelPublisher {
    pub fn new(sender: UnboundedSender<Snapshot>) -> Self {
        Self { sender }
    }

    /// A publisher together with the receiving end of its channel.
    pub fn channel() -> (Self, UnboundedReceiver<Snapshot>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl SnapshotPublisher for ChannelPublisher {
    fn publish(&self, stage: Stage, anm: &AbstractNetworkModel) {
        let body = match serde_json::to_string(anm) {
            Ok(body) => body,
            Err(e) => {
                warn!("could not serialize snapshot after {stage}: {e}");
                return;
            }
        };
        debug!("publishing snapshot after {stage} ({} bytes)", body.len());
        if self.sender.send(Snapshot { stage, body }).is_err() {
            warn!("snapshot after {stage} dropped, receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_publisher_delivers() {
        let (publisher, mut receiver) = ChannelPublisher::channel();
        let anm = AbstractNetworkModel::new();
        publisher.publish(Stage::Phy, &anm);

        let snapshot = receiver.recv().await.unwrap();
        assert_eq!(snapshot.stage, Stage::Phy);
        let body: serde_json::Value = serde_json::from_str(&snapshot.body).unwrap();
        assert!(body.get("phy").is_some());
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_fail() {
        let (publisher, receiver) = ChannelPublisher::channel();
        drop(receiver);
        publisher.publish(Stage::Bgp, &AbstractNetworkModel::new());
    }
}
