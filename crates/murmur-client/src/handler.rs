use murmur_proto::Frame;

use crate::client::Client;

/// Receives every frame kind the connection engine does not consume itself
/// (text messages, ACLs, voice tunnel, user stats, ...).
///
/// Called inline from the dispatch loop; long-running work should be handed
/// off to another task.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, client: &Client, frame: &Frame);
}
