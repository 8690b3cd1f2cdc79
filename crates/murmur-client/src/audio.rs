use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Codec identifier the server knows as Opus.
pub const OPUS_CODEC_ID: i32 = 4;

/// An audio codec implementation supplied by the audio subsystem.
///
/// The connection engine only asks which codecs exist; encoding and frame
/// cadence never pass through it.
pub trait AudioCodec: Send + Sync {
    fn id(&self) -> i32;

    fn name(&self) -> &str;
}

/// Codecs available to this process, keyed by identifier.
///
/// The audio subsystem registers its codecs before the first connection is
/// made; the handshake reads the registry it was given through
/// [`Config::codecs`](crate::Config::codecs).
#[derive(Default)]
pub struct CodecRegistry {
    codecs: RwLock<BTreeMap<i32, Arc<dyn AudioCodec>>>,
}

static GLOBAL: Lazy<Arc<CodecRegistry>> = Lazy::new(|| Arc::new(CodecRegistry::new()));

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. Empty until something registers a codec.
    pub fn global() -> Arc<CodecRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the codec previously registered under the same identifier.
    pub fn register(&self, codec: Arc<dyn AudioCodec>) -> Option<Arc<dyn AudioCodec>> {
        self.codecs.write().insert(codec.id(), codec)
    }

    pub fn unregister(&self, id: i32) -> Option<Arc<dyn AudioCodec>> {
        self.codecs.write().remove(&id)
    }

    pub fn get(&self, id: i32) -> Option<Arc<dyn AudioCodec>> {
        self.codecs.read().get(&id).cloned()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.codecs.read().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<i32> {
        self.codecs.read().keys().copied().collect()
    }

    pub fn supports_opus(&self) -> bool {
        self.contains(OPUS_CODEC_ID)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
