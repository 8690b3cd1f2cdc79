use murmur_proto::{Authenticate, Version, pack_semver, pack_version};
use tracing::debug;

use crate::config::Config;

/// Protocol version this client speaks.
pub const CLIENT_VERSION: u32 = pack_version(1, 3, 0);
pub const DEFAULT_RELEASE: &str = "murmur";

/// Values used for any Version field the override leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeDefaults {
    pub release: String,
    pub os: String,
    pub os_version: String,
    pub version: u32,
}

impl HandshakeDefaults {
    pub fn from_env() -> Self {
        Self {
            release: DEFAULT_RELEASE.to_string(),
            os: std::env::consts::OS.to_string(),
            os_version: std::env::consts::ARCH.to_string(),
            version: CLIENT_VERSION,
        }
    }
}

/// The two messages that open every connection, in send order.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub version: Version,
    pub authenticate: Authenticate,
}

pub fn build(config: &Config) -> Handshake {
    build_with(config, &HandshakeDefaults::from_env())
}

pub fn build_with(config: &Config, defaults: &HandshakeDefaults) -> Handshake {
    let overrides = &config.version;

    let version_word = match (overrides.version, overrides.semver()) {
        (Some(word), _) => word,
        (None, Some(semver)) => pack_semver(semver).unwrap_or_else(|err| {
            debug!(target: "murmur::handshake", error = %err, "using default protocol version");
            defaults.version
        }),
        (None, None) => defaults.version,
    };

    let version = Version {
        version: Some(version_word),
        release: Some(overrides.release().unwrap_or(&defaults.release).to_string()),
        os: Some(overrides.os().unwrap_or(&defaults.os).to_string()),
        os_version: Some(overrides.os_version().unwrap_or(&defaults.os_version).to_string()),
    };

    let authenticate = Authenticate {
        username: Some(config.username.clone()),
        password: Some(config.password.clone()),
        tokens: config.tokens.clone(),
        celt_versions: Vec::new(),
        opus: Some(config.codecs.supports_opus()),
    };

    Handshake {
        version,
        authenticate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::NamedCodec;
    use crate::audio::{CodecRegistry, OPUS_CODEC_ID};
    use crate::config::VersionOverride;
    use std::sync::Arc;

    fn defaults() -> HandshakeDefaults {
        HandshakeDefaults {
            release: "murmur".into(),
            os: "linux".into(),
            os_version: "x86_64".into(),
            version: CLIENT_VERSION,
        }
    }

    fn with_override(version: VersionOverride) -> Handshake {
        let config = Config::new("bot")
            .with_codecs(Arc::new(CodecRegistry::new()))
            .with_version(version);
        build_with(&config, &defaults())
    }

    #[test_timeout::timeout]
    fn no_override_uses_defaults() {
        let handshake = with_override(VersionOverride::default());
        assert_eq!(handshake.version.version, Some(0x0001_0300));
        assert_eq!(handshake.version.release.as_deref(), Some("murmur"));
        assert_eq!(handshake.version.os.as_deref(), Some("linux"));
        assert_eq!(handshake.version.os_version.as_deref(), Some("x86_64"));
    }

    #[test_timeout::timeout]
    fn os_only_override_keeps_other_defaults() {
        let handshake = with_override(VersionOverride {
            os: Some("windows".into()),
            ..Default::default()
        });
        assert_eq!(handshake.version.os.as_deref(), Some("windows"));
        assert_eq!(handshake.version.release.as_deref(), Some("murmur"));
        assert_eq!(handshake.version.os_version.as_deref(), Some("x86_64"));
        assert_eq!(handshake.version.version, Some(CLIENT_VERSION));
    }

    #[test_timeout::timeout]
    fn semver_override_is_packed() {
        let handshake = with_override(VersionOverride {
            semver: Some("1.5.634".into()),
            ..Default::default()
        });
        // patch out of range
        assert_eq!(handshake.version.version, Some(CLIENT_VERSION));

        let handshake = with_override(VersionOverride {
            semver: Some("1.4.0".into()),
            ..Default::default()
        });
        assert_eq!(handshake.version.version, Some(0x0001_0400));
    }

    #[test_timeout::timeout]
    fn invalid_semver_falls_back() {
        for semver in ["1.256.0", "1.3", "one.two.three"] {
            let handshake = with_override(VersionOverride {
                semver: Some(semver.into()),
                ..Default::default()
            });
            assert_eq!(handshake.version.version, Some(CLIENT_VERSION), "{semver}");
        }
    }

    #[test_timeout::timeout]
    fn packed_word_bypasses_validation() {
        let handshake = with_override(VersionOverride {
            semver: Some("9.9.9".into()),
            version: Some(0xDEAD_BEEF),
            ..Default::default()
        });
        assert_eq!(handshake.version.version, Some(0xDEAD_BEEF));
    }

    #[test_timeout::timeout]
    fn authenticate_carries_identity_and_opus_flag() {
        let codecs = Arc::new(CodecRegistry::new());
        let config = Config::new("alice")
            .with_password("secret")
            .with_tokens(["t1", "t2"])
            .with_codecs(Arc::clone(&codecs));

        let auth = build_with(&config, &defaults()).authenticate;
        assert_eq!(auth.username.as_deref(), Some("alice"));
        assert_eq!(auth.password.as_deref(), Some("secret"));
        assert_eq!(auth.tokens, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(auth.opus, Some(false));

        codecs.register(Arc::new(NamedCodec(OPUS_CODEC_ID, "opus")));
        assert_eq!(build_with(&config, &defaults()).authenticate.opus, Some(true));
    }
}
