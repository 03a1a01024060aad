//! Login/session state consulted before fetching login-gated platforms

use crate::platform::PlatformKind;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// External login/session manager
///
/// Passed into every fetch so callers and tests can supply their own state.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn is_online(&self, platform: PlatformKind) -> bool;

    /// Try to establish a session; returns whether the platform is now online
    async fn login(&self, platform: PlatformKind) -> bool;
}

/// No sessions at all; every login attempt fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSessions;

#[async_trait]
impl SessionManager for OfflineSessions {
    async fn is_online(&self, _platform: PlatformKind) -> bool {
        false
    }

    async fn login(&self, _platform: PlatformKind) -> bool {
        false
    }
}

/// Fixed set of online platforms
#[derive(Debug, Default)]
pub struct StaticSessions {
    online: Mutex<HashSet<PlatformKind>>,
    login_succeeds: bool,
}

impl StaticSessions {
    pub fn new(online: impl IntoIterator<Item = PlatformKind>) -> Self {
        Self {
            online: Mutex::new(online.into_iter().collect()),
            login_succeeds: false,
        }
    }

    /// Let `login` bring any platform online
    pub fn with_login(mut self, succeeds: bool) -> Self {
        self.login_succeeds = succeeds;
        self
    }
}

#[async_trait]
impl SessionManager for StaticSessions {
    async fn is_online(&self, platform: PlatformKind) -> bool {
        self.online
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&platform)
    }

    async fn login(&self, platform: PlatformKind) -> bool {
        if self.login_succeeds {
            self.online
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(platform);
        }
        self.login_succeeds
    }
}
