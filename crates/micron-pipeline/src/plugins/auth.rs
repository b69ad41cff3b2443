//! Authentication and role authorization plugin.
//!
//! Methods opt in through two options:
//!
//! - `auth` (default `false`): an active auth session is required;
//! - `role` (string or `null`): an active auth session holding that role is
//!   required. A role implies `auth`.
//!
//! After access was granted, an active auth session has its expiry timer
//! reset, even when the call fails later on.

use super::auth_session;
use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use micron_core::{ConfigExt, MicronError, MicronResult};

/// Option requiring an active auth session.
pub const AUTH_OPTION: &str = "auth";

/// Option requiring a role.
pub const ROLE_OPTION: &str = "role";

/// The auth plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPlugin;

impl AuthPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for AuthPlugin {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY
            .with(Hook::CheckAccess)
            .with(Hook::AfterCheckAccess)
    }

    fn check_access(&self, ctx: &PluginContext) -> MicronResult<()> {
        let session = ctx.session();
        if let Some(role) = ctx.config().string(ROLE_OPTION) {
            if !auth_session::is_active(session) {
                return Err(MicronError::authentication_required());
            }
            if !auth_session::has_role(session, role) {
                return Err(MicronError::authorization_failed());
            }
        } else if ctx.config().flag(AUTH_OPTION, false) && !auth_session::is_active(session) {
            return Err(MicronError::authentication_required());
        }
        Ok(())
    }

    fn after_check_access(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        auth_session::keep_alive(ctx.session());
        Ok(())
    }
}
