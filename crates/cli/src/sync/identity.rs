// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication context consumed by the sync manager.
//!
//! Sync fails closed: with no current user, nothing is sent.

use std::sync::{Arc, RwLock};

/// Supplies the identity of the signed-in user.
pub trait IdentityProvider: Send + Sync {
    /// Returns the current user id, or `None` when signed out.
    fn current_user_id(&self) -> Option<String>;
}

/// Identity fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        StaticIdentity(user_id.filter(|id| !id.trim().is_empty()))
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn signed_out() -> Self {
        StaticIdentity(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Identity that can change at runtime (login/logout). Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    user_id: Arc<RwLock<Option<String>>>,
}

impl SharedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for SharedIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
