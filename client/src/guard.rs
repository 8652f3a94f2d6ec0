// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Route guards. A guard never fails: every navigation attempt is either
//! allowed or redirected.

use crate::navigator::{HOME_PATH, Navigator, login_redirect};
use crate::session::{Session, SessionState};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

pub trait RouteGuard {
    fn can_activate(&self, target: &str) -> GuardDecision;
}

/// Protected views: any signed-in user.
pub struct AuthGuard {
    session: Session,
}

impl AuthGuard {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl RouteGuard for AuthGuard {
    fn can_activate(&self, target: &str) -> GuardDecision {
        if self.session.is_authenticated() {
            GuardDecision::Allow
        } else {
            debug!("No credential for {}, redirecting to login.", target);
            GuardDecision::Redirect(login_redirect(target))
        }
    }
}

/// Admin-only views. Signed-in users without the admin role are sent home,
/// not to the login view.
pub struct AdminGuard {
    session: Session,
}

impl AdminGuard {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl RouteGuard for AdminGuard {
    fn can_activate(&self, target: &str) -> GuardDecision {
        match self.session.state() {
            SessionState::AuthenticatedAdmin => GuardDecision::Allow,
            SessionState::AuthenticatedNonAdmin => {
                debug!("{} requires the admin role, redirecting home.", target);
                GuardDecision::Redirect(HOME_PATH.to_string())
            }
            SessionState::Unauthenticated => GuardDecision::Redirect(login_redirect(target)),
        }
    }
}

/// Runs `guard` for `target` and moves `navigator` to wherever it decides.
/// Returns whether the target was reached.
pub fn navigate_guarded(guard: &dyn RouteGuard, navigator: &dyn Navigator, target: &str) -> bool {
    match guard.can_activate(target) {
        GuardDecision::Allow => {
            navigator.navigate(target);
            true
        }
        GuardDecision::Redirect(to) => {
            navigator.navigate(&to);
            false
        }
    }
}
