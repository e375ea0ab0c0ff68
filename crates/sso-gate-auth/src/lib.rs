#![warn(missing_docs)]
//! # sso-gate-auth
//!
//! ## Purpose
//! Wraps an existing local authenticator with SSO assertion checks and
//! identity synchronization.
//!
//! ## Responsibilities
//! - Define the authentication contract shared by local authenticators and
//!   [`SsoAuthenticator`], so decorators chain.
//! - Drive the external protocol engine through [`ProtocolClient`].
//! - Upsert asserted identities into the local registry via
//!   [`IdentitySynchronizer`].
//! - Publish the fixed UI [`CredentialPolicy`] of SSO mode.
//!
//! ## Data flow
//! [`Authenticator::validate`] connects and authenticates through the
//! protocol engine -> an [`AuthAttempt`] carries the resolved
//! [`IdentityAssertion`] -> [`Authenticator::login`] synchronizes the profile
//! and delegates session creation -> logout tears down the federated session,
//! post-logout releases protocol resources and ends the local session.
//!
//! ## Ownership and lifetimes
//! The decorator holds shared handles (`Arc<dyn ..>`) to externally owned
//! collaborators. Assertion state lives in the per-request [`AuthAttempt`],
//! never on the decorator, so one instance can serve concurrent requests.
//!
//! ## Error model
//! Protocol and identity-resolution failures are folded into a rejected
//! attempt. Registry failures surface as [`AuthError::Registry`]. Delegate
//! results pass through unchanged.
//!
//! ## Security and privacy notes
//! Passwords arrive as [`SecretString`] and are never logged or forwarded to
//! the protocol engine. Protocol error text is passed through
//! [`redact_sensitive`] before logging.
//!
//! ## Example
//! ```rust
//! use sso_gate_auth::{AuthAttempt, CredentialPolicy};
//!
//! let attempt = AuthAttempt::rejected();
//! assert!(!attempt.is_valid());
//! assert!(!CredentialPolicy::SSO.allow_password_change);
//! ```

use std::sync::Arc;

use secrecy::SecretString;
use sso_gate_core::{IdentityAssertion, LocaleDefaults, LoginContext, UserProfile, UserSession};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const MISSING_IDENTITY_DETAIL: &str =
    "could not load user details from the identity provider; check SSO attribute settings";

/// Which credential-entry and profile-edit affordances the host UI should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    /// Offer a "forgot password" link.
    pub show_forgot_password_prompt: bool,
    /// Render a password field on the login form.
    pub show_password_prompt: bool,
    /// Offer "keep me signed in".
    pub show_persist_login_prompt: bool,
    /// Render a username field on the login form.
    pub show_username_prompt: bool,
    /// Let users rename their account.
    pub allow_username_change: bool,
    /// Let users edit their mail address.
    pub allow_email_address_change: bool,
    /// Let users change their local password.
    pub allow_password_change: bool,
    /// Let users edit given/family name.
    pub allow_name_change: bool,
    /// Let users edit their phone number.
    pub allow_phone_change: bool,
    /// Let users edit their organization.
    pub allow_organization_change: bool,
    /// Let users edit their position.
    pub allow_position_change: bool,
}

impl CredentialPolicy {
    /// Policy of a plain local authenticator: everything is editable.
    pub const LOCAL: Self = Self {
        show_forgot_password_prompt: true,
        show_password_prompt: true,
        show_persist_login_prompt: true,
        show_username_prompt: true,
        allow_username_change: true,
        allow_email_address_change: true,
        allow_password_change: true,
        allow_name_change: true,
        allow_phone_change: true,
        allow_organization_change: true,
        allow_position_change: true,
    };

    /// Policy while SSO is active. The identity provider owns every profile
    /// field and there is no local password to recover.
    pub const SSO: Self = Self {
        show_forgot_password_prompt: false,
        show_password_prompt: true,
        show_persist_login_prompt: false,
        show_username_prompt: true,
        allow_username_change: false,
        allow_email_address_change: false,
        allow_password_change: false,
        allow_name_change: false,
        allow_phone_change: false,
        allow_organization_change: false,
        allow_position_change: false,
    };
}

/// Outcome of [`Authenticator::validate`], threaded into
/// [`Authenticator::login`] for the same request.
///
/// An attempt that carries an assertion is always valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthAttempt {
    valid: bool,
    assertion: Option<IdentityAssertion>,
}

impl AuthAttempt {
    /// Failed validation.
    pub fn rejected() -> Self {
        Self::default()
    }

    /// Successful validation without a federated identity (local authenticators).
    pub fn accepted() -> Self {
        Self {
            valid: true,
            assertion: None,
        }
    }

    /// Successful validation backed by an identity-provider assertion.
    pub fn asserted(assertion: IdentityAssertion) -> Self {
        Self {
            valid: true,
            assertion: Some(assertion),
        }
    }

    /// Returns `true` when validation succeeded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the resolved assertion, if any.
    pub fn assertion(&self) -> Option<&IdentityAssertion> {
        self.assertion.as_ref()
    }
}

/// Authentication contract shared by local authenticators and decorators.
pub trait Authenticator: Send + Sync {
    /// Checks credentials for one request.
    fn validate(&self, username: &str, password: &SecretString) -> AuthAttempt;

    /// Establishes a session for `username`.
    ///
    /// # Errors
    /// Implementation defined; decorators pass delegate errors through.
    fn login(
        &self,
        attempt: &AuthAttempt,
        username: &str,
        context: &LoginContext,
    ) -> Result<UserSession, AuthError>;

    /// Ends `session`.
    fn logout(&self, session: &UserSession);

    /// Runs after [`Authenticator::logout`] once the host finished its own
    /// teardown.
    fn post_logout(&self, _session: &UserSession) {}

    /// Returns `true` when the host must not separately verify that the
    /// credentials exist.
    fn are_credentials_known(&self) -> bool {
        false
    }

    /// UI affordances valid for this authenticator.
    fn policy(&self) -> CredentialPolicy {
        CredentialPolicy::LOCAL
    }
}

/// Handle onto the external SSO protocol engine.
///
/// Calls may block on network I/O to the identity provider.
pub trait ProtocolClient: Send + Sync {
    /// Establishes or verifies the session context with the identity provider.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Connection`] on transport or setup failure.
    fn connect(&self) -> Result<(), ProtocolError>;

    /// Checks the presented assertion.
    ///
    /// # Errors
    /// Returns [`ProtocolError`] when the engine cannot reach a verdict.
    fn authenticate(&self) -> Result<bool, ProtocolError>;

    /// Returns the identity of the authenticated subject, if resolvable.
    fn identity(&self) -> Option<IdentityAssertion>;

    /// Terminates the federated session.
    fn terminate(&self, session: &UserSession);

    /// Releases local protocol resources. Must be idempotent.
    fn cleanup(&self);
}

/// Local user registry upsert keyed by username.
pub trait Registry: Send + Sync {
    /// Creates the user when absent, updates mutable profile fields otherwise.
    ///
    /// # Errors
    /// Returns [`RegistryError`] when the upsert cannot be stored.
    fn synchronize(&self, profile: &UserProfile) -> Result<(), RegistryError>;
}

/// Operator-facing diagnostics sink. Fire-and-forget.
pub trait Diagnostics: Send + Sync {
    /// Reports an identity-provider misconfiguration observed while
    /// authenticating `username`.
    fn misconfiguration(&self, username: &str, detail: &str);
}

/// Diagnostics sink backed by `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn misconfiguration(&self, username: &str, detail: &str) {
        error!(username, detail, "identity provider misconfiguration");
    }
}

/// Maps assertions onto registry upserts.
#[derive(Clone)]
pub struct IdentitySynchronizer {
    registry: Arc<dyn Registry>,
    locale: LocaleDefaults,
}

impl IdentitySynchronizer {
    /// Creates a synchronizer writing to `registry` with ambient `locale`.
    pub fn new(registry: Arc<dyn Registry>, locale: LocaleDefaults) -> Self {
        Self { registry, locale }
    }

    /// Builds the profile that [`IdentitySynchronizer::synchronize`] would store.
    pub fn profile_for(&self, username: &str, assertion: &IdentityAssertion) -> UserProfile {
        assertion.to_profile(username, &self.locale)
    }

    /// Upserts the asserted identity under `username`.
    ///
    /// # Errors
    /// Returns [`AuthError::Registry`] when the registry rejects the upsert.
    pub fn synchronize(
        &self,
        username: &str,
        assertion: &IdentityAssertion,
    ) -> Result<(), AuthError> {
        let profile = self.profile_for(username, assertion);
        debug!(
            username,
            profile = %profile.fingerprint(),
            groups = profile.groups.len(),
            "synchronizing sso profile"
        );
        self.registry.synchronize(&profile)?;
        Ok(())
    }
}

/// Authenticator decorator that puts SSO validation and identity
/// synchronization in front of a local authenticator.
#[derive(Clone)]
pub struct SsoAuthenticator {
    delegate: Arc<dyn Authenticator>,
    protocol: Arc<dyn ProtocolClient>,
    synchronizer: IdentitySynchronizer,
    diagnostics: Arc<dyn Diagnostics>,
}

impl SsoAuthenticator {
    /// Creates a decorator around `delegate` reporting through
    /// [`TracingDiagnostics`].
    pub fn new(
        delegate: Arc<dyn Authenticator>,
        protocol: Arc<dyn ProtocolClient>,
        synchronizer: IdentitySynchronizer,
    ) -> Self {
        Self {
            delegate,
            protocol,
            synchronizer,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replaces the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    fn run_protocol(&self, username: &str) -> bool {
        if let Err(error) = self.protocol.connect() {
            warn!(
                username,
                error = %redact_sensitive(&error.to_string()),
                "sso connect failed"
            );
            return false;
        }

        match self.protocol.authenticate() {
            Ok(true) => true,
            Ok(false) => {
                info!(username, "sso assertion rejected");
                false
            }
            Err(error) => {
                warn!(
                    username,
                    error = %redact_sensitive(&error.to_string()),
                    "sso authentication failed"
                );
                false
            }
        }
    }
}

impl Authenticator for SsoAuthenticator {
    fn validate(&self, username: &str, _password: &SecretString) -> AuthAttempt {
        if !self.run_protocol(username) {
            return AuthAttempt::rejected();
        }

        match self.protocol.identity() {
            Some(assertion) => {
                info!(username, asserted = %assertion.username(), "sso assertion accepted");
                AuthAttempt::asserted(assertion)
            }
            None => {
                self.diagnostics.misconfiguration(username, MISSING_IDENTITY_DETAIL);
                AuthAttempt::rejected()
            }
        }
    }

    fn login(
        &self,
        attempt: &AuthAttempt,
        username: &str,
        context: &LoginContext,
    ) -> Result<UserSession, AuthError> {
        let username = effective_username(attempt, username);

        match attempt.assertion() {
            Some(assertion) => self.synchronizer.synchronize(&username, assertion)?,
            None => debug!(
                username = %username,
                "no sso assertion; delegating without synchronization"
            ),
        }

        // The assertion belongs to this decorator's protocol session only.
        let forwarded = if attempt.is_valid() {
            AuthAttempt::accepted()
        } else {
            AuthAttempt::rejected()
        };
        self.delegate.login(&forwarded, &username, context)
    }

    fn logout(&self, session: &UserSession) {
        debug!(session_id = %session.session_id, "terminating federated session");
        self.protocol.terminate(session);
    }

    fn post_logout(&self, session: &UserSession) {
        self.protocol.cleanup();
        self.delegate.logout(session);
    }

    fn are_credentials_known(&self) -> bool {
        true
    }

    fn policy(&self) -> CredentialPolicy {
        CredentialPolicy::SSO
    }
}

/// Resolves the login name: a caller value that is not blank (empty or
/// whitespace-only) wins, otherwise the asserted username, otherwise empty.
pub fn effective_username(attempt: &AuthAttempt, username: &str) -> String {
    if !username.trim().is_empty() {
        return username.to_string();
    }

    attempt
        .assertion()
        .map(|assertion| assertion.username().to_string())
        .unwrap_or_default()
}

const SECRET_MARKERS: [&str; 5] = ["password", "token", "authorization", "bearer", "samlresponse"];

/// Masks the value that follows each secret marker (`password`, `token`,
/// `authorization`, `bearer`, `SAMLResponse`) so protocol error text is safe
/// to log.
///
/// Markers are matched case-insensitively. The value runs from the first
/// character after any `=`, `:`, quote, or space separators up to the next
/// whitespace, `&`, `,`, or `;`. Text around it is kept.
pub fn redact_sensitive(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some((start, marker)) = next_marker(&lower, cursor) {
        let value_start = skip_separators(input, start + marker.len());
        if next_marker(&lower, value_start).is_some_and(|(at, _)| at == value_start) {
            // Chained markers such as `authorization: Bearer <token>`.
            out.push_str(&input[cursor..value_start]);
            cursor = value_start;
            continue;
        }
        let value_end = value_end(input, value_start);
        out.push_str(&input[cursor..value_start]);
        if value_end > value_start {
            out.push_str("<redacted>");
        }
        cursor = value_end;
    }

    out.push_str(&input[cursor..]);
    out
}

fn next_marker(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    SECRET_MARKERS
        .iter()
        .filter_map(|marker| lower[from..].find(marker).map(|at| (from + at, *marker)))
        .min_by_key(|(at, _)| *at)
}

fn skip_separators(input: &str, from: usize) -> usize {
    input[from..]
        .find(|c: char| !matches!(c, '=' | ':' | '"' | '\'' | ' '))
        .map_or(input.len(), |offset| from + offset)
}

fn value_end(input: &str, from: usize) -> usize {
    input[from..]
        .find(|c: char| c.is_whitespace() || matches!(c, '&' | ',' | ';' | '"' | '\''))
        .map_or(input.len(), |offset| from + offset)
}

/// Errors reported by the protocol engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport or configuration failure while reaching the identity provider.
    #[error("connection failure: {0}")]
    Connection(String),
    /// The engine could not process the presented assertion.
    #[error("protocol failure: {0}")]
    Protocol(String),
}

/// Errors reported by the local user registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Backing store failure.
    #[error("storage failure: {0}")]
    Storage(String),
    /// Upsert conflicts with existing data.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced through the authentication contract.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials were rejected.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Profile synchronization failed; login was aborted.
    #[error("registry synchronization failed: {0}")]
    Registry(#[from] RegistryError),
    /// Failure signalled by a wrapped authenticator.
    #[error("delegate authenticator failure: {0}")]
    Delegate(String),
}
