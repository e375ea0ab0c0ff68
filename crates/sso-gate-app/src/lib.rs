#![warn(missing_docs)]
//! # sso-gate-app
//!
//! ## Purpose
//! Host-facing glue for `sso-gate`: the sign-in/sign-out sequences a login
//! controller runs, plus configuration loading and logging setup.
//!
//! ## Responsibilities
//! - Run validate -> login as one sign-in step.
//! - Run logout -> post-logout as one sign-out step.
//! - Load [`SsoConfig`] from the file named by `SSO_GATE_CONFIG`.
//! - Build the SSO decorator from that configuration.
//! - Install the `tracing` subscriber for the binary.
//!
//! ## Data flow
//! Login form -> [`sign_in`] -> [`Authenticator::validate`] ->
//! [`Authenticator::login`] -> [`UserSession`]. Logout link -> [`sign_out`].
//!
//! ## Ownership and lifetimes
//! Authenticators are borrowed as trait objects; the host owns them and any
//! per-request state lives in the attempt created inside [`sign_in`].
//!
//! ## Error model
//! Rejected attempts become [`AuthError::InvalidCredentials`] regardless of
//! cause. Registry, delegate, config, and I/O failures are wrapped in
//! [`AppError`].
//!
//! ## Security and privacy notes
//! Passwords stay inside [`SecretString`]. Use [`redact_sensitive`] on any
//! free-form text before it reaches logs.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use sso_gate_auth::{
    AuthError, Authenticator, CredentialPolicy, IdentitySynchronizer, ProtocolClient, Registry,
    SsoAuthenticator,
};
use sso_gate_core::{CoreError, LoginContext, SsoConfig, UserSession};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub use sso_gate_auth::redact_sensitive;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SSO_GATE_VERSION");

/// Environment variable naming the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "SSO_GATE_CONFIG";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Wraps `delegate` in an SSO decorator whose synchronizer applies the
/// configured default language and timezone.
pub fn sso_authenticator(
    config: &SsoConfig,
    delegate: Arc<dyn Authenticator>,
    protocol: Arc<dyn ProtocolClient>,
    registry: Arc<dyn Registry>,
) -> SsoAuthenticator {
    let locale = config.locale_defaults();
    debug!(
        service_provider = %config.service_provider,
        language = %locale.language,
        timezone = %locale.timezone,
        "building sso authenticator"
    );
    SsoAuthenticator::new(delegate, protocol, IdentitySynchronizer::new(registry, locale))
}

/// Validates and logs in within one call.
///
/// # Errors
/// Returns [`AuthError::InvalidCredentials`] (wrapped) for any rejected
/// attempt, whatever the underlying cause. Login failures pass through.
pub fn sign_in(
    auth: &dyn Authenticator,
    username: &str,
    password: &SecretString,
    context: &LoginContext,
) -> Result<UserSession, AppError> {
    let attempt = auth.validate(username, password);
    if !attempt.is_valid() {
        info!(username, "sign-in rejected");
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let session = auth.login(&attempt, username, context)?;
    info!(username = %session.username, session_id = %session.session_id, "signed in");
    Ok(session)
}

/// Ends `session`: federated logout first, then post-logout cleanup.
///
/// Hosts should always go through this helper so both steps run, in order.
pub fn sign_out(auth: &dyn Authenticator, session: &UserSession) {
    auth.logout(session);
    auth.post_logout(session);
    info!(session_id = %session.session_id, "signed out");
}

/// Loads and validates configuration from a JSON file.
///
/// # Errors
/// Returns [`AppError::Io`] when the file cannot be read and
/// [`AppError::Config`] when parsing or validation fails.
pub fn load_config(path: &Path) -> Result<SsoConfig, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(SsoConfig::from_json_str(&raw)?)
}

/// Loads configuration from the file named by [`CONFIG_ENV_VAR`].
///
/// Semantics:
/// - Unset or blank => [`SsoConfig::default`].
/// - Any other value => path passed to [`load_config`].
///
/// # Errors
/// Propagates [`load_config`] failures.
pub fn load_config_from_env() -> Result<SsoConfig, AppError> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => load_config(Path::new(value.trim())),
        _ => Ok(SsoConfig::default()),
    }
}

/// Installs a formatting subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Flattens a policy into `(flag name, value)` pairs for display.
pub fn policy_summary(policy: CredentialPolicy) -> Vec<(&'static str, bool)> {
    vec![
        ("show_forgot_password_prompt", policy.show_forgot_password_prompt),
        ("show_password_prompt", policy.show_password_prompt),
        ("show_persist_login_prompt", policy.show_persist_login_prompt),
        ("show_username_prompt", policy.show_username_prompt),
        ("allow_username_change", policy.allow_username_change),
        ("allow_email_address_change", policy.allow_email_address_change),
        ("allow_password_change", policy.allow_password_change),
        ("allow_name_change", policy.allow_name_change),
        ("allow_phone_change", policy.allow_phone_change),
        ("allow_organization_change", policy.allow_organization_change),
        ("allow_position_change", policy.allow_position_change),
    ]
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication contract error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Configuration parse/validation error.
    #[error("config error: {0}")]
    Config(#[from] CoreError),
    /// Configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
