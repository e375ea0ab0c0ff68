#![warn(missing_docs)]
//! # sso-gate binary
//!
//! Prints the effective SSO configuration and the policy flags a host UI
//! should apply while the SSO decorator is active.

use std::process::ExitCode;

use sso_gate_app::{app_version, init_tracing, load_config_from_env, policy_summary};
use sso_gate_auth::CredentialPolicy;
use tracing::error;

/// CLI entry point.
fn main() -> ExitCode {
    init_tracing();

    let config = match load_config_from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load sso-gate configuration");
            return ExitCode::FAILURE;
        }
    };

    println!("sso-gate {}", app_version());
    println!("service_provider={}", config.service_provider);
    println!("default_language={}", config.default_language);
    println!("default_timezone={}", config.default_timezone);
    println!("username_attribute={}", config.attributes.username);
    if let Some(url) = &config.logout_return_url {
        println!("logout_return_url={url}");
    }
    for (flag, value) in policy_summary(CredentialPolicy::SSO) {
        println!("{flag}={value}");
    }

    ExitCode::SUCCESS
}
