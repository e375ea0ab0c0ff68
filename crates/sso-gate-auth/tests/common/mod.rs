//! Shared recording fakes for decorator integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use sso_gate_auth::{
    AuthAttempt, AuthError, Authenticator, Diagnostics, IdentitySynchronizer, ProtocolClient,
    ProtocolError, Registry, RegistryError, SsoAuthenticator,
};
use sso_gate_core::{IdentityAssertion, LocaleDefaults, LoginContext, UserProfile, UserSession};

/// Ordered record of every collaborator call.
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().expect("call log lock should work").push(entry.into());
}

/// How the fake protocol engine behaves.
pub enum ProtocolSetup {
    /// Authenticates and returns the given identity.
    Accept(Option<IdentityAssertion>),
    /// Authenticates with a negative verdict.
    Reject,
    /// `authenticate` fails with a transport error.
    AuthenticateError,
    /// `connect` fails.
    ConnectError,
}

/// Fake protocol engine.
pub struct FakeProtocol {
    log: CallLog,
    setup: ProtocolSetup,
}

impl ProtocolClient for FakeProtocol {
    fn connect(&self) -> Result<(), ProtocolError> {
        record(&self.log, "protocol.connect");
        match self.setup {
            ProtocolSetup::ConnectError => {
                Err(ProtocolError::Connection("idp unreachable".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn authenticate(&self) -> Result<bool, ProtocolError> {
        record(&self.log, "protocol.authenticate");
        match self.setup {
            ProtocolSetup::Accept(_) => Ok(true),
            ProtocolSetup::Reject => Ok(false),
            ProtocolSetup::AuthenticateError | ProtocolSetup::ConnectError => Err(
                ProtocolError::Connection("connection reset by identity provider".to_string()),
            ),
        }
    }

    fn identity(&self) -> Option<IdentityAssertion> {
        record(&self.log, "protocol.identity");
        match &self.setup {
            ProtocolSetup::Accept(identity) => identity.clone(),
            _ => None,
        }
    }

    fn terminate(&self, session: &UserSession) {
        record(&self.log, format!("protocol.terminate:{}", session.session_id));
    }

    fn cleanup(&self) {
        record(&self.log, "protocol.cleanup");
    }
}

/// Fake registry capturing upserted profiles.
pub struct FakeRegistry {
    log: CallLog,
    failure: Option<RegistryError>,
    profiles: Mutex<Vec<UserProfile>>,
}

impl FakeRegistry {
    /// Profiles received so far.
    pub fn profiles(&self) -> Vec<UserProfile> {
        self.profiles.lock().expect("profiles lock should work").clone()
    }
}

impl Registry for FakeRegistry {
    fn synchronize(&self, profile: &UserProfile) -> Result<(), RegistryError> {
        record(&self.log, format!("registry.synchronize:{}", profile.username));
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.profiles
            .lock()
            .expect("profiles lock should work")
            .push(profile.clone());
        Ok(())
    }
}

/// Fake local authenticator.
pub struct FakeDelegate {
    log: CallLog,
    failure: Option<String>,
    contexts: Mutex<Vec<LoginContext>>,
}

impl FakeDelegate {
    /// Login contexts received so far.
    pub fn contexts(&self) -> Vec<LoginContext> {
        self.contexts.lock().expect("contexts lock should work").clone()
    }
}

impl Authenticator for FakeDelegate {
    fn validate(&self, username: &str, _password: &SecretString) -> AuthAttempt {
        record(&self.log, format!("delegate.validate:{username}"));
        AuthAttempt::accepted()
    }

    fn login(
        &self,
        _attempt: &AuthAttempt,
        username: &str,
        context: &LoginContext,
    ) -> Result<UserSession, AuthError> {
        record(&self.log, format!("delegate.login:{username}"));
        self.contexts
            .lock()
            .expect("contexts lock should work")
            .push(context.clone());
        match &self.failure {
            Some(message) => Err(AuthError::Delegate(message.clone())),
            None => Ok(UserSession::new(format!("session-{username}"), username)),
        }
    }

    fn logout(&self, session: &UserSession) {
        record(&self.log, format!("delegate.logout:{}", session.session_id));
    }
}

/// Diagnostics sink counting misconfiguration reports.
#[derive(Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    /// Usernames reported so far.
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().expect("reports lock should work").clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn misconfiguration(&self, username: &str, _detail: &str) {
        self.reports
            .lock()
            .expect("reports lock should work")
            .push(username.to_string());
    }
}

/// Decorator wired to recording fakes.
pub struct Harness {
    /// Shared ordered call log.
    pub log: CallLog,
    /// Registry fake.
    pub registry: Arc<FakeRegistry>,
    /// Delegate fake.
    pub delegate: Arc<FakeDelegate>,
    /// Diagnostics fake.
    pub diagnostics: Arc<RecordingDiagnostics>,
    /// Decorator under test.
    pub auth: SsoAuthenticator,
}

impl Harness {
    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().expect("call log lock should work").clone()
    }

    /// Calls whose name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }
}

/// Builds a harness with healthy registry and delegate.
pub fn harness(setup: ProtocolSetup) -> Harness {
    harness_with(setup, None, None)
}

/// Builds a harness with optional registry and delegate failures.
pub fn harness_with(
    setup: ProtocolSetup,
    registry_failure: Option<RegistryError>,
    delegate_failure: Option<String>,
) -> Harness {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let protocol = Arc::new(FakeProtocol {
        log: Arc::clone(&log),
        setup,
    });
    let registry = Arc::new(FakeRegistry {
        log: Arc::clone(&log),
        failure: registry_failure,
        profiles: Mutex::new(Vec::new()),
    });
    let delegate = Arc::new(FakeDelegate {
        log: Arc::clone(&log),
        failure: delegate_failure,
        contexts: Mutex::new(Vec::new()),
    });
    let diagnostics = Arc::new(RecordingDiagnostics::default());

    let synchronizer = IdentitySynchronizer::new(registry.clone(), test_locale());
    let auth = SsoAuthenticator::new(delegate.clone(), protocol, synchronizer)
        .with_diagnostics(diagnostics.clone());

    Harness {
        log,
        registry,
        delegate,
        diagnostics,
        auth,
    }
}

/// Locale applied by the harness synchronizer.
pub fn test_locale() -> LocaleDefaults {
    LocaleDefaults {
        language: "en_us".to_string(),
        timezone: "America/Chicago".to_string(),
    }
}

/// Fully populated assertion for `jdoe`.
pub fn jdoe_assertion() -> IdentityAssertion {
    IdentityAssertion::new("jdoe")
        .expect("assertion fixture should build")
        .with_email("jdoe@x.org")
        .with_name("Jane", "Doe")
        .with_phone("555")
        .with_institution("ACME")
        .with_title("Eng")
        .with_groups(["staff"])
}

/// Wraps a raw password.
pub fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}
