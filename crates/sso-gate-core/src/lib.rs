#![warn(missing_docs)]
//! # sso-gate-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `sso-gate` workspace.
//!
//! ## Responsibilities
//! - Represent the identity asserted by the SSO identity provider.
//! - Map raw identity-provider attributes onto that identity.
//! - Build the canonical profile record handed to the local user registry.
//! - Load and validate plugin configuration.
//!
//! ## Data flow
//! The protocol engine releases an attribute bag -> [`IdentityAssertion`] is
//! built through [`AttributeMapping`] -> the auth layer combines it with
//! [`LocaleDefaults`] into a [`UserProfile`] for registry synchronization.
//!
//! ## Ownership and lifetimes
//! All records own their strings so assertions can travel inside per-request
//! attempt objects without borrowing from protocol engine buffers.
//!
//! ## Error model
//! Missing mandatory attributes, invalid configuration, and JSON codec failures
//! are reported as [`CoreError`] variants.
//!
//! ## Security and privacy notes
//! Profiles never carry a local password: SSO users have none. Use
//! [`UserProfile::fingerprint`] instead of profile fields when logging.
//!
//! ## Example
//! ```rust
//! use sso_gate_core::{IdentityAssertion, LocaleDefaults};
//!
//! let assertion = IdentityAssertion::new("jdoe")
//!     .unwrap()
//!     .with_email("jdoe@x.org")
//!     .with_groups(["staff"]);
//! let profile = assertion.to_profile("jdoe", &LocaleDefaults::default());
//! assert_eq!(profile.email, "jdoe@x.org");
//! assert!(profile.password.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

/// Language used for synchronized users when configuration is silent.
pub const DEFAULT_LANGUAGE: &str = "en_us";

/// Timezone used for synchronized users when configuration is silent.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Service provider entry used by the protocol engine by default.
pub const DEFAULT_SERVICE_PROVIDER: &str = "default-sp";

/// Identity resolved by the protocol engine after a successful assertion check.
///
/// Either absent (`Option::None` at call sites) or fully populated. Fields are
/// private: every value goes through [`IdentityAssertion::new`],
/// [`IdentityAssertion::from_attributes`], or deserialization, all of which
/// reject a blank username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AssertionRecord")]
pub struct IdentityAssertion {
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    institution: String,
    title: String,
    groups: Vec<String>,
}

/// Unchecked wire shape of [`IdentityAssertion`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AssertionRecord {
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    institution: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    groups: Vec<String>,
}

impl TryFrom<AssertionRecord> for IdentityAssertion {
    type Error = CoreError;

    fn try_from(record: AssertionRecord) -> Result<Self, Self::Error> {
        Ok(Self::new(record.username)?
            .with_email(record.email)
            .with_name(record.first_name, record.last_name)
            .with_phone(record.phone)
            .with_institution(record.institution)
            .with_title(record.title)
            .with_groups(record.groups))
    }
}

impl IdentityAssertion {
    /// Creates an assertion for `username` with empty optional attributes.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingAttribute`] when `username` is blank.
    pub fn new(username: impl Into<String>) -> Result<Self, CoreError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(CoreError::MissingAttribute("username".to_string()));
        }

        Ok(Self {
            username,
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            institution: String::new(),
            title: String::new(),
            groups: Vec::new(),
        })
    }

    /// Canonical account name. Never blank.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Mail address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Given name.
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Family name.
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Phone number.
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Institution or organization.
    pub fn institution(&self) -> &str {
        &self.institution
    }

    /// Position/title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Group memberships in provider order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Sets the mail address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets given and family name.
    pub fn with_name(
        mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Sets the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    /// Sets institution/organization.
    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    /// Sets the position title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Replaces group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Builds an assertion from the attribute bag released by the identity
    /// provider.
    ///
    /// # Semantics
    /// Scalar fields take the first value of their mapped attribute; absent
    /// attributes resolve to empty strings. Groups take every non-blank value of
    /// the groups attribute, in provider order.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingAttribute`] naming the username attribute when
    /// it is absent or blank.
    pub fn from_attributes(
        attributes: &BTreeMap<String, Vec<String>>,
        mapping: &AttributeMapping,
    ) -> Result<Self, CoreError> {
        let first = |name: &String| first_value(attributes, name);

        let assertion = Self::new(first(&mapping.username))
            .map_err(|_| CoreError::MissingAttribute(mapping.username.clone()))?;

        let groups = mapping
            .groups
            .as_deref()
            .and_then(|name| attributes.get(name))
            .map(|values| {
                values
                    .iter()
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(assertion
            .with_email(first(&mapping.email))
            .with_name(first(&mapping.first_name), first(&mapping.last_name))
            .with_phone(first(&mapping.phone))
            .with_institution(first(&mapping.institution))
            .with_title(first(&mapping.title))
            .with_groups(groups))
    }

    /// Builds the registry profile for this identity under `username`.
    ///
    /// `username` is passed separately because an explicit caller-supplied
    /// login name overrides the asserted one.
    pub fn to_profile(&self, username: &str, locale: &LocaleDefaults) -> UserProfile {
        UserProfile {
            username: username.to_string(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            password: None,
            language: locale.language.clone(),
            timezone: locale.timezone.clone(),
            phone: self.phone.clone(),
            institution: self.institution.clone(),
            title: self.title.clone(),
            groups: self.groups.clone(),
        }
    }
}

/// Canonical registration record used for registry upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Upsert key.
    pub username: String,
    /// Mail address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Local password placeholder. `None` means "no local credential".
    pub password: Option<String>,
    /// Preferred language.
    pub language: String,
    /// Preferred timezone.
    pub timezone: String,
    /// Phone number.
    pub phone: String,
    /// Institution or organization.
    pub institution: String,
    /// Position/title.
    pub title: String,
    /// Group memberships.
    pub groups: Vec<String>,
}

impl UserProfile {
    /// Serializes the profile to compact JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(CoreError::Codec)
    }

    /// Deserializes a profile from JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON decoding fails.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(raw).map_err(CoreError::Codec)
    }

    /// Returns a stable SHA-256 hex digest of the profile fields.
    ///
    /// The password placeholder does not take part in the digest.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.username,
            &self.email,
            &self.first_name,
            &self.last_name,
            &self.language,
            &self.timezone,
            &self.phone,
            &self.institution,
            &self.title,
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        for group in &self.groups {
            hasher.update(group.as_bytes());
            hasher.update([1u8]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Caller data forwarded untouched to the wrapped authenticator on login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginContext {
    /// Whether the user asked to stay signed in.
    pub persist_login: bool,
    /// Language picked on the login form, if any.
    pub language: Option<String>,
    /// Remote address of the client, if known.
    pub client_address: Option<String>,
}

/// Session handle produced by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    /// Host-assigned session identifier.
    pub session_id: String,
    /// Local account name bound to the session.
    pub username: String,
}

impl UserSession {
    /// Creates a session handle.
    pub fn new(session_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            username: username.into(),
        }
    }
}

/// Ambient language/timezone applied to synchronized profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleDefaults {
    /// Language code.
    pub language: String,
    /// IANA timezone name.
    pub timezone: String,
}

impl Default for LocaleDefaults {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Identity-provider attribute names per identity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributeMapping {
    /// Attribute carrying the account name.
    pub username: String,
    /// Attribute carrying the mail address.
    pub email: String,
    /// Attribute carrying the given name.
    pub first_name: String,
    /// Attribute carrying the family name.
    pub last_name: String,
    /// Attribute carrying the phone number.
    pub phone: String,
    /// Attribute carrying the institution.
    pub institution: String,
    /// Attribute carrying the title.
    pub title: String,
    /// Attribute carrying group memberships, if released at all.
    pub groups: Option<String>,
}

impl Default for AttributeMapping {
    fn default() -> Self {
        Self {
            username: "sAMAccountName".to_string(),
            email: "mail".to_string(),
            first_name: "givenName".to_string(),
            last_name: "sn".to_string(),
            phone: "telephoneNumber".to_string(),
            institution: "department".to_string(),
            title: "title".to_string(),
            groups: Some("groups".to_string()),
        }
    }
}

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SsoConfig {
    /// Language applied to synchronized users.
    pub default_language: String,
    /// Timezone applied to synchronized users.
    pub default_timezone: String,
    /// Service provider entry the protocol engine authenticates against.
    pub service_provider: String,
    /// Where the identity provider sends the browser after federated logout.
    pub logout_return_url: Option<String>,
    /// Attribute names released by the identity provider.
    pub attributes: AttributeMapping,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            service_provider: DEFAULT_SERVICE_PROVIDER.to_string(),
            logout_return_url: None,
            attributes: AttributeMapping::default(),
        }
    }
}

impl SsoConfig {
    /// Parses and validates configuration from JSON text.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] for malformed JSON or unknown keys and
    /// [`CoreError::InvalidConfig`] when [`SsoConfig::validate`] fails.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(raw).map_err(CoreError::Codec)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] for blank locale/provider values, a
    /// blank username attribute, or a logout URL that is not absolute http(s).
    pub fn validate(&self) -> Result<(), CoreError> {
        for (key, value) in [
            ("default_language", &self.default_language),
            ("default_timezone", &self.default_timezone),
            ("service_provider", &self.service_provider),
            ("attributes.username", &self.attributes.username),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::InvalidConfig(format!("{key} must be non-empty")));
            }
        }

        if let Some(raw) = &self.logout_return_url {
            validate_return_url(raw)?;
        }

        Ok(())
    }

    /// Returns the locale pair applied during synchronization.
    pub fn locale_defaults(&self) -> LocaleDefaults {
        LocaleDefaults {
            language: self.default_language.clone(),
            timezone: self.default_timezone.clone(),
        }
    }
}

fn first_value(attributes: &BTreeMap<String, Vec<String>>, name: &str) -> String {
    attributes
        .get(name)
        .and_then(|values| values.first())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn validate_return_url(raw: &str) -> Result<(), CoreError> {
    let parsed = Url::parse(raw)
        .map_err(|error| CoreError::InvalidConfig(format!("invalid logout_return_url: {error}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CoreError::InvalidConfig(format!(
            "logout_return_url must use http or https, got {other}"
        ))),
    }
}

/// Error type for core model validation, config, and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A mandatory identity attribute was absent or blank.
    #[error("missing identity attribute: {0}")]
    MissingAttribute(String),
    /// Configuration violated a value constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// JSON encoding/decoding error.
    #[error("codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}
