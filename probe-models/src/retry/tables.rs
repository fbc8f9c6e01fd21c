//! Built-in retry tables for known providers.

use super::{DEFAULT_EXCLUDED_STATUSES, RetryClassifier};
use crate::{ErrorKind, ProviderError};

/// Declarative retry classification for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTable {
    /// Provider name.
    pub name: &'static str,
    /// Error kinds that are always transient.
    pub transient_kinds: &'static [ErrorKind],
    /// Client error classes that are always transient.
    pub transient_classes: &'static [&'static str],
    /// 5xx statuses treated as permanent.
    pub excluded_statuses: &'static [u16],
    /// Client error classes the provider's own retry helper treats as transient.
    pub flagged_classes: &'static [&'static str],
    /// Provider error codes that signal a transient condition.
    pub flagged_codes: &'static [&'static str],
}

const NETWORK: &[ErrorKind] = &[ErrorKind::Timeout, ErrorKind::Connection];

pub const OPENAI: ProviderTable = ProviderTable {
    name: "openai",
    transient_kinds: NETWORK,
    transient_classes: &["APITimeoutError", "APIConnectionError"],
    excluded_statuses: DEFAULT_EXCLUDED_STATUSES,
    flagged_classes: &[],
    flagged_codes: &["rate_limit_exceeded", "server_error"],
};

pub const ANTHROPIC: ProviderTable = ProviderTable {
    name: "anthropic",
    transient_kinds: NETWORK,
    transient_classes: &["APITimeoutError", "APIConnectionError", "OverloadedError"],
    excluded_statuses: DEFAULT_EXCLUDED_STATUSES,
    flagged_classes: &[],
    flagged_codes: &["overloaded_error", "rate_limit_error", "api_error"],
};

pub const GOOGLE: ProviderTable = ProviderTable {
    name: "google",
    transient_kinds: NETWORK,
    transient_classes: &["Aborted", "DeadlineExceeded", "ServiceUnavailable"],
    excluded_statuses: DEFAULT_EXCLUDED_STATUSES,
    flagged_classes: &[
        "InternalServerError",
        "TooManyRequests",
        "ConnectionError",
        "ChunkedEncodingError",
        "TransportError",
    ],
    flagged_codes: &["UNAVAILABLE", "RESOURCE_EXHAUSTED", "INTERNAL"],
};

pub const MISTRAL: ProviderTable = ProviderTable {
    name: "mistral",
    transient_kinds: NETWORK,
    transient_classes: &[
        "ReadTimeout",
        "ConnectTimeout",
        "ConnectError",
        "RemoteProtocolError",
    ],
    excluded_statuses: DEFAULT_EXCLUDED_STATUSES,
    flagged_classes: &[],
    flagged_codes: &[],
};

/// Fallback for providers without a dedicated table.
pub const HTTP: ProviderTable = ProviderTable {
    name: "http",
    transient_kinds: NETWORK,
    transient_classes: &["TimeoutError", "ConnectionError"],
    excluded_statuses: DEFAULT_EXCLUDED_STATUSES,
    flagged_classes: &[],
    flagged_codes: &[],
};

impl RetryClassifier for ProviderTable {
    fn name(&self) -> &str {
        self.name
    }

    fn is_transient_category(&self, err: &ProviderError) -> bool {
        self.transient_kinds.contains(&err.kind)
            || self.transient_classes.contains(&err.class.as_str())
    }

    fn excluded_statuses(&self) -> &[u16] {
        self.excluded_statuses
    }

    fn is_flagged_transient(&self, err: &ProviderError) -> bool {
        self.flagged_classes.contains(&err.class.as_str())
            || err
                .code
                .as_deref()
                .is_some_and(|code| self.flagged_codes.contains(&code))
    }
}

/// Look up the built-in classifier for a provider or `provider/model` name.
///
/// Unknown providers get the generic [`HTTP`] table.
pub fn classifier_for(name: &str) -> &'static ProviderTable {
    let provider = name.split('/').next().unwrap_or(name);
    match provider {
        "openai" | "azureai" | "openai-api" | "together" | "groq" => &OPENAI,
        "anthropic" => &ANTHROPIC,
        "google" | "vertex" | "gemini" => &GOOGLE,
        "mistral" => &MISTRAL,
        _ => &HTTP,
    }
}
