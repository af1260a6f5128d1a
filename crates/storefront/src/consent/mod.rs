//! Cookie consent gate.
//!
//! Decides whether third-party, cookie-setting scripts (payment SDKs, the
//! bot-verification widget) may be delivered at all. While a category is
//! blocked the checkout renders a consent-request affordance instead of the
//! real control, and no script URL for that category leaves the server.
//!
//! Preferences live in two cookies readable before any script executes:
//! `cookie_consent` holds the overall decision, `cookie_preferences` the
//! granted categories as a comma-separated list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use atelier_core::ConsentCategory;

use crate::payments::ProviderKind;

/// Cookie holding the buyer's overall consent decision.
pub const CONSENT_COOKIE: &str = "cookie_consent";

/// Cookie holding the granted categories.
pub const PREFERENCES_COOKIE: &str = "cookie_preferences";

/// Consent cookie lifetime in seconds (180 days).
const CONSENT_MAX_AGE: u64 = 180 * 24 * 60 * 60;

/// First-party cookie prefixes owned by each revocable category.
///
/// Revoking a category actively deletes every request cookie matching one
/// of its prefixes.
const FIRST_PARTY_PREFIXES: &[(ConsentCategory, &[&str])] = &[
    (ConsentCategory::Functional, &["atelier_prefs", "__stripe"]),
    (ConsentCategory::Analytics, &["_ga", "_gid", "_gat"]),
    (ConsentCategory::Targeting, &["_fbp", "_gcl", "_ttp"]),
];

/// Third-party cookies known per category that this document cannot touch.
///
/// These live on provider domains; revocation can only log them and signal
/// the provider SDK's own consent API.
const THIRD_PARTY_COOKIES: &[(ConsentCategory, &[&str])] = &[
    (ConsentCategory::Targeting, &["ts_c", "enforce_policy", "checkout-session"]),
];

/// Overall decision recorded in the consent banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    /// Everything granted.
    All,
    /// Per-category selection; see the preferences.
    Selected,
    /// Only the necessary category.
    Necessary,
}

/// The buyer's per-category consent record.
///
/// `necessary` is not stored - it is always granted and irrevocable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsentPreferences {
    pub functional: bool,
    pub analytics: bool,
    pub targeting: bool,
}

impl ConsentPreferences {
    /// Everything granted.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            functional: true,
            analytics: true,
            targeting: true,
        }
    }

    /// Only the necessary category (the default for a fresh visitor).
    #[must_use]
    pub const fn necessary_only() -> Self {
        Self {
            functional: false,
            analytics: false,
            targeting: false,
        }
    }

    /// Whether a category is granted.
    #[must_use]
    pub const fn granted(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => true,
            ConsentCategory::Functional => self.functional,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Targeting => self.targeting,
        }
    }

    /// Granted categories, in canonical order.
    #[must_use]
    pub fn granted_categories(&self) -> Vec<ConsentCategory> {
        ConsentCategory::ALL
            .into_iter()
            .filter(|c| self.granted(*c))
            .collect()
    }

    /// Set one category. Granting or revoking `necessary` is a no-op.
    pub const fn set(&mut self, category: ConsentCategory, granted: bool) {
        match category {
            ConsentCategory::Necessary => {}
            ConsentCategory::Functional => self.functional = granted,
            ConsentCategory::Analytics => self.analytics = granted,
            ConsentCategory::Targeting => self.targeting = granted,
        }
    }

    /// Parse the preferences out of a `Cookie` request header.
    ///
    /// Absent or unparseable cookies fall back to necessary-only: consent is
    /// opt-in, so the failure mode is always "blocked".
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Self {
        let Some(value) = cookie_value(header, PREFERENCES_COOKIE) else {
            return Self::necessary_only();
        };

        let mut prefs = Self::necessary_only();
        for part in value.split(',') {
            if let Ok(category) = part.trim().parse::<ConsentCategory>() {
                prefs.set(category, true);
            }
        }
        prefs
    }

    /// Serialize into the preferences cookie value.
    #[must_use]
    pub fn to_cookie_value(&self) -> String {
        self.granted_categories()
            .iter()
            .map(ConsentCategory::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `Set-Cookie` headers persisting this record (decision + preferences).
    #[must_use]
    pub fn to_set_cookies(&self, decision: ConsentDecision, secure: bool) -> Vec<String> {
        let decision_value = match decision {
            ConsentDecision::All => "all",
            ConsentDecision::Selected => "selected",
            ConsentDecision::Necessary => "necessary",
        };
        let suffix = if secure { "; Secure" } else { "" };
        vec![
            format!(
                "{CONSENT_COOKIE}={decision_value}; Path=/; Max-Age={CONSENT_MAX_AGE}; SameSite=Lax{suffix}"
            ),
            format!(
                "{PREFERENCES_COOKIE}={}; Path=/; Max-Age={CONSENT_MAX_AGE}; SameSite=Lax{suffix}",
                self.to_cookie_value()
            ),
        ]
    }
}

/// Gate verdict for one script category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Allowed,
    Blocked,
}

/// The consent gate: preferences applied to script categories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentGate {
    prefs: ConsentPreferences,
}

impl ConsentGate {
    /// Build a gate over a consent record.
    #[must_use]
    pub const fn new(prefs: ConsentPreferences) -> Self {
        Self { prefs }
    }

    /// The underlying preferences.
    #[must_use]
    pub const fn preferences(&self) -> &ConsentPreferences {
        &self.prefs
    }

    /// Verdict for a category.
    #[must_use]
    pub const fn decide(&self, category: ConsentCategory) -> GateState {
        if self.prefs.granted(category) {
            GateState::Allowed
        } else {
            GateState::Blocked
        }
    }

    /// Guard an operation on a category.
    ///
    /// # Errors
    ///
    /// Returns the blocked category so callers can map it to a
    /// consent-required response with a grant path.
    pub const fn require(&self, category: ConsentCategory) -> Result<(), ConsentCategory> {
        match self.decide(category) {
            GateState::Allowed => Ok(()),
            GateState::Blocked => Err(category),
        }
    }
}

// =============================================================================
// Idempotent Script Activation
// =============================================================================

/// Tracks which script URLs have already been activated, so a re-entrant
/// consent grant never injects a second copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptRegistry {
    loaded: HashSet<String>,
}

impl ScriptRegistry {
    /// Record an activation. Returns `true` the first time a URL is seen,
    /// `false` on every repeat.
    pub fn activate(&mut self, url: &str) -> bool {
        self.loaded.insert(url.to_string())
    }

    /// Whether a URL has been activated.
    #[must_use]
    pub fn is_active(&self, url: &str) -> bool {
        self.loaded.contains(url)
    }
}

// =============================================================================
// Revocation
// =============================================================================

/// Everything a revocation produces: cookies to delete, cookies we cannot
/// touch, and provider SDKs whose consent APIs should be signaled.
#[derive(Debug, Clone, Serialize)]
pub struct RevocationPlan {
    /// `Set-Cookie` headers expiring matched first-party cookies.
    pub delete_cookies: Vec<String>,
    /// Third-party cookie names outside document control.
    pub unmanageable: Vec<&'static str>,
    /// Provider SDKs to send a revocation signal to.
    pub provider_signals: Vec<ProviderKind>,
}

/// Build the revocation plan for a category.
///
/// First-party cookies present on the request are matched by enumerated
/// prefix and expired; known third-party cookies are logged as
/// unmanageable. Revoking `necessary` yields an empty plan.
#[must_use]
pub fn revoke(category: ConsentCategory, cookie_header: &str, secure: bool) -> RevocationPlan {
    if category.is_always_granted() {
        return RevocationPlan {
            delete_cookies: Vec::new(),
            unmanageable: Vec::new(),
            provider_signals: Vec::new(),
        };
    }

    let prefixes = FIRST_PARTY_PREFIXES
        .iter()
        .find(|(c, _)| *c == category)
        .map_or(&[][..], |(_, p)| *p);

    let suffix = if secure { "; Secure" } else { "" };
    let delete_cookies = request_cookie_names(cookie_header)
        .filter(|name| prefixes.iter().any(|prefix| name.starts_with(prefix)))
        .map(|name| format!("{name}=; Path=/; Max-Age=0; SameSite=Lax{suffix}"))
        .collect();

    let unmanageable: Vec<&'static str> = THIRD_PARTY_COOKIES
        .iter()
        .find(|(c, _)| *c == category)
        .map_or_else(Vec::new, |(_, names)| names.to_vec());

    for name in &unmanageable {
        warn!(category = %category, cookie = name, "third-party cookie cannot be deleted from this document");
    }

    // Payment SDKs fall under targeting; their own consent APIs still get
    // the revocation signal.
    let provider_signals = if ProviderKind::ALL
        .iter()
        .any(|p| p.consent_category() == category)
    {
        ProviderKind::ALL.to_vec()
    } else {
        Vec::new()
    };

    RevocationPlan {
        delete_cookies,
        unmanageable,
        provider_signals,
    }
}

/// Names of all cookies present on a `Cookie` request header.
fn request_cookie_names(header: &str) -> impl Iterator<Item = &str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, _)| name.trim())
}

/// Read a single cookie value out of a `Cookie` request header.
#[must_use]
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (cookie_name, value) = pair.trim().split_once('=')?;
        (cookie_name.trim() == name).then_some(value.trim())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_visitor_blocked_except_necessary() {
        let gate = ConsentGate::new(ConsentPreferences::necessary_only());
        assert_eq!(gate.decide(ConsentCategory::Necessary), GateState::Allowed);
        assert_eq!(gate.decide(ConsentCategory::Functional), GateState::Blocked);
        assert_eq!(gate.decide(ConsentCategory::Analytics), GateState::Blocked);
        assert_eq!(gate.decide(ConsentCategory::Targeting), GateState::Blocked);
    }

    #[test]
    fn test_require_reports_blocked_category() {
        let gate = ConsentGate::new(ConsentPreferences::necessary_only());
        assert_eq!(
            gate.require(ConsentCategory::Targeting),
            Err(ConsentCategory::Targeting)
        );
        assert!(gate.require(ConsentCategory::Necessary).is_ok());
    }

    #[test]
    fn test_preferences_cookie_roundtrip() {
        let mut prefs = ConsentPreferences::necessary_only();
        prefs.set(ConsentCategory::Targeting, true);
        prefs.set(ConsentCategory::Functional, true);

        let value = prefs.to_cookie_value();
        assert_eq!(value, "necessary,functional,targeting");

        let header = format!("{PREFERENCES_COOKIE}={value}; other=1");
        assert_eq!(ConsentPreferences::from_cookie_header(&header), prefs);
    }

    #[test]
    fn test_missing_cookie_means_blocked() {
        let prefs = ConsentPreferences::from_cookie_header("atelier_session=abc");
        assert_eq!(prefs, ConsentPreferences::necessary_only());
    }

    #[test]
    fn test_garbage_categories_ignored() {
        let header = format!("{PREFERENCES_COOKIE}=targeting,bogus,,analytics");
        let prefs = ConsentPreferences::from_cookie_header(&header);
        assert!(prefs.targeting);
        assert!(prefs.analytics);
        assert!(!prefs.functional);
    }

    #[test]
    fn test_necessary_cannot_be_revoked_via_set() {
        let mut prefs = ConsentPreferences::all();
        prefs.set(ConsentCategory::Necessary, false);
        assert!(prefs.granted(ConsentCategory::Necessary));
    }

    #[test]
    fn test_script_activation_is_idempotent() {
        let mut registry = ScriptRegistry::default();
        let url = "https://www.paypal.com/sdk/js?client-id=abc";

        assert!(registry.activate(url));
        // Re-entrant grant: the same URL never activates twice
        assert!(!registry.activate(url));
        assert!(registry.is_active(url));
    }

    #[test]
    fn test_revoke_deletes_matching_first_party_cookies() {
        let header = "_ga=GA1.2.3; _gid=GA1.9.9; atelier_session=abc; _fbp=fb.1.2";
        let plan = revoke(ConsentCategory::Analytics, header, true);

        assert_eq!(plan.delete_cookies.len(), 2);
        assert!(plan.delete_cookies[0].starts_with("_ga=;"));
        assert!(plan.delete_cookies[0].contains("Max-Age=0"));
        assert!(plan.delete_cookies[0].contains("Secure"));
        assert!(plan.delete_cookies[1].starts_with("_gid=;"));
        // The session and targeting cookies are untouched
        assert!(!plan.delete_cookies.iter().any(|c| c.contains("atelier_session")));
        assert!(!plan.delete_cookies.iter().any(|c| c.starts_with("_fbp")));
    }

    #[test]
    fn test_revoke_targeting_signals_providers() {
        let plan = revoke(ConsentCategory::Targeting, "_fbp=fb.1.2", false);
        assert_eq!(plan.delete_cookies.len(), 1);
        assert!(!plan.unmanageable.is_empty());
        assert_eq!(plan.provider_signals, ProviderKind::ALL.to_vec());
    }

    #[test]
    fn test_revoke_necessary_is_empty() {
        let plan = revoke(ConsentCategory::Necessary, "_ga=1", false);
        assert!(plan.delete_cookies.is_empty());
        assert!(plan.unmanageable.is_empty());
        assert!(plan.provider_signals.is_empty());
    }

    #[test]
    fn test_cookie_value_lookup() {
        let header = "a=1; cookie_consent=all; b=2";
        assert_eq!(cookie_value(header, CONSENT_COOKIE), Some("all"));
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
