//! Response guardrails
//!
//! Last line of defense before a generated reply reaches a follower.
//! Each check is an independent pure function taking (response,
//! reference data) and returning an issue list, so new checks can be
//! added without touching orchestration. A guardrail violation is not
//! an error: the failure path is a safe stalling reply.

use dm_assistant_config::CreatorConfig;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Hard cap applied even when every other check passes
const MAX_RESPONSE_LENGTH: usize = 2000;

/// Price tolerance for float comparison
const PRICE_EPSILON: f64 = 0.01;

/// "123,45€", "150 EUR", "99.00 euros", "40$"
static PRICE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d{1,2})?)\s*(?:€|\$|eur\b|euros?\b|usd\b|d[oó]lares\b)")
        .expect("valid regex")
});

/// "€99", "$ 150", "USD 40"
static PRICE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:€|\$|eur|usd)\s*(\d+(?:[.,]\d{1,2})?)").expect("valid regex")
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("valid regex"));

/// Known-safe payment/calendar/social domains allowed without per-creator
/// configuration
static DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "buy.stripe.com",
    "checkout.stripe.com",
    "calendly.com",
    "paypal.com",
    "paypal.me",
    "gumroad.com",
    "hotmart.com",
    "instagram.com",
    "youtube.com",
    "linktr.ee",
];

/// Risky promise patterns, each gated on a creator-config field: a match
/// is only an issue when the creator has NOT configured that topic.
struct HallucinationPattern {
    regex: Lazy<Regex>,
    description: &'static str,
    /// Returns true when the creator config legitimizes the claim
    configured: fn(&CreatorConfig) -> bool,
}

static HALLUCINATION_PATTERNS: [HallucinationPattern; 5] = [
    HallucinationPattern {
        regex: Lazy::new(|| {
            Regex::new(r"(?i)te (?:llamo|llamamos|llamar[áa]n?|llamaremos)").expect("valid regex")
        }),
        description: "promises a phone call",
        configured: |_| false,
    },
    HallucinationPattern {
        regex: Lazy::new(|| {
            Regex::new(r"(?i)te (?:env[ií]o|enviamos|mando|mandamos) un (?:email|correo)")
                .expect("valid regex")
        }),
        description: "promises an email",
        configured: |c| c.contact_email.is_some(),
    },
    HallucinationPattern {
        regex: Lazy::new(|| {
            Regex::new(r"(?i)nuestra (?:oficina|tienda f[ií]sica|direcci[oó]n)")
                .expect("valid regex")
        }),
        description: "claims a physical address",
        configured: |_| false,
    },
    HallucinationPattern {
        regex: Lazy::new(|| {
            Regex::new(r"(?i)(?:horario de atenci[oó]n|atendemos de \d|abrimos de \d)")
                .expect("valid regex")
        }),
        description: "states business hours",
        configured: |c| c.business_hours.is_some(),
    },
    HallucinationPattern {
        regex: Lazy::new(|| {
            Regex::new(r"(?i)garant[ií]a de \d+ d[ií]as").expect("valid regex")
        }),
        description: "states a guarantee period",
        configured: |c| c.guarantee_days.is_some(),
    },
];

/// Validation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// First issue, for log lines
    pub reason: Option<String>,
    pub issues: Vec<String>,
    /// A rewritten response, when a check can supply one
    pub corrected_response: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            issues: Vec::new(),
            corrected_response: None,
        }
    }

    fn from_issues(issues: Vec<String>) -> Self {
        if issues.is_empty() {
            return Self::ok();
        }
        Self {
            valid: false,
            reason: issues.first().cloned(),
            issues,
            corrected_response: None,
        }
    }
}

/// Extract all currency-like numeric mentions, normalized to floats
pub fn extract_prices(response: &str) -> Vec<f64> {
    let mut prices = Vec::new();
    for re in [&*PRICE_SUFFIX_RE, &*PRICE_PREFIX_RE] {
        for capture in re.captures_iter(response) {
            let raw = capture[1].replace(',', ".");
            if let Ok(value) = raw.parse::<f64>() {
                if !prices.iter().any(|p: &f64| (p - value).abs() < PRICE_EPSILON) {
                    prices.push(value);
                }
            }
        }
    }
    prices
}

/// Flag prices in the response not present among known product prices.
/// No known prices means nothing to validate against, so no issues.
pub fn check_prices(response: &str, known_prices: &[f64]) -> Vec<String> {
    if known_prices.is_empty() {
        return Vec::new();
    }
    extract_prices(response)
        .into_iter()
        .filter(|price| {
            !known_prices
                .iter()
                .any(|known| (known - price).abs() < PRICE_EPSILON)
        })
        .map(|price| format!("mentions unknown price {price}"))
        .collect()
}

pub fn extract_urls(response: &str) -> Vec<String> {
    URL_RE
        .find_iter(response)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .collect()
}

/// Every URL must contain at least one allowed domain fragment, either
/// creator-supplied or from the default safe set
pub fn check_urls(response: &str, extra_allowed: &[String]) -> Vec<String> {
    extract_urls(response)
        .into_iter()
        .filter(|url| {
            let default_ok = DEFAULT_ALLOWED_DOMAINS.iter().any(|d| url.contains(d));
            let extra_ok = extra_allowed.iter().any(|d| url.contains(d.as_str()));
            !default_ok && !extra_ok
        })
        .map(|url| format!("contains non-allowed URL {url}"))
        .collect()
}

/// Flag risky promises whose topic the creator has not configured
pub fn check_hallucinations(response: &str, creator: &CreatorConfig) -> Vec<String> {
    HALLUCINATION_PATTERNS
        .iter()
        .filter(|pattern| !(pattern.configured)(creator))
        .filter(|pattern| pattern.regex.is_match(response))
        .map(|pattern| format!("response {}", pattern.description))
        .collect()
}

/// Response validator
#[derive(Debug, Clone)]
pub struct Guardrail {
    enabled: bool,
    max_response_length: usize,
}

impl Guardrail {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            max_response_length: MAX_RESPONSE_LENGTH,
        }
    }

    pub fn from_config(config: &dm_assistant_config::GuardrailConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_response_length: config.max_response_length,
        }
    }

    /// Run every check against one generated response
    pub fn validate_response(&self, response: &str, creator: &CreatorConfig) -> ValidationResult {
        if !self.enabled {
            tracing::debug!("guardrail disabled, skipping all checks");
            return ValidationResult::ok();
        }

        let mut issues = Vec::new();
        issues.extend(check_prices(response, &creator.known_prices()));
        issues.extend(check_urls(response, &creator.allowed_urls));
        issues.extend(check_hallucinations(response, creator));
        if response.chars().count() > self.max_response_length {
            issues.push(format!(
                "response exceeds {} characters",
                self.max_response_length
            ));
        }

        if !issues.is_empty() {
            tracing::warn!(creator = %creator.creator_id, ?issues, "guardrail rejected response");
        }
        ValidationResult::from_issues(issues)
    }

    /// The response that actually goes out: the original when valid, a
    /// correction when one exists, otherwise a random localized stalling
    /// reply
    pub fn get_safe_response(
        &self,
        response: &str,
        validation: &ValidationResult,
        creator: &CreatorConfig,
    ) -> String {
        if validation.valid {
            return response.to_string();
        }
        if let Some(corrected) = &validation.corrected_response {
            return corrected.clone();
        }
        let fallbacks = creator.fallbacks.for_language(&creator.language);
        fallbacks
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Un momento, por favor.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_assistant_config::Product;

    fn creator_with_price(price: f64) -> CreatorConfig {
        CreatorConfig::new("c1", "Laura").with_product(Product::new("p1", "Curso", price))
    }

    #[test]
    fn test_unknown_price_rejected() {
        let creator = creator_with_price(99.0);
        let guardrail = Guardrail::new(true);
        let result = guardrail.validate_response("El curso cuesta 150€", &creator);
        assert!(!result.valid);
        assert!(result.issues[0].contains("150"));
    }

    #[test]
    fn test_known_price_variants_accepted() {
        let creator = creator_with_price(99.0);
        let guardrail = Guardrail::new(true);
        for response in ["cuesta 99€", "cuesta 99.00€", "cuesta 99,00€", "son €99"] {
            let result = guardrail.validate_response(response, &creator);
            assert!(result.valid, "{response} should pass");
        }
    }

    #[test]
    fn test_no_products_skips_price_check() {
        let creator = CreatorConfig::new("c1", "Laura");
        let guardrail = Guardrail::new(true);
        let result = guardrail.validate_response("cuesta 150€", &creator);
        assert!(result.valid);
    }

    #[test]
    fn test_url_allow_list() {
        let creator = CreatorConfig::new("c1", "Laura");
        let guardrail = Guardrail::new(true);

        let bad = guardrail
            .validate_response("paga aquí: https://evil-tracker.example.com/buy", &creator);
        assert!(!bad.valid);

        let good = guardrail.validate_response("paga aquí: https://buy.stripe.com/abc", &creator);
        assert!(good.valid);
    }

    #[test]
    fn test_creator_supplied_url_allowed() {
        let mut creator = CreatorConfig::new("c1", "Laura");
        creator.allowed_urls.push("miacademia.es".to_string());
        let guardrail = Guardrail::new(true);
        let result =
            guardrail.validate_response("entra en https://miacademia.es/login", &creator);
        assert!(result.valid);
    }

    #[test]
    fn test_guarantee_flagged_only_without_config() {
        let guardrail = Guardrail::new(true);
        let response = "Tienes garantía de 30 días";

        let unconfigured = CreatorConfig::new("c1", "Laura");
        assert!(!guardrail.validate_response(response, &unconfigured).valid);

        let mut configured = CreatorConfig::new("c1", "Laura");
        configured.guarantee_days = Some(30);
        assert!(guardrail.validate_response(response, &configured).valid);
    }

    #[test]
    fn test_callback_promise_always_flagged() {
        let creator = CreatorConfig::new("c1", "Laura");
        let result = Guardrail::new(true).validate_response("Mañana te llamamos", &creator);
        assert!(!result.valid);
        assert!(result.reason.as_deref().unwrap_or("").contains("phone call"));
    }

    #[test]
    fn test_length_cap() {
        let creator = CreatorConfig::new("c1", "Laura");
        let long = "a".repeat(2001);
        assert!(!Guardrail::new(true).validate_response(&long, &creator).valid);
    }

    #[test]
    fn test_disabled_guardrail_passes_everything() {
        let creator = creator_with_price(99.0);
        let guardrail = Guardrail::new(false);
        let result =
            guardrail.validate_response("cuesta 150€ y te llamamos mañana", &creator);
        assert!(result.valid);
    }

    #[test]
    fn test_safe_response_is_localized_fallback() {
        let creator = CreatorConfig::new("c1", "Laura").with_language("en");
        let guardrail = Guardrail::new(true);
        let validation = ValidationResult::from_issues(vec!["issue".to_string()]);
        let safe = guardrail.get_safe_response("bad reply", &validation, &creator);
        assert_ne!(safe, "bad reply");
        assert!(creator.fallbacks.en.contains(&safe));
    }

    #[test]
    fn test_price_extraction_variants() {
        let prices = extract_prices("el curso son 99,50€ o $150 o 20 euros");
        assert!(prices.iter().any(|p| (p - 99.5).abs() < 0.01));
        assert!(prices.iter().any(|p| (p - 150.0).abs() < 0.01));
        assert!(prices.iter().any(|p| (p - 20.0).abs() < 0.01));
    }
}
