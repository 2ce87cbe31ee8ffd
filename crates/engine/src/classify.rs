//! Free-text product classification.
//!
//! The policy is an ordered rule table evaluated top to bottom, first match
//! wins. Order is semantic: wallet rules run before generic tokens, the
//! group-print rules before bare size tokens (a "3x5 group print" must stay
//! unrecognized instead of reading as a 3x5 package), and "mini wallet"
//! before "wallets".

use crate::model::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub code: Option<&'static str>,
    pub category: Category,
}

enum Pattern {
    /// Every term appears as a substring.
    AllOf(&'static [&'static str]),
    /// At least one term appears as a substring.
    AnyOf(&'static [&'static str]),
}

impl Pattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            Self::AllOf(terms) => terms.iter().all(|t| text.contains(t)),
            Self::AnyOf(terms) => terms.iter().any(|t| text.contains(t)),
        }
    }
}

struct Rule {
    pattern: Pattern,
    code: Option<&'static str>,
    category: Category,
}

const fn rule(pattern: Pattern, code: Option<&'static str>, category: Category) -> Rule {
    Rule { pattern, code, category }
}

/// Phrases meaning "no order placed" — dropped without an error.
const IGNORE_EXACT: &[&str] = &["no photo package wanted"];

const RULES: &[Rule] = &[
    rule(Pattern::AnyOf(&["mini wallet"]), Some("m"), Category::Standard),
    rule(Pattern::AnyOf(&["wallets", "wallet prints"]), Some("w"), Category::Standard),
    // Group prints by size; unsized group prints fall through to unknown
    // before the size tokens below can claim them.
    rule(Pattern::AllOf(&["group print", "5", "7"]), Some("m"), Category::Grouped),
    rule(Pattern::AllOf(&["group print", "8", "10"]), Some("l"), Category::Grouped),
    rule(Pattern::AnyOf(&["group print"]), None, Category::Unknown),
    rule(Pattern::AnyOf(&["3x5", "3 x 5"]), Some("f"), Category::Standard),
    rule(Pattern::AnyOf(&["5x7", "5 x 7"]), Some("s"), Category::Standard),
    rule(Pattern::AnyOf(&["8x10", "8 x 10"]), Some("t"), Category::Standard),
    rule(Pattern::AnyOf(&["basic"]), Some("b"), Category::Standard),
    rule(Pattern::AnyOf(&["classic"]), Some("c"), Category::Standard),
    rule(Pattern::AnyOf(&["deluxe"]), Some("d"), Category::Standard),
    rule(Pattern::AnyOf(&["economy"]), Some("e"), Category::Standard),
    rule(Pattern::AnyOf(&["ultimate"]), Some("u"), Category::Standard),
    rule(Pattern::AllOf(&["digital", "portraits"]), Some("CD"), Category::Addon),
    rule(Pattern::AnyOf(&["cd"]), Some("CD"), Category::Addon),
    rule(Pattern::AnyOf(&["touch up"]), Some("Pending"), Category::Service),
];

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Classify a free-text product description. Deterministic and
/// side-effect-free; correctness is defined entirely by the rule table.
pub fn classify(text: &str) -> Classification {
    let normalized = normalize(text);

    if normalized.is_empty() || IGNORE_EXACT.contains(&normalized.as_str()) {
        return Classification { code: None, category: Category::Ignored };
    }

    for rule in RULES {
        if rule.pattern.matches(&normalized) {
            return Classification { code: rule.code, category: rule.category };
        }
    }

    Classification { code: None, category: Category::Unknown }
}
