//! Classification rules deciding whether a fetched record belongs to a grouping.
//!
//! A [`RuleSet`] is an ordered list of named rules evaluated short-circuit:
//! the first rule returning [`Verdict::Accept`] or [`Verdict::Reject`] decides,
//! and a record every rule passes on is admitted.

use std::collections::HashSet;

use tracing::trace;

use crate::registry::{Filters, Gate};
use crate::tmdb::models::{RawRecord, ANIMATION_GENRE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
    Pass,
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, record: &RawRecord) -> Verdict;
}

/// Outcome of a rule set, naming the rule that decided (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    pub rule: Option<String>,
}

#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter().map(|r| r.name())).finish()
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn decide(&self, record: &RawRecord) -> Decision {
        for rule in &self.rules {
            match rule.evaluate(record) {
                Verdict::Pass => continue,
                Verdict::Accept => return Decision { admitted: true, rule: Some(rule.name().to_string()) },
                Verdict::Reject => {
                    trace!(id = record.id, rule = rule.name(), "record rejected");
                    return Decision { admitted: false, rule: Some(rule.name().to_string()) };
                }
            }
        }
        Decision { admitted: true, rule: None }
    }

    pub fn admits(&self, record: &RawRecord) -> bool {
        self.decide(record).admitted
    }

    /// Deny rules first, then inclusion validation.
    pub fn for_filters(filters: &Filters) -> Self {
        let mut set = RuleSet::new();
        let brand = Keywords::new(&filters.brand_keywords);
        if !filters.exclude_keywords.is_empty() {
            set.push(KeywordDeny::new(Keywords::new(&filters.exclude_keywords)));
        }
        if !filters.excluded_origin_countries.is_empty() {
            set.push(OriginCountryDeny::new(&filters.excluded_origin_countries, brand.clone()));
        }
        if filters.validate {
            set.push(CompanyOrKeywordAllow {
                company_ids: filters.company_ids.iter().copied().collect(),
                network_ids: filters.network_ids.iter().copied().collect(),
                keywords: brand,
            });
        }
        set
    }
}

/// Case-insensitive substring matcher over title and overview.
#[derive(Debug, Clone, Default)]
pub struct Keywords(Vec<String>);

impl Keywords {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Self {
        Self(
            words
                .iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_match(&self, record: &RawRecord) -> Option<&str> {
        if self.is_empty() {
            return None;
        }
        let text = record.searchable_text();
        self.0.iter().find(|w| text.contains(w.as_str())).map(String::as_str)
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        self.first_match(record).is_some()
    }
}

/// Rejects records whose title or overview carries a block-listed keyword.
pub struct KeywordDeny {
    keywords: Keywords,
}

impl KeywordDeny {
    pub fn new(keywords: Keywords) -> Self {
        Self { keywords }
    }
}

impl Rule for KeywordDeny {
    fn name(&self) -> &str {
        "exclude-keywords"
    }

    fn evaluate(&self, record: &RawRecord) -> Verdict {
        match self.keywords.first_match(record) {
            Some(word) => {
                trace!(id = record.id, word, "blocked keyword");
                Verdict::Reject
            }
            None => Verdict::Pass,
        }
    }
}

/// Rejects records produced in one of `countries`, unless they name the brand.
pub struct OriginCountryDeny {
    countries: HashSet<String>,
    unless: Keywords,
}

impl OriginCountryDeny {
    pub fn new<S: AsRef<str>>(countries: &[S], unless: Keywords) -> Self {
        Self {
            countries: countries.iter().map(|c| c.as_ref().trim().to_ascii_uppercase()).collect(),
            unless,
        }
    }
}

impl Rule for OriginCountryDeny {
    fn name(&self) -> &str {
        "origin-country"
    }

    fn evaluate(&self, record: &RawRecord) -> Verdict {
        let foreign = record
            .origin_country
            .iter()
            .any(|c| self.countries.contains(&c.to_ascii_uppercase()));
        if foreign && !self.unless.matches(record) {
            Verdict::Reject
        } else {
            Verdict::Pass
        }
    }
}

/// Inclusion validation for ambiguous buckets: the record must list a known
/// company or network, or mention a brand keyword.
pub struct CompanyOrKeywordAllow {
    pub company_ids: HashSet<u64>,
    pub network_ids: HashSet<u64>,
    pub keywords: Keywords,
}

impl Rule for CompanyOrKeywordAllow {
    fn name(&self) -> &str {
        "validate-brand"
    }

    fn evaluate(&self, record: &RawRecord) -> Verdict {
        let by_company = record.company_ids().any(|id| self.company_ids.contains(&id))
            || record.network_ids().any(|id| self.network_ids.contains(&id));
        if by_company || self.keywords.matches(record) {
            Verdict::Pass
        } else {
            Verdict::Reject
        }
    }
}

/// Animated / live-action split on the animation genre.
pub struct GenreGate {
    pub gate: Gate,
}

impl Rule for GenreGate {
    fn name(&self) -> &str {
        match self.gate {
            Gate::Animated => "animated",
            Gate::LiveAction => "live-action",
        }
    }

    fn evaluate(&self, record: &RawRecord) -> Verdict {
        let animated = record.has_genre(ANIMATION_GENRE);
        match (self.gate, animated) {
            (Gate::Animated, true) | (Gate::LiveAction, false) => Verdict::Pass,
            _ => Verdict::Reject,
        }
    }
}
