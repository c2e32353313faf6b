// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::ContentType;
use regex::Regex;
use std::sync::LazyLock;

/// Which field of an entry a rule inspects. URL evidence outranks group-name
/// evidence, so URL rules always come first in the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    Url,
    Group,
}

/// One classification rule: a pattern, the field it applies to and the
/// content type a match yields.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub pattern: Regex,
    pub evidence: Evidence,
    pub kind: ContentType,
}

/// An ordered first-match rule table deciding whether an entry is a live
/// channel, a VOD title or a series.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Evaluates the rules in order and returns the type of the first match.
    /// Entries matching nothing default to live.
    pub fn classify(&self, url: &str, group: &str) -> ContentType {
        for rule in &self.rules {
            let haystack = match rule.evidence {
                Evidence::Url => url,
                Evidence::Group => group,
            };
            if rule.pattern.is_match(haystack) {
                return rule.kind;
            }
        }
        ContentType::Live
    }
}

impl Default for Classifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(|| {
    let rule = |pattern: &str, evidence: Evidence, kind: ContentType| ClassifierRule {
        pattern: Regex::new(pattern).expect("default classifier pattern"),
        evidence,
        kind,
    };

    // Priority order: series URLs, VOD URLs, series groups, VOD groups.
    Classifier::new(vec![
        rule(r"(?i)/series/", Evidence::Url, ContentType::Series),
        rule(r"(?i)/show/", Evidence::Url, ContentType::Series),
        rule(r"(?i)/tv[_-]?shows?/", Evidence::Url, ContentType::Series),
        rule(r"(?i)/movie/", Evidence::Url, ContentType::Vod),
        rule(r"(?i)/movies/", Evidence::Url, ContentType::Vod),
        rule(r"(?i)/vod/", Evidence::Url, ContentType::Vod),
        rule(r"(?i)/film/", Evidence::Url, ContentType::Vod),
        rule(r"(?i)\.mp4(\?|$)", Evidence::Url, ContentType::Vod),
        rule(r"(?i)\.mkv(\?|$)", Evidence::Url, ContentType::Vod),
        rule(r"(?i)\.avi(\?|$)", Evidence::Url, ContentType::Vod),
        rule(r"(?i)^series\b", Evidence::Group, ContentType::Series),
        rule(r"(?i)\bseries$", Evidence::Group, ContentType::Series),
        rule(r"(?i)^tv[_-]?shows?", Evidence::Group, ContentType::Series),
        rule(r"(?i)\btv[_-]?shows?$", Evidence::Group, ContentType::Series),
        rule(r"(?i)^\|.*series", Evidence::Group, ContentType::Series),
        rule(r"(?i)^vod\b", Evidence::Group, ContentType::Vod),
        rule(r"(?i)^movie", Evidence::Group, ContentType::Vod),
        rule(r"(?i)^film", Evidence::Group, ContentType::Vod),
        rule(r"(?i)\bvod$", Evidence::Group, ContentType::Vod),
        rule(r"(?i)\bmovies?$", Evidence::Group, ContentType::Vod),
        rule(r"(?i)\bfilms?$", Evidence::Group, ContentType::Vod),
        rule(r"(?i)^\|.*vod", Evidence::Group, ContentType::Vod),
        rule(r"(?i)^\|.*movie", Evidence::Group, ContentType::Vod),
    ])
});
