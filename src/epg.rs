// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Programmes further than this from "now" are discarded at parse time.
/// Multi-day feeds can run to megabytes of XML; a day of context around the
/// current moment is all a live guide needs, and callers wanting a wider
/// horizon re-fetch.
const WINDOW_HOURS: i64 = 12;

fn window() -> Duration {
    Duration::hours(WINDOW_HOURS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgChannel {
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgProgramme {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub category: String,
}

/// Channel metadata and time-windowed programme listings extracted from one
/// XMLTV document. Both maps are keyed by the XMLTV channel id, which matches
/// playlist `tvg_id` values and is unrelated to catalog item ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpgGuide {
    pub channels: HashMap<String, EpgChannel>,
    pub programmes: HashMap<String, Vec<EpgProgramme>>,
}

impl EpgGuide {
    /// Looks up the programme airing at `now` on the channel with the given
    /// tvg id.
    pub fn current_programme(&self, tvg_id: &str, now: DateTime<Utc>) -> Option<&EpgProgramme> {
        self.programmes
            .get(tvg_id)?
            .iter()
            .find(|p| now >= p.start && now < p.stop)
    }

    /// Looks up the next programme starting at or after `now` on the channel
    /// with the given tvg id. Lists are sorted by start, so the first hit is
    /// the soonest.
    pub fn next_programme(&self, tvg_id: &str, now: DateTime<Utc>) -> Option<&EpgProgramme> {
        self.programmes
            .get(tvg_id)?
            .iter()
            .find(|p| p.start >= now)
    }
}

/// Parsed EPG data tagged with its source URL and parse time. The core only
/// produces these; whether a cached guide is still fresh enough to reuse is
/// the caller's policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgCacheEnvelope {
    pub url: String,
    pub data: EpgGuide,
    /// Milliseconds since the Unix epoch, stamped when the guide was parsed.
    pub timestamp: i64,
}

impl EpgCacheEnvelope {
    pub fn new(url: impl Into<String>, data: EpgGuide) -> Self {
        Self {
            url: url.into(),
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

static CHANNEL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<channel\s+id="([^"]*)"[^>]*>(.*?)</channel>"#).expect("channel pattern")
});
static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<display-name[^>]*>([^<]*)</display-name>").expect("display-name pattern")
});
static ICON_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<icon\s+src="([^"]*)""#).expect("icon pattern"));
static PROGRAMME_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<programme\s+start="([^"]*)"\s+stop="([^"]*)"\s+channel="([^"]*)"[^>]*>(.*?)</programme>"#,
    )
    .expect("programme pattern")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title[^>]*>([^<]*)</title>").expect("title pattern"));
static DESC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<desc[^>]*>([^<]*)</desc>").expect("desc pattern"));
static CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<category[^>]*>([^<]*)</category>").expect("category pattern"));
static TZ_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-])(\d{2})(\d{2})").expect("timezone pattern"));

/// Extracts channels and programmes from XMLTV text, windowed around the
/// current wall clock.
pub fn parse(xml: &str) -> EpgGuide {
    parse_at(xml, Utc::now())
}

/// Extracts channels and programmes from XMLTV text, windowed to ±12 hours
/// around `now`. Programmes touching the window boundary are kept.
///
/// This is a lenient, pattern-based extraction, not a conformant XML parse:
/// EPG feeds in this domain routinely are not well-formed documents, so every
/// missing or malformed fragment degrades to an empty field or a skipped
/// entry instead of failing the call. Empty input yields empty maps.
pub fn parse_at(xml: &str, now: DateTime<Utc>) -> EpgGuide {
    let mut guide = EpgGuide::default();

    for caps in CHANNEL_BLOCK.captures_iter(xml) {
        let id = caps[1].to_string();
        let block = &caps[2];
        let name = DISPLAY_NAME
            .captures(block)
            .map(|m| m[1].trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());
        let icon = ICON_SRC
            .captures(block)
            .map(|m| m[1].to_string())
            .unwrap_or_default();
        guide.channels.insert(id, EpgChannel { name, icon });
    }

    let window_start = now - window();
    let window_end = now + window();
    let mut skipped = 0usize;

    for caps in PROGRAMME_BLOCK.captures_iter(xml) {
        let (Some(start), Some(stop)) =
            (parse_xmltv_timestamp(&caps[1]), parse_xmltv_timestamp(&caps[2]))
        else {
            skipped += 1;
            continue;
        };

        if start > window_end || stop < window_start {
            continue;
        }

        let block = &caps[4];
        let first_text = |re: &Regex| {
            re.captures(block)
                .map(|m| m[1].trim().to_string())
                .unwrap_or_default()
        };

        guide
            .programmes
            .entry(caps[3].to_string())
            .or_default()
            .push(EpgProgramme {
                start,
                stop,
                title: first_text(&TITLE),
                desc: first_text(&DESC),
                category: first_text(&CATEGORY),
            });
    }

    if skipped > 0 {
        debug!(skipped, "skipped programmes with unparseable timestamps");
    }

    // Feeds do not guarantee chronological order per channel; queries do.
    for listing in guide.programmes.values_mut() {
        listing.sort_by_key(|p| p.start);
    }

    guide
}

/// Parses XMLTV's compact timestamp format: `YYYYMMDDHHMMSS` digits followed
/// by an optional `±HHMM` offset. The digits are read as a UTC-naive time and
/// the offset is then subtracted, so `20240101120000 +0100` means 11:00 UTC.
fn parse_xmltv_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.len() < 14 || !raw.is_char_boundary(14) {
        return None;
    }
    let (digits, rest) = raw.split_at(14);
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?;
    let mut instant = Utc.from_utc_datetime(&naive);

    if let Some(caps) = TZ_OFFSET.captures(rest) {
        let hours: i64 = caps[2].parse().ok()?;
        let minutes: i64 = caps[3].parse().ok()?;
        let offset = Duration::minutes(hours * 60 + minutes);
        instant = if &caps[1] == "+" {
            instant - offset
        } else {
            instant + offset
        };
    }

    Some(instant)
}
