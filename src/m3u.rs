// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{Catalog, CatalogBuilder, ContentItem, DEFAULT_GROUP, stable_id};
use crate::classify::Classifier;
use crate::error::PlaylistError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Result of parsing one M3U/M3U8 playlist: the EPG URL advertised in the
/// header, if any, plus the normalized catalog.
#[derive(Debug, Clone)]
pub struct M3uPlaylist {
    pub epg_url: Option<String>,
    pub catalog: Catalog,
}

static EPG_URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    // Providers disagree on the header attribute name; all three spellings
    // are seen in the wild.
    Regex::new(r#"(?i)(?:url-tvg|x-tvg-url|tvg-url)="([^"]*)""#).expect("EPG URL pattern")
});

static EXTINF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_-]+)="([^"]*)""#).expect("EXTINF attribute pattern"));

/// Attributes collected from an `#EXTINF:` line, waiting for the URL line
/// that closes the entry.
#[derive(Debug)]
struct PendingEntry {
    tvg_id: String,
    tvg_name: String,
    name: String,
    logo: String,
    group: String,
}

/// Parses M3U playlist text with the default classification table.
pub fn parse(text: &str) -> Result<M3uPlaylist, PlaylistError> {
    parse_with(text, &Classifier::default())
}

/// Parses M3U playlist text into a normalized catalog.
///
/// The only fatal validation is the `#EXTM3U` marker on the first non-blank
/// line. Everything else is best effort: malformed metadata lines are
/// skipped, unknown directives between an `#EXTINF:` line and its URL are
/// tolerated, and a URL with no preceding metadata is dropped.
pub fn parse_with(text: &str, classifier: &Classifier) -> Result<M3uPlaylist, PlaylistError> {
    let text = text.replace("\r\n", "\n");
    let mut lines = text.split('\n');

    let header = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
            None => return Err(PlaylistError::MissingHeader),
        }
    };
    if !header.trim().starts_with("#EXTM3U") {
        return Err(PlaylistError::MissingHeader);
    }

    let epg_url = EPG_URL_ATTR
        .captures(header)
        .map(|caps| caps[1].to_string());

    let mut builder = CatalogBuilder::new();
    let mut pending: Option<PendingEntry> = None;

    for line in lines {
        let line = line.trim();

        if line.starts_with("#EXTINF:") {
            pending = Some(parse_extinf(line));
        } else if line.is_empty() || line.starts_with('#') {
            // Blank lines and directives such as #EXTVLCOPT may sit between
            // an #EXTINF line and its URL; the pending entry survives them.
        } else if let Some(entry) = pending.take() {
            builder.push(close_entry(entry, line, classifier));
        } else {
            debug!(url = line, "dropping URL line with no preceding #EXTINF");
        }
    }

    Ok(M3uPlaylist {
        epg_url,
        catalog: builder.finish(),
    })
}

fn parse_extinf(line: &str) -> PendingEntry {
    let mut tvg_id = String::new();
    let mut tvg_name = String::new();
    let mut logo = String::new();
    let mut group = String::new();

    for caps in EXTINF_ATTR.captures_iter(line) {
        let key = caps[1].to_lowercase().replace('_', "-");
        let value = &caps[2];
        match key.as_str() {
            "tvg-id" => tvg_id = value.to_string(),
            "tvg-name" => tvg_name = value.to_string(),
            "tvg-logo" => logo = value.to_string(),
            "group-title" => group = value.to_string(),
            // Other attributes (tvg-shift, radio, ...) are parsed but unused.
            _ => {}
        }
    }

    // The display title follows the last comma, not the first: titles
    // themselves may contain commas.
    let name = match line.rfind(',') {
        Some(idx) => line[idx + 1..].trim().to_string(),
        None => String::new(),
    };
    let name = if name.is_empty() {
        if tvg_name.is_empty() {
            "Unknown".to_string()
        } else {
            tvg_name.clone()
        }
    } else {
        name
    };

    PendingEntry {
        tvg_id,
        tvg_name,
        name,
        logo,
        group,
    }
}

fn close_entry(entry: PendingEntry, url: &str, classifier: &Classifier) -> ContentItem {
    let group = if entry.group.is_empty() {
        DEFAULT_GROUP.to_string()
    } else {
        entry.group
    };
    let kind = classifier.classify(url, &group);

    ContentItem {
        id: stable_id(&entry.tvg_id, url),
        tvg_id: entry.tvg_id,
        tvg_name: entry.tvg_name,
        name: entry.name,
        logo: entry.logo,
        group,
        url: url.to_string(),
        kind,
        series_id: None,
        rating: None,
        plot: None,
        added: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentType;

    #[test]
    fn parses_a_minimal_live_entry() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"bbc1\" group-title=\"News\",BBC One\nhttp://x/live/1.m3u8\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
        let item = &playlist.catalog.channels[0];
        assert_eq!(item.name, "BBC One");
        assert_eq!(item.tvg_id, "bbc1");
        assert_eq!(item.group, "News");
        assert_eq!(item.kind, ContentType::Live);
        assert_eq!(playlist.catalog.groups, vec!["News"]);
    }

    #[test]
    fn missing_header_is_fatal() {
        let err = parse("#EXTINF:-1,Channel\nhttp://x/1\n").expect_err("no header");
        assert_eq!(err, PlaylistError::MissingHeader);
        assert_eq!(parse("").expect_err("empty"), PlaylistError::MissingHeader);
    }

    #[test]
    fn leading_blank_lines_before_header_are_tolerated() {
        let text = "\n\n#EXTM3U\n#EXTINF:-1,A\nhttp://x/1\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
    }

    #[test]
    fn header_prefix_match_is_case_sensitive() {
        assert!(parse("#extm3u\n").is_err());
        // Extended header forms keep the prefix.
        assert!(parse("#EXTM3U x-tvg-url=\"http://e/epg.xml\"\n").is_ok());
    }

    #[test]
    fn epg_url_is_scanned_from_any_known_attribute() {
        for attr in ["url-tvg", "x-tvg-url", "tvg-url", "URL-TVG"] {
            let text = format!("#EXTM3U {attr}=\"http://e/epg.xml\"\n");
            let playlist = parse(&text).expect("valid playlist");
            assert_eq!(playlist.epg_url.as_deref(), Some("http://e/epg.xml"));
        }
        assert_eq!(parse("#EXTM3U\n").expect("valid").epg_url, None);
    }

    #[test]
    fn titles_containing_commas_survive() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"x\",News, Weather & Sport\nhttp://x/1\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels[0].name, "Weather & Sport");
    }

    #[test]
    fn name_falls_back_to_tvg_name_then_unknown() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-name=\"Alt Name\",\nhttp://x/1\n#EXTINF:-1,\nhttp://x/2\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels[0].name, "Alt Name");
        assert_eq!(playlist.catalog.channels[1].name, "Unknown");
    }

    #[test]
    fn underscored_attribute_keys_normalize() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg_id=\"u1\" group_title=\"G\",A\nhttp://x/1\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels[0].tvg_id, "u1");
        assert_eq!(playlist.catalog.channels[0].group, "G");
    }

    #[test]
    fn missing_group_defaults_to_uncategorized() {
        let text = "#EXTM3U\n#EXTINF:-1,A\nhttp://x/1\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels[0].group, DEFAULT_GROUP);
        assert_eq!(playlist.catalog.groups, vec![DEFAULT_GROUP]);
    }

    #[test]
    fn directives_between_extinf_and_url_keep_the_pending_entry() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"a\",A\n#EXTVLCOPT:http-user-agent=Foo\n\nhttp://x/1\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
        assert_eq!(playlist.catalog.channels[0].url, "http://x/1");
    }

    #[test]
    fn orphan_url_lines_are_silently_dropped() {
        let text = "#EXTM3U\nhttp://x/orphan\n#EXTINF:-1,A\nhttp://x/1\nhttp://x/second\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
        assert_eq!(playlist.catalog.channels[0].url, "http://x/1");
    }

    #[test]
    fn entries_route_into_typed_lists() {
        let text = concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 group-title=\"News\",Live One\nhttp://x/live/1.m3u8\n",
            "#EXTINF:-1 group-title=\"Cinema\",Film One\nhttp://x/movie/2.mp4\n",
            "#EXTINF:-1 group-title=\"Drama\",Show One\nhttp://x/series/3\n",
        );
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
        assert_eq!(playlist.catalog.vods.len(), 1);
        assert_eq!(playlist.catalog.series.len(), 1);
        assert_eq!(playlist.catalog.vods[0].kind, ContentType::Vod);
        assert_eq!(playlist.catalog.vod_groups, vec!["Cinema"]);
        assert_eq!(playlist.catalog.series_groups, vec!["Drama"]);
    }

    #[test]
    fn crlf_line_endings_parse() {
        let text = "#EXTM3U\r\n#EXTINF:-1 tvg-id=\"a\",A\r\nhttp://x/1\r\n";
        let playlist = parse(text).expect("valid playlist");
        assert_eq!(playlist.catalog.channels.len(), 1);
        assert_eq!(playlist.catalog.channels[0].name, "A");
    }

    #[test]
    fn ids_are_stable_across_reparses_and_attribute_churn() {
        let first = parse("#EXTM3U\n#EXTINF:-1 tvg-id=\"a\" group-title=\"G1\",Old\nhttp://x/1\n")
            .expect("valid playlist");
        let second = parse("#EXTM3U\n#EXTINF:-1 tvg-id=\"a\" group-title=\"G2\",New\nhttp://x/1\n")
            .expect("valid playlist");
        assert_eq!(
            first.catalog.channels[0].id,
            second.catalog.channels[0].id
        );
    }

    #[test]
    fn parse_is_deterministic() {
        let text = concat!(
            "#EXTM3U url-tvg=\"http://e/epg.xml\"\n",
            "#EXTINF:-1 tvg-id=\"b\" group-title=\"Zeta\",B\nhttp://x/2\n",
            "#EXTINF:-1 tvg-id=\"a\" group-title=\"alpha\",A\nhttp://x/1\n",
        );
        let one = parse(text).expect("valid playlist");
        let two = parse(text).expect("valid playlist");
        assert_eq!(one.epg_url, two.epg_url);
        assert_eq!(one.catalog.groups, two.catalog.groups);
        let ids: Vec<_> = one.catalog.channels.iter().map(|c| &c.id).collect();
        let ids2: Vec<_> = two.catalog.channels.iter().map(|c| &c.id).collect();
        assert_eq!(ids, ids2);
    }
}
