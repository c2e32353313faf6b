// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! IPTV content ingestion and normalization.
//!
//! Three sources feed one catalog schema: M3U/M3U8 playlist text, the
//! Xtream-Codes JSON API and XMLTV EPG documents. Network I/O stays behind
//! the [`fetch::Fetcher`] trait; the parsers themselves are pure transforms
//! over already-retrieved text.

pub mod catalog;
pub mod classify;
pub mod epg;
pub mod error;
pub mod fetch;
pub mod m3u;
pub mod xtream;

pub use catalog::{Catalog, ContentItem, ContentType};
pub use classify::Classifier;
pub use epg::{EpgCacheEnvelope, EpgGuide};
pub use error::{AuthError, FetchError, PlaylistError, XtreamError};
pub use fetch::{Fetcher, HttpFetcher};
pub use m3u::M3uPlaylist;
pub use xtream::{Credentials, XtreamClient, XtreamLoad};
