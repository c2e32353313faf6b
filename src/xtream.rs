// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::{Catalog, CatalogBuilder, ContentItem, ContentType, DEFAULT_GROUP};
use crate::error::{AuthError, XtreamError};
use crate::fetch::Fetcher;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;
use urlencoding::encode;

fn deserialize_optional_number_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(D::Error::custom("Expected string, number, or null")),
    }
}

fn deserialize_number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("Expected string or number")),
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| D::Error::custom("Expected unsigned 32-bit id")),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| D::Error::custom("Expected numeric id string")),
        _ => Err(D::Error::custom("Expected number or string id")),
    }
}

// Providers report auth as 1/0, "1"/"0" or a bool depending on the panel.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(b.into()),
        Value::Number(n) => Ok(u8::from(n.as_i64().unwrap_or(0) != 0)),
        Value::String(s) => Ok(match s.trim() {
            "" | "0" | "false" => 0,
            _ => 1,
        }),
        _ => Err(D::Error::custom("Expected number, bool or string")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub auth: u8,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub exp_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub is_trial: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub active_cons: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub max_connections: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub port: Option<String>,
    #[serde(default)]
    pub server_protocol: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub stream_id: u32,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    // VOD-specific fields
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub rating: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub added: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEntry {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub series_id: u32,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub rating: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfoResponse {
    /// Episodes keyed by season number. Resolved lazily per series; the bulk
    /// `get_series` listing does not carry them.
    #[serde(default)]
    pub episodes: Option<HashMap<String, Vec<SeriesEpisode>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEpisode {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub episode_num: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub season: u32,
    #[serde(default)]
    pub info: Option<EpisodeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub movie_image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Account state as reported by a successful login.
#[derive(Debug, Clone)]
pub struct XtreamAccount {
    pub user_info: UserInfo,
    pub server_info: Option<ServerInfo>,
}

/// The slice of account metadata the display layer shows alongside a loaded
/// catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub status: String,
    pub exp_date: Option<String>,
    pub active_cons: Option<String>,
    pub max_connections: Option<String>,
}

impl AccountSummary {
    fn from_user_info(user_info: &UserInfo) -> Self {
        Self {
            status: user_info.status.clone(),
            exp_date: user_info.exp_date.clone(),
            active_cons: user_info.active_cons.clone(),
            max_connections: user_info.max_connections.clone(),
        }
    }
}

/// Everything `load_all` produces: the normalized catalog in the same shape
/// the M3U parser emits, plus the credentials needed for lazy episode
/// resolution and the account metadata from the login call.
#[derive(Debug, Clone)]
pub struct XtreamLoad {
    pub epg_url: String,
    pub catalog: Catalog,
    pub credentials: Credentials,
    pub account: AccountSummary,
}

/// How live stream URLs are synthesized. Most panels serve HLS under
/// `/live/{user}/{pass}/{id}.m3u8`; older ones expect the bare
/// `/{user}/{pass}/{id}` form with no path segment or extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveUrlStyle {
    #[default]
    Hls,
    Legacy,
}

/// Client for the Xtream-Codes `player_api.php` protocol. All I/O goes
/// through the injected [`Fetcher`]; this type only builds URLs and reshapes
/// JSON into the catalog schema.
#[derive(Debug, Clone)]
pub struct XtreamClient<F> {
    fetcher: F,
    credentials: Credentials,
    base: String,
    live_url_style: LiveUrlStyle,
}

impl<F: Fetcher> XtreamClient<F> {
    pub fn new(fetcher: F, credentials: Credentials) -> Result<Self, XtreamError> {
        let base = normalize_server(&credentials.server);
        Url::parse(&base)?;
        Ok(Self {
            fetcher,
            credentials,
            base,
            live_url_style: LiveUrlStyle::default(),
        })
    }

    pub fn with_live_url_style(mut self, style: LiveUrlStyle) -> Self {
        self.live_url_style = style;
        self
    }

    fn player_api_url(&self, action: Option<&str>) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}",
            self.base,
            encode(&self.credentials.username),
            encode(&self.credentials.password)
        );
        if let Some(action) = action {
            url.push_str("&action=");
            url.push_str(action);
        }
        url
    }

    async fn fetch_json<T>(&self, url: &str) -> Result<T, XtreamError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let text = self.fetcher.fetch_text(url).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// One listing call. Any failure here is absorbed into an empty list: a
    /// provider with no series content, or one flaking on a single action,
    /// must not take down the rest of the catalog.
    async fn list<T>(&self, action: &str) -> Vec<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.player_api_url(Some(action));
        match self.fetch_json::<Vec<T>>(&url).await {
            Ok(items) => items,
            Err(e) => {
                warn!(action, error = %e, "listing call failed, continuing with empty list");
                Vec::new()
            }
        }
    }

    /// Validates the credentials against the provider. The three rejection
    /// kinds are distinct: `auth = 0` means bad credentials, while a
    /// disabled or expired `status` is reported even when `auth = 1`.
    pub async fn login(&self) -> Result<XtreamAccount, XtreamError> {
        let url = self.player_api_url(None);
        debug!(server = %self.base, "logging in");
        let response: LoginResponse = self.fetch_json(&url).await?;

        let user_info = response.user_info.ok_or(XtreamError::MalformedLogin)?;
        if user_info.auth == 0 {
            return Err(AuthError::InvalidCredentials.into());
        }
        match user_info.status.as_str() {
            "Disabled" => return Err(AuthError::Disabled.into()),
            "Expired" => return Err(AuthError::Expired.into()),
            _ => {}
        }

        Ok(XtreamAccount {
            user_info,
            server_info: response.server_info,
        })
    }

    /// Logs in, then fetches the six category/stream listings concurrently
    /// and reshapes them into the catalog schema the M3U parser produces.
    ///
    /// The login call is the gate: its failure aborts everything. The six
    /// listing calls are isolated from each other, so one failing branch
    /// only shrinks the catalog.
    pub async fn load_all(&self) -> Result<XtreamLoad, XtreamError> {
        let account = self.login().await?;

        let (live_categories, live_streams, vod_categories, vod_streams, series_categories, series_list) = tokio::join!(
            self.list::<Category>("get_live_categories"),
            self.list::<Stream>("get_live_streams"),
            self.list::<Category>("get_vod_categories"),
            self.list::<Stream>("get_vod_streams"),
            self.list::<Category>("get_series_categories"),
            self.list::<SeriesEntry>("get_series"),
        );

        let live_groups = category_map(&live_categories);
        let vod_groups = category_map(&vod_categories);
        let series_groups = category_map(&series_categories);

        let mut builder = CatalogBuilder::new();

        for stream in &live_streams {
            let group = lookup_group(&live_groups, stream.category_id.as_deref());
            builder.push(ContentItem {
                id: format!("xt_{}", stream.stream_id),
                tvg_id: stream.epg_channel_id.clone().unwrap_or_default(),
                tvg_name: stream.name.clone(),
                name: display_name(&stream.name),
                logo: stream.stream_icon.clone().unwrap_or_default(),
                group,
                url: self.live_stream_url(stream.stream_id),
                kind: ContentType::Live,
                series_id: None,
                rating: None,
                plot: None,
                added: None,
            });
        }

        for stream in &vod_streams {
            let group = lookup_group(&vod_groups, stream.category_id.as_deref());
            builder.push(ContentItem {
                id: format!("vod_{}", stream.stream_id),
                tvg_id: String::new(),
                tvg_name: String::new(),
                name: display_name(&stream.name),
                logo: stream.stream_icon.clone().unwrap_or_default(),
                group,
                url: self.vod_stream_url(stream.stream_id, stream.container_extension.as_deref()),
                kind: ContentType::Vod,
                series_id: None,
                rating: stream.rating.clone(),
                plot: None,
                added: stream.added.clone(),
            });
        }

        for entry in &series_list {
            let group = lookup_group(&series_groups, entry.category_id.as_deref());
            builder.push(ContentItem {
                id: format!("sr_{}", entry.series_id),
                tvg_id: String::new(),
                tvg_name: String::new(),
                name: display_name(&entry.name),
                logo: entry.cover.clone().unwrap_or_default(),
                group,
                // Series have no playable URL of their own; episodes are
                // resolved lazily through series_episodes.
                url: String::new(),
                kind: ContentType::Series,
                series_id: Some(entry.series_id),
                rating: entry.rating.clone(),
                plot: entry.plot.clone(),
                added: None,
            });
        }

        Ok(XtreamLoad {
            epg_url: self.epg_url(),
            catalog: builder.finish(),
            credentials: self.credentials.clone(),
            account: AccountSummary::from_user_info(&account.user_info),
        })
    }

    /// Fetches the season/episode map for one series.
    pub async fn get_series_info(&self, series_id: u32) -> Result<SeriesInfoResponse, XtreamError> {
        let url = format!(
            "{}&series_id={}",
            self.player_api_url(Some("get_series_info")),
            series_id
        );
        self.fetch_json(&url).await
    }

    /// Expands a series catalog entry into playable episode items, ordered
    /// by season then source order. Episode items play like VOD.
    pub async fn series_episodes(&self, series: &ContentItem) -> Result<Vec<ContentItem>, XtreamError> {
        let Some(series_id) = series.series_id else {
            return Ok(Vec::new());
        };
        let info = self.get_series_info(series_id).await?;
        let Some(episodes) = info.episodes else {
            return Ok(Vec::new());
        };

        let mut seasons: Vec<(u32, Vec<SeriesEpisode>)> = episodes
            .into_iter()
            .map(|(season, eps)| (season.trim().parse::<u32>().unwrap_or(u32::MAX), eps))
            .collect();
        seasons.sort_by_key(|(number, _)| *number);

        let mut items = Vec::new();
        for (_, eps) in seasons {
            for ep in eps {
                let title = if ep.title.is_empty() {
                    format!("Episode {}", ep.episode_num)
                } else {
                    ep.title.clone()
                };
                let plot = ep.info.as_ref().and_then(|i| i.plot.clone());
                items.push(ContentItem {
                    id: format!("ep_{}", ep.id),
                    tvg_id: String::new(),
                    tvg_name: String::new(),
                    name: format!("{} - {}", series.name, title),
                    logo: series.logo.clone(),
                    group: series.group.clone(),
                    url: self.episode_stream_url(&ep.id, ep.container_extension.as_deref()),
                    kind: ContentType::Vod,
                    series_id: Some(series_id),
                    rating: ep.info.as_ref().and_then(|i| i.rating.clone()),
                    plot,
                    added: None,
                });
            }
        }
        Ok(items)
    }

    pub fn live_stream_url(&self, stream_id: u32) -> String {
        match self.live_url_style {
            LiveUrlStyle::Hls => format!(
                "{}/live/{}/{}/{}.m3u8",
                self.base, self.credentials.username, self.credentials.password, stream_id
            ),
            LiveUrlStyle::Legacy => format!(
                "{}/{}/{}/{}",
                self.base, self.credentials.username, self.credentials.password, stream_id
            ),
        }
    }

    pub fn vod_stream_url(&self, stream_id: u32, extension: Option<&str>) -> String {
        let ext = extension.unwrap_or("mp4");
        format!(
            "{}/movie/{}/{}/{}.{}",
            self.base, self.credentials.username, self.credentials.password, stream_id, ext
        )
    }

    pub fn episode_stream_url(&self, episode_id: &str, extension: Option<&str>) -> String {
        let ext = extension.unwrap_or("mp4");
        format!(
            "{}/series/{}/{}/{}.{}",
            self.base, self.credentials.username, self.credentials.password, episode_id, ext
        )
    }

    /// EPG endpoint for this account. Built from the server string the user
    /// entered, not the one the login response reports: provider-reported
    /// hostnames frequently omit the port and are unreachable.
    pub fn epg_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.base,
            encode(&self.credentials.username),
            encode(&self.credentials.password)
        )
    }
}

fn category_map(categories: &[Category]) -> HashMap<&str, &str> {
    categories
        .iter()
        .filter_map(|c| {
            c.category_id
                .as_deref()
                .map(|id| (id, c.category_name.as_str()))
        })
        .collect()
}

fn lookup_group(map: &HashMap<&str, &str>, category_id: Option<&str>) -> String {
    category_id
        .and_then(|id| map.get(id))
        .filter(|name| !name.is_empty())
        .map_or_else(|| DEFAULT_GROUP.to_string(), |name| (*name).to_string())
}

fn display_name(name: &str) -> String {
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        name.to_string()
    }
}

/// Normalizes a user-entered server string: trims whitespace, defaults to
/// `http://` when no scheme is given and strips trailing slashes. Applied
/// identically everywhere a server string is used so the same input always
/// yields consistent URLs.
pub fn normalize_server(raw: &str) -> String {
    let mut server = raw.trim().to_string();
    if !server.starts_with("http://") && !server.starts_with("https://") {
        server = format!("http://{server}");
    }
    server.trim_end_matches('/').to_string()
}
