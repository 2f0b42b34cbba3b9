use crate::error::{Error, Result};
use crate::understat::types::{FixtureRecord, LeagueData, ResultRecord, UnderstatMatch};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Records parsed from one league page, plus a note for every entry that was dropped.
#[derive(Debug, Default)]
pub struct FetchBatch<T> {
    pub records: Vec<T>,
    pub skipped: Vec<String>,
}

pub struct UnderstatClient {
    client: Client,
    base_url: Url,
    league: String,
}

impl UnderstatClient {
    pub fn new(base_url: &str, league: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        // join() replaces the last path segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::SourceUnavailable(format!("invalid base url '{}': {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            league: league.to_string(),
        })
    }

    pub fn league(&self) -> &str {
        &self.league
    }

    pub fn league_url(&self, season: &str) -> Result<Url> {
        if !is_valid_season(season) {
            return Err(Error::MalformedRecord(format!("invalid season '{}'", season)));
        }
        self.base_url
            .join(&format!("league/{}/{}", self.league, season))
            .map_err(|e| Error::SourceUnavailable(e.to_string()))
    }

    /// Upcoming matches listed on the season page.
    pub async fn fetch_fixtures(&self, season: &str) -> Result<FetchBatch<FixtureRecord>> {
        let entries = self.fetch_league(season).await?;
        let batch = split_entries(entries, false, |m| m.to_fixture(season));
        info!(
            "📅 {} {}: {} fixtures parsed, {} skipped",
            self.league,
            season,
            batch.records.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }

    /// Completed matches with scores and xG.
    pub async fn fetch_results(&self, season: &str) -> Result<FetchBatch<ResultRecord>> {
        let entries = self.fetch_league(season).await?;
        let batch = split_entries(entries, true, UnderstatMatch::to_result);
        info!(
            "🏁 {} {}: {} results parsed, {} skipped",
            self.league,
            season,
            batch.records.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }

    async fn fetch_league(&self, season: &str) -> Result<Vec<Value>> {
        let url = self.league_url(season)?;
        debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Understat error: {} for {}", status, url);
            return Err(Error::SourceUnavailable(format!("{} returned {}", url, status)));
        }

        extract_dates(&body)
    }
}

/// Understat seasons are the starting year of the campaign, e.g. `2023`.
pub fn is_valid_season(season: &str) -> bool {
    season.len() == 4 && season.bytes().all(|b| b.is_ascii_digit())
}

/// Keeps entries whose `isResult` matches `want_results` and converts them, skipping bad ones.
fn split_entries<T, F>(entries: Vec<Value>, want_results: bool, convert: F) -> FetchBatch<T>
where
    F: Fn(&UnderstatMatch) -> Result<T>,
{
    let mut batch = FetchBatch {
        records: Vec::new(),
        skipped: Vec::new(),
    };

    for entry in entries {
        let parsed = match serde_json::from_value::<UnderstatMatch>(entry) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping unparsable Understat entry: {}", e);
                batch.skipped.push(e.to_string());
                continue;
            }
        };

        if parsed.is_result != want_results {
            continue;
        }

        match convert(&parsed) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                warn!("Skipping record: {}", e);
                batch.skipped.push(e.to_string());
            }
        }
    }

    batch
}

fn dates_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"datesData\s*=\s*JSON\.parse\(\s*'((?:[^'\\]|\\.)*)'\s*\)"#)
            .expect("datesData pattern compiles")
    })
}

/// Pulls the match list out of either the league HTML page or the bare JSON endpoint.
pub fn extract_dates(body: &str) -> Result<Vec<Value>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        let data: LeagueData = serde_json::from_str(trimmed)
            .map_err(|e| Error::SourceUnavailable(format!("unexpected league JSON: {}", e)))?;
        return Ok(data.dates);
    }

    let captures = dates_pattern()
        .captures(body)
        .ok_or_else(|| Error::SourceUnavailable("page has no datesData payload".to_string()))?;

    let decoded = decode_js_string(&captures[1]);
    serde_json::from_str(&decoded)
        .map_err(|e| Error::SourceUnavailable(format!("datesData is not a JSON array: {}", e)))
}

/// Undoes the escaping inside a single-quoted JS string literal.
///
/// `\xNN` escapes are collected as raw bytes so multi-byte UTF-8 sequences survive.
pub fn decode_js_string(raw: &str) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => out.push(byte),
                    Err(_) => {
                        out.extend_from_slice(b"\\x");
                        out.extend_from_slice(hex.as_bytes());
                    }
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
                    }
                    None => {
                        out.extend_from_slice(b"\\u");
                        out.extend_from_slice(hex.as_bytes());
                    }
                }
            }
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('r') => out.push(b'\r'),
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
