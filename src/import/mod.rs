//! Importing completed tournaments from third-party bracket platforms.
//!
//! Each platform module builds the API request for a tournament, deserializes the response into typed structs,
//! then maps those onto the platform-independent [`Imported`] model. Tournaments are assumed to be complete and double elimination.

use {
    serde::de::DeserializeOwned,
    url::Url,
    crate::{
        config::ConfigChallonge,
        prelude::*,
    },
};

pub(crate) mod challonge;
pub(crate) mod startgg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Platform {
    Challonge,
    StartGG,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Challonge => write!(f, "Challonge"),
            Self::StartGG => write!(f, "start.gg"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("not a valid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unrecognized host: {0:?}")]
    UnrecognizedSource(String),
    #[error("this {platform} URL does not point to {expected}")]
    MalformedUrl {
        platform: Platform,
        expected: &'static str,
    },
    #[error("unexpected {platform} response: {reason}")]
    MalformedResponse {
        platform: Platform,
        reason: Cow<'static, str>,
    },
    #[error("could not get data from {platform}: {inner}{}", ResponseSnippet(.body.as_deref()))]
    UpstreamUnavailable {
        platform: Platform,
        #[source]
        inner: reqwest::Error,
        /// The response body, if the platform answered with an error status.
        body: Option<String>,
    },
}

/// The start of an error response body, for error messages.
struct ResponseSnippet<'a>(Option<&'a str>);

impl ResponseSnippet<'_> {
    const MAX_CHARS: usize = 200;
}

impl fmt::Display for ResponseSnippet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(body) = self.0.map(str::trim).filter(|body| !body.is_empty()) else { return Ok(()) };
        write!(f, " (response: ")?;
        if body.chars().count() > Self::MAX_CHARS {
            write!(f, "{}…", body.chars().take(Self::MAX_CHARS).collect::<String>())?;
        } else {
            write!(f, "{body}")?;
        }
        write!(f, ")")
    }
}

impl IsNetworkError for Error {
    fn is_network_error(&self) -> bool {
        match self {
            Self::Url(_) | Self::UnrecognizedSource(_) | Self::MalformedUrl { .. } | Self::MalformedResponse { .. } => false,
            Self::UpstreamUnavailable { .. } => true,
        }
    }
}

/// Where a tournament URL points to, with the platform-specific key needed to request it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Source {
    Challonge {
        tournament: String,
    },
    StartGG {
        tournament: String,
        event: String,
    },
}

impl Source {
    /// Selects the platform based on the URL's host. Nothing is requested from the network.
    pub(crate) fn from_url(url: &str) -> Result<Self, Error> {
        let url = url.trim();
        let url = match Url::parse(url) {
            Ok(url) => url,
            // allow pasting URLs without a scheme
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{url}"))?,
            Err(e) => return Err(e.into()),
        };
        let host = url.host_str().unwrap_or_default();
        Ok(match host.strip_prefix("www.").unwrap_or(host) {
            "challonge.com" => Self::Challonge { tournament: challonge::parse_id(&url, None)? },
            "start.gg" | "smash.gg" => {
                let (tournament, event) = startgg::parse_slugs(&url)?;
                Self::StartGG { tournament, event }
            }
            host => if let Some(community) = host.strip_suffix(".challonge.com") {
                Self::Challonge { tournament: challonge::parse_id(&url, Some(community))? }
            } else {
                return Err(Error::UnrecognizedSource(host.to_owned()))
            },
        })
    }
}

/// A tournament as reported by its platform, before it has an ID or a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tournament {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) bracket_reset: bool,
    /// Unique placements, worst first.
    pub(crate) placements: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entrant {
    pub(crate) name: String,
    pub(crate) placement: i32,
}

#[derive(Debug)]
pub(crate) struct Imported {
    pub(crate) tournament: Tournament,
    pub(crate) entrants: Vec<Entrant>,
}

/// A platform's heuristic for whether the second-place finisher made a bracket reset.
///
/// The platforms expose different data about the grand final, so the heuristics are not equivalent.
pub(crate) trait BracketResetDetector {
    type Match;

    fn detect_bracket_reset(matches: &[Self::Match]) -> bool;
}

/// A typed API response which can be mapped onto the platform-independent model.
pub(crate) trait Normalize {
    fn normalize(self) -> Result<Imported, Error>;
}

/// Returns the distinct placements, worst first. Ties share a placement, so duplicates are expected.
pub(crate) fn unique_placements(placements: impl IntoIterator<Item = i32>) -> Vec<i32> {
    placements.into_iter()
        .sorted_unstable_by_key(|&placement| Reverse(placement))
        .dedup()
        .collect()
}

fn parse_body<T: DeserializeOwned>(platform: Platform, body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse { platform, reason: e.to_string().into() })
}

async fn fetch_json<T: DeserializeOwned>(platform: Platform, request: reqwest::RequestBuilder) -> Result<T, Error> {
    let response = request.send().await.map_err(|inner| Error::UpstreamUnavailable { platform, inner, body: None })?;
    let status_error = response.error_for_status_ref().err();
    if let Some(inner) = status_error {
        let body = response.text().await.ok();
        return Err(Error::UpstreamUnavailable { platform, inner, body })
    }
    let body = response.text().await.map_err(|inner| Error::UpstreamUnavailable { platform, inner, body: None })?;
    parse_body(platform, &body)
}

/// Fetches tournaments using the shared HTTP client, whose timeout is configured at startup. Failed requests are not retried.
pub(crate) struct Importer {
    http_client: reqwest::Client,
    challonge: ConfigChallonge,
    startgg_key: String,
}

impl Importer {
    pub(crate) fn new(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            challonge: config.challonge.clone(),
            startgg_key: config.startgg.clone(),
        }
    }

    pub(crate) async fn import(&self, url: &str) -> Result<Imported, Error> {
        match Source::from_url(url)? {
            Source::Challonge { tournament } => {
                let request = challonge::request(&self.http_client, &self.challonge, &tournament);
                fetch_json::<challonge::Response>(Platform::Challonge, request).await?.normalize()
            }
            Source::StartGG { tournament, event } => {
                let request = startgg::request(&self.http_client, &self.startgg_key, &tournament, &event);
                fetch_json::<startgg::Response>(Platform::StartGG, request).await?.normalize()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_placements_sorted_descending() {
        assert_eq!(unique_placements([7, 7, 5, 5, 4, 3, 2, 1]), [7, 5, 4, 3, 2, 1]);
        assert_eq!(unique_placements([1, 3, 2, 5, 3, 5, 9, 4, 7, 5, 7, 9]), [9, 7, 5, 4, 3, 2, 1]);
        assert_eq!(unique_placements([1]), [1]);
        assert!(unique_placements([]).is_empty());
    }

    #[test]
    fn unique_placements_strictly_descending() {
        let placements = [17, 1, 13, 9, 17, 2, 5, 7, 3, 13, 17, 4, 9, 5, 17, 7, 9, 13, 9, 13];
        let unique = unique_placements(placements);
        assert!(unique.windows(2).all(|pair| pair[0] > pair[1]));
        assert!(placements.iter().all(|placement| unique.contains(placement)));
        assert_eq!(unique.len(), placements.iter().unique().count());
    }

    #[test]
    fn challonge_urls() {
        assert_eq!(Source::from_url("https://challonge.com/kpqlgghc").unwrap(), Source::Challonge { tournament: format!("kpqlgghc") });
        assert_eq!(Source::from_url("https://www.challonge.com/8ozc6ffz/standings").unwrap(), Source::Challonge { tournament: format!("8ozc6ffz") });
        assert_eq!(Source::from_url("  challonge.com/t4kq4f5b\n").unwrap(), Source::Challonge { tournament: format!("t4kq4f5b") });
        assert_eq!(Source::from_url("https://ssc.challonge.com/gg9").unwrap(), Source::Challonge { tournament: format!("ssc-gg9") });
        assert!(matches!(Source::from_url("https://challonge.com/"), Err(Error::MalformedUrl { platform: Platform::Challonge, .. })));
    }

    #[test]
    fn startgg_urls() {
        let shinto = Source::StartGG { tournament: format!("shinto-series-smash-1"), event: format!("singles-1v1") };
        assert_eq!(Source::from_url("https://start.gg/tournament/shinto-series-smash-1/event/singles-1v1").unwrap(), shinto);
        assert_eq!(Source::from_url("https://www.start.gg/tournament/shinto-series-smash-1/event/singles-1v1/overview").unwrap(), shinto);
        assert_eq!(Source::from_url("https://smash.gg/tournament/shinto-series-smash-1/event/singles-1v1").unwrap(), shinto);
        assert!(matches!(Source::from_url("https://start.gg/tournament/shinto-series-smash-1"), Err(Error::MalformedUrl { platform: Platform::StartGG, .. })));
    }

    #[test]
    fn unrecognized_source() {
        assert!(matches!(Source::from_url("https://foo.com/kpqlgghc"), Err(Error::UnrecognizedSource(host)) if host == "foo.com"));
        assert!(matches!(Source::from_url("foo.com"), Err(Error::UnrecognizedSource(host)) if host == "foo.com"));
        assert!(matches!(Source::from_url("https://notchallonge.com/kpqlgghc"), Err(Error::UnrecognizedSource(_))));
        assert!(matches!(Source::from_url("https://"), Err(Error::Url(_))));
    }

    #[rocket::async_test]
    async fn closed_port_is_network_error() {
        // nothing listens on the discard port
        let request = reqwest::Client::new().get("http://127.0.0.1:9/tournaments/kpqlgghc.json");
        let err = fetch_json::<challonge::Response>(Platform::Challonge, request).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { platform: Platform::Challonge, body: None, .. }));
        assert!(err.is_network_error());
    }

    #[test]
    fn unparseable_body_is_malformed() {
        let err = parse_body::<challonge::Response>(Platform::Challonge, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { platform: Platform::Challonge, .. }));
        assert!(!err.is_network_error());
        let err = parse_body::<startgg::Response>(Platform::StartGG, r#"{"data": {"event": 5}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { platform: Platform::StartGG, .. }));
        assert!(!err.is_network_error());
    }

    #[test]
    fn response_snippet() {
        assert_eq!(ResponseSnippet(None).to_string(), "");
        assert_eq!(ResponseSnippet(Some("  \n")).to_string(), "");
        assert_eq!(ResponseSnippet(Some("{\"errors\": [\"Tournament not found\"]}\n")).to_string(), r#" (response: {"errors": ["Tournament not found"]})"#);
        let long = "x".repeat(ResponseSnippet::MAX_CHARS + 50);
        let snippet = ResponseSnippet(Some(&long)).to_string();
        assert!(snippet.ends_with("…)"));
        assert_eq!(snippet.chars().filter(|&c| c == 'x').count(), ResponseSnippet::MAX_CHARS);
    }
}
