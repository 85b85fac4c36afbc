//! start.gg GraphQL API, see <https://developer.start.gg/docs/intro>

use {
    graphql_client::QueryBody,
    serde::Serialize,
    url::Url,
    crate::{
        import::{
            BracketResetDetector,
            Entrant,
            Error,
            Imported,
            Normalize,
            Platform,
            Tournament,
            unique_placements,
        },
        prelude::*,
    },
};

const QUERY: &str = "
query TournamentEventQuery($tournament: String, $event: String) {
    tournament(slug: $tournament) {
        name
    }
    event(slug: $event) {
        name
        slug
        entrants(query: { page: 1, perPage: 500 }) {
            pageInfo {
                total
            }
            nodes {
                name
                standing {
                    placement
                }
            }
        }
        sets(page: 1, perPage: 3, sortType: RECENT) {
            nodes {
                fullRoundText
                winnerId
            }
        }
    }
}
";

/// Must match the `perPage` argument of the entrants connection in [`QUERY`].
const ENTRANTS_PER_PAGE: usize = 500;

/// Extracts the tournament and event slugs from a URL like `https://start.gg/tournament/<tournament>/event/<event>`.
/// Further path segments (like `/standings`) are ignored.
pub(crate) fn parse_slugs(url: &Url) -> Result<(String, String), Error> {
    let segments = url.path_segments().into_iter().flatten().collect_vec();
    if let ["tournament", tournament, "event", event, ..] = *segments {
        if !tournament.is_empty() && !event.is_empty() {
            return Ok((tournament.to_owned(), event.to_owned()))
        }
    }
    Err(Error::MalformedUrl { platform: Platform::StartGG, expected: "an event" })
}

#[derive(Debug, Serialize)]
pub(crate) struct Variables {
    tournament: String,
    /// start.gg resolves events by their full slug, which includes the tournament slug.
    event: String,
}

impl Variables {
    fn new(tournament: &str, event: &str) -> Self {
        Self {
            tournament: tournament.to_owned(),
            event: format!("tournament/{tournament}/event/{event}"),
        }
    }
}

pub(crate) fn request(http_client: &reqwest::Client, api_key: &str, tournament: &str, event: &str) -> reqwest::RequestBuilder {
    http_client.post("https://api.start.gg/gql/alpha")
        .bearer_auth(api_key)
        .json(&QueryBody {
            variables: Variables::new(tournament, event),
            query: QUERY,
            operation_name: "TournamentEventQuery",
        })
}

pub(crate) type Response = graphql_client::Response<ResponseData>;

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseData {
    tournament: Option<TournamentData>,
    event: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct TournamentData {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    name: Option<String>,
    slug: Option<String>,
    entrants: Option<Connection<EntrantData>>,
    sets: Option<Connection<Set>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    /// Only requested for entrants.
    #[serde(default)]
    page_info: Option<PageInfo>,
    #[serde(default = "Vec::default")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EntrantData {
    name: Option<String>,
    standing: Option<Standing>,
}

#[derive(Debug, Deserialize)]
struct Standing {
    placement: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Set {
    full_round_text: Option<String>,
    winner_id: Option<i64>,
}

pub(crate) struct StartGG;

impl BracketResetDetector for StartGG {
    type Match = Set;

    /// Only the most recent sets are requested, which include both grand final sets if there was a reset.
    fn detect_bracket_reset(sets: &[Set]) -> bool {
        let by_round = |round| sets.iter().find(|set| set.full_round_text.as_deref() == Some(round));
        let (Some(reset), Some(grand_final)) = (by_round("Grand Final Reset"), by_round("Grand Final")) else { return false };
        reset.winner_id.is_some() && grand_final.winner_id.is_some() && reset.winner_id != grand_final.winner_id
    }
}

impl Normalize for Response {
    fn normalize(self) -> Result<Imported, Error> {
        let malformed = |reason: &'static str| Error::MalformedResponse { platform: Platform::StartGG, reason: Cow::Borrowed(reason) };
        let graphql_client::Response { data, errors, .. } = self;
        if let Some(errors) = errors.filter(|errors| !errors.is_empty()) {
            return Err(Error::MalformedResponse {
                platform: Platform::StartGG,
                reason: Cow::Owned(format!("GraphQL errors: {}", errors.iter().map(|error| &error.message).join(", "))),
            })
        }
        let ResponseData { tournament, event } = data.ok_or_else(|| malformed("GraphQL response returned neither `data` nor `errors`"))?;
        let tournament_name = tournament.and_then(|tournament| tournament.name).ok_or_else(|| malformed("no such tournament"))?;
        let EventData { name: event_name, slug, entrants, sets } = event.ok_or_else(|| malformed("no such event"))?;
        let event_name = event_name.ok_or_else(|| malformed("event has no name"))?;
        let slug = slug.ok_or_else(|| malformed("event has no slug"))?;
        let entrants = entrants.map(|Connection { page_info, nodes }| -> Result<_, Error> {
            if let Some(total) = page_info.and_then(|page_info| page_info.total) {
                if total > nodes.len() {
                    return Err(Error::MalformedResponse {
                        platform: Platform::StartGG,
                        reason: Cow::Owned(format!("event has {total} entrants but only {} could be fetched (at most {ENTRANTS_PER_PAGE} are supported)", nodes.len())),
                    })
                }
            }
            Ok(nodes)
        }).transpose()?.unwrap_or_default()
            .into_iter()
            .map(|EntrantData { name, standing }| -> Result<_, Error> {
                Ok(Entrant {
                    placement: standing.and_then(|standing| standing.placement).ok_or_else(|| malformed("entrant has no standing, is the event complete?"))?,
                    name: name.ok_or_else(|| malformed("entrant has no name"))?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let sets = sets.map(|sets| sets.nodes).unwrap_or_default();
        Ok(Imported {
            tournament: Tournament {
                name: format!("{tournament_name} - {event_name}"),
                url: format!("https://start.gg/{slug}"),
                bracket_reset: StartGG::detect_bracket_reset(&sets),
                placements: unique_placements(entrants.iter().map(|entrant| entrant.placement)),
            },
            entrants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(json: &str) -> Imported {
        serde_json::from_str::<Response>(json).unwrap().normalize().unwrap()
    }

    #[test]
    fn reset_with_points() {
        let Imported { tournament, entrants } = fixture(include_str!("../../assets/test/startgg/reset-with-points.json"));
        assert_eq!(tournament.name, "Shinto Series: Smash #1 - Singles 1v1");
        assert_eq!(tournament.url, "https://start.gg/tournament/shinto-series-smash-1/event/singles-1v1");
        assert!(tournament.bracket_reset);
        assert_eq!(tournament.placements, [97, 65, 49, 33, 25, 17, 13, 9, 7, 5, 4, 3, 2, 1]);
        assert_eq!(entrants.len(), 128);
    }

    #[test]
    fn reset_no_points() {
        let Imported { tournament, entrants } = fixture(include_str!("../../assets/test/startgg/reset-no-points.json"));
        assert_eq!(tournament.name, "Wrangler Rumble #1 - Ultimate Singles");
        assert_eq!(tournament.url, "https://start.gg/tournament/wrangler-rumble-1/event/ultimate-singles");
        assert!(!tournament.bracket_reset);
        assert_eq!(tournament.placements, [13, 9, 7, 5, 4, 3, 2, 1]);
        assert_eq!(entrants.len(), 13);
    }

    #[test]
    fn missing_tournament() {
        let err = serde_json::from_str::<Response>(r#"{"data": {"tournament": null, "event": null}}"#).unwrap().normalize().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { platform: Platform::StartGG, .. }));
    }

    #[test]
    fn graphql_errors() {
        let json = r#"{"data": null, "errors": [{"message": "Invalid authentication token"}]}"#;
        let err = serde_json::from_str::<Response>(json).unwrap().normalize().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { platform: Platform::StartGG, ref reason } if reason.contains("Invalid authentication token")));
    }

    #[test]
    fn entrant_without_standing() {
        let json = r#"{"data": {
            "tournament": {"name": "Wrangler Rumble #2"},
            "event": {"name": "Ultimate Singles", "slug": "tournament/wrangler-rumble-2/event/ultimate-singles", "entrants": {"nodes": [
                {"name": "a", "standing": {"placement": 1}},
                {"name": "b", "standing": null}
            ]}, "sets": {"nodes": []}}
        }}"#;
        assert!(serde_json::from_str::<Response>(json).unwrap().normalize().is_err());
    }

    #[test]
    fn too_many_entrants() {
        let json = r#"{"data": {
            "tournament": {"name": "Shinto Series: Smash #2"},
            "event": {"name": "Singles 1v1", "slug": "tournament/shinto-series-smash-2/event/singles-1v1", "entrants": {
                "pageInfo": {"total": 612},
                "nodes": [{"name": "a", "standing": {"placement": 1}}]
            }, "sets": {"nodes": []}}
        }}"#;
        let err = serde_json::from_str::<Response>(json).unwrap().normalize().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { platform: Platform::StartGG, ref reason } if reason.contains("612")));
    }

    #[test]
    fn entrant_page_size_matches_query() {
        assert!(QUERY.contains(&format!("perPage: {ENTRANTS_PER_PAGE}")));
    }

    fn set(round: &str, winner: i64) -> Set {
        Set { full_round_text: Some(round.to_owned()), winner_id: Some(winner) }
    }

    #[test]
    fn reset_heuristic() {
        assert!(StartGG::detect_bracket_reset(&[set("Grand Final Reset", 2), set("Grand Final", 1), set("Losers Final", 1)]));
        assert!(!StartGG::detect_bracket_reset(&[set("Grand Final Reset", 2), set("Grand Final", 2), set("Losers Final", 2)]));
        assert!(!StartGG::detect_bracket_reset(&[set("Grand Final", 1), set("Losers Final", 2), set("Losers Semi-Final", 2)]));
        // the grand final set fell out of the recent sets
        assert!(!StartGG::detect_bracket_reset(&[set("Grand Final Reset", 2), set("Losers Final", 1)]));
        assert!(!StartGG::detect_bracket_reset(&[]));
    }

    #[test]
    fn parse_slugs_paths() {
        let parse = |url: &str| parse_slugs(&Url::parse(url).unwrap());
        assert_eq!(parse("https://start.gg/tournament/shinto-series-smash-1/event/singles-1v1").unwrap(), (format!("shinto-series-smash-1"), format!("singles-1v1")));
        assert!(parse("https://start.gg/tournament/shinto-series-smash-1").is_err());
        assert!(parse("https://start.gg/tournament/shinto-series-smash-1/event/").is_err());
        assert_eq!(parse("https://start.gg/tournament/shinto-series-smash-1/event/singles-1v1/standings").unwrap(), (format!("shinto-series-smash-1"), format!("singles-1v1")));
    }

    #[derive(Deserialize)]
    struct SentBody {
        query: String,
        #[serde(rename = "operationName")]
        operation_name: String,
        variables: SentVariables,
    }

    #[derive(Deserialize)]
    struct SentVariables {
        tournament: String,
        event: String,
    }

    #[test]
    fn request_body_and_auth() {
        let request = request(&reqwest::Client::new(), "api-key", "shinto-series-smash-1", "singles-1v1").build().unwrap();
        assert_eq!(*request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), "https://api.start.gg/gql/alpha");
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer api-key");
        assert_eq!(request.headers()[reqwest::header::CONTENT_TYPE], "application/json");
        let body = serde_json::from_slice::<SentBody>(request.body().and_then(|body| body.as_bytes()).unwrap()).unwrap();
        assert_eq!(body.query, QUERY);
        assert_eq!(body.operation_name, "TournamentEventQuery");
        assert_eq!(body.variables.tournament, "shinto-series-smash-1");
        assert_eq!(body.variables.event, "tournament/shinto-series-smash-1/event/singles-1v1");
    }
}
