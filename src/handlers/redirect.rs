use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::{recovery, AppState};

// GET /r
//
// The provider can only redirect to a plain path, while the site routes with
// a fragment. This hop carries the session token across: 302 onto the
// fragment route, with the token re-encoded, or onto the landing route when
// the query has no token.
pub async fn success_bridge(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let target = bridge_target(&state.config.site_url, query.as_deref());
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, target),
            // An intermediate hop carrying a one-shot token must never be
            // served from cache
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
}

fn bridge_target(site_url: &str, query: Option<&str>) -> String {
    let site = site_url.trim_end_matches('/');
    let token = query
        .map(|q| format!("/?{}", q))
        .and_then(|location| recovery::extract_session_token(&location));

    match token {
        Some(token) => {
            let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            format!("{}/#/success?session_id={}", site, encoded)
        }
        None => format!("{}/#/", site),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_carried_onto_the_fragment_route() {
        assert_eq!(
            bridge_target(
                "https://luggagedepositrome.com",
                Some("session_id=cs_test_a1b2")
            ),
            "https://luggagedepositrome.com/#/success?session_id=cs_test_a1b2"
        );
    }

    #[test]
    fn missing_token_lands_on_the_home_route() {
        assert_eq!(
            bridge_target("https://luggagedepositrome.com/", None),
            "https://luggagedepositrome.com/#/"
        );
        assert_eq!(
            bridge_target("https://luggagedepositrome.com", Some("utm_source=stripe")),
            "https://luggagedepositrome.com/#/"
        );
    }

    #[test]
    fn token_is_reencoded_for_the_fragment_query() {
        assert_eq!(
            bridge_target("https://site.example", Some("session_id=cs%20odd")),
            "https://site.example/#/success?session_id=cs+odd"
        );
    }
}
