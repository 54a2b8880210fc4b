//! Driver-name search against the members data API
//!
//! The data API answers a search with an indirection document: a JSON
//! object whose `link` field holds a short-lived result URL. The rows live
//! behind that link, so a lookup is usually two GETs, the second one
//! unauthenticated.

use iracing_auth::Credential;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Fixed result window: first page, rows 1 through 25.
const SEARCH_LOWERBOUND: u32 = 1;
const SEARCH_UPPERBOUND: u32 = 25;

/// One row of the driver search results.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DriverRecord {
    pub display_name: String,
    pub cust_id: i64,
}

/// Outcome of a name search. Upstream failures are errors, not `NotFound`,
/// so callers can tell an absent driver from an unavailable provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverLookupResult {
    Found {
        display_name: String,
        customer_id: i64,
    },
    NotFound,
}

/// Search the members API for a driver by display name.
///
/// The credential rides on the search request only; the result link is
/// pre-signed and fetched bare. Matching policy: a case-insensitive exact
/// name wins, otherwise the first substring hit in provider order.
pub async fn find_driver_by_name(
    client: &reqwest::Client,
    members_base: &str,
    name: &str,
    credential: &Credential,
) -> Result<DriverLookupResult> {
    let url = format!(
        "{members_base}/data/lookup/drivers?search_term={}&lowerbound={SEARCH_LOWERBOUND}&upperbound={SEARCH_UPPERBOUND}",
        urlencoded(name),
    );
    let response = credential
        .apply_to(client.get(&url))
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    let document = read_json(response).await?;

    let records: Vec<DriverRecord> = match document.get("link").and_then(|l| l.as_str()) {
        Some(link) => {
            debug!(link, "following search result link");
            let response = client
                .get(link)
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            parse_rows(read_json(response).await?)?
        }
        // Some deployments inline the rows instead of linking out
        None => parse_rows(document)?,
    };

    debug!(rows = records.len(), "driver search returned");
    Ok(select_match(name, &records))
}

/// Fail on non-2xx statuses with the upstream body attached, otherwise
/// decode the JSON body.
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(Error::UpstreamStatus {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

fn parse_rows(document: serde_json::Value) -> Result<Vec<DriverRecord>> {
    serde_json::from_value(document).map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// Pick the best row for a searched name: case-insensitive exact match
/// first, then the first row whose name contains the search term.
fn select_match(name: &str, records: &[DriverRecord]) -> DriverLookupResult {
    let needle = name.to_lowercase();

    let best = records
        .iter()
        .find(|record| record.display_name.to_lowercase() == needle)
        .or_else(|| {
            records
                .iter()
                .find(|record| record.display_name.to_lowercase().contains(&needle))
        });

    match best {
        Some(record) => DriverLookupResult::Found {
            display_name: record.display_name.clone(),
            customer_id: record.cust_id,
        },
        None => DriverLookupResult::NotFound,
    }
}

/// Percent-encode a query value. Search terms are arbitrary user text, so
/// everything outside the RFC 3986 unreserved set is escaped.
fn urlencoded(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use axum::Json;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;

    use iracing_auth::CookieJar;

    use super::*;

    fn record(display_name: &str, cust_id: i64) -> DriverRecord {
        DriverRecord {
            display_name: display_name.to_string(),
            cust_id,
        }
    }

    fn cookie_credential() -> Credential {
        Credential::SessionCookie {
            jar: CookieJar::from_set_cookie_values(["authtoken_members=tok123"]),
        }
    }

    #[test]
    fn exact_match_beats_earlier_substring_row() {
        let rows = [record("John Smithsonian", 111), record("John Smith", 222)];
        assert_eq!(
            select_match("John Smith", &rows),
            DriverLookupResult::Found {
                display_name: "John Smith".into(),
                customer_id: 222,
            }
        );
    }

    #[test]
    fn exact_match_ignores_case() {
        let rows = [record("John Smith", 222)];
        assert_eq!(
            select_match("john SMITH", &rows),
            DriverLookupResult::Found {
                display_name: "John Smith".into(),
                customer_id: 222,
            }
        );
    }

    #[test]
    fn substring_fallback_takes_first_row_in_order() {
        let rows = [
            record("Dale Earnhardt Jr", 3001),
            record("Dale Earnhardt Sr", 3002),
        ];
        assert_eq!(
            select_match("dale earnhardt", &rows),
            DriverLookupResult::Found {
                display_name: "Dale Earnhardt Jr".into(),
                customer_id: 3001,
            }
        );
    }

    #[test]
    fn unmatched_name_is_not_found() {
        let rows = [record("John Smith", 222)];
        assert_eq!(select_match("Zzyxx", &rows), DriverLookupResult::NotFound);
        assert_eq!(select_match("Zzyxx", &[]), DriverLookupResult::NotFound);
    }

    struct LookupUpstream {
        link_hits: AtomicU32,
        link_saw_credentials: AtomicBool,
    }

    /// Mock members server. The search route checks the credential and the
    /// fixed window, then points at the result route, which serves `rows`
    /// and records whether the follow-up carried credentials.
    async fn start_lookup_server(
        expected_term: &'static str,
        rows: serde_json::Value,
    ) -> (String, Arc<LookupUpstream>) {
        let upstream = Arc::new(LookupUpstream {
            link_hits: AtomicU32::new(0),
            link_saw_credentials: AtomicBool::new(false),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let link = format!("http://{addr}/cached-results");

        let results_upstream = upstream.clone();
        let app = axum::Router::new()
            .route(
                "/data/lookup/drivers",
                get(
                    move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| {
                        let link = link.clone();
                        async move {
                            if !headers.contains_key(header::COOKIE) {
                                return StatusCode::UNAUTHORIZED.into_response();
                            }
                            if params.get("search_term").map(String::as_str)
                                != Some(expected_term)
                                || params.get("lowerbound").map(String::as_str) != Some("1")
                                || params.get("upperbound").map(String::as_str) != Some("25")
                            {
                                return StatusCode::BAD_REQUEST.into_response();
                            }
                            Json(serde_json::json!({ "link": link })).into_response()
                        }
                    },
                ),
            )
            .route(
                "/cached-results",
                get(move |headers: HeaderMap| {
                    let upstream = results_upstream.clone();
                    async move {
                        upstream.link_hits.fetch_add(1, Ordering::SeqCst);
                        if headers.contains_key(header::COOKIE) {
                            upstream.link_saw_credentials.store(true, Ordering::SeqCst);
                        }
                        Json(rows)
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), upstream)
    }

    #[tokio::test]
    async fn lookup_follows_the_result_link_once_without_credentials() {
        let rows = serde_json::json!([
            { "display_name": "John Smithsonian", "cust_id": 111, "club_name": "Texas" },
            { "display_name": "John Smith", "cust_id": 222, "club_name": "Georgia" },
        ]);
        let (base, upstream) = start_lookup_server("John Smith", rows).await;

        let client = reqwest::Client::new();
        let result = find_driver_by_name(&client, &base, "John Smith", &cookie_credential())
            .await
            .unwrap();

        assert_eq!(
            result,
            DriverLookupResult::Found {
                display_name: "John Smith".into(),
                customer_id: 222,
            }
        );
        assert_eq!(upstream.link_hits.load(Ordering::SeqCst), 1);
        assert!(!upstream.link_saw_credentials.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn search_terms_survive_percent_encoding() {
        let rows = serde_json::json!([
            { "display_name": "Søren Kierkegaard", "cust_id": 42 },
        ]);
        let (base, _) = start_lookup_server("Søren Kierkegaard", rows).await;

        let client = reqwest::Client::new();
        let result =
            find_driver_by_name(&client, &base, "Søren Kierkegaard", &cookie_credential())
                .await
                .unwrap();
        assert!(matches!(result, DriverLookupResult::Found { .. }));
    }

    #[tokio::test]
    async fn absent_driver_is_not_found_rather_than_error() {
        let rows = serde_json::json!([
            { "display_name": "John Smith", "cust_id": 222 },
        ]);
        let (base, _) = start_lookup_server("Zzyxx", rows).await;

        let client = reqwest::Client::new();
        let result = find_driver_by_name(&client, &base, "Zzyxx", &cookie_credential())
            .await
            .unwrap();
        assert_eq!(result, DriverLookupResult::NotFound);
    }

    #[tokio::test]
    async fn inline_rows_without_link_are_accepted() {
        let rows = serde_json::json!([
            { "display_name": "John Smith", "cust_id": 222 },
        ]);
        let app = axum::Router::new().route(
            "/data/lookup/drivers",
            get(move || async move { Json(rows) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let result = find_driver_by_name(
            &client,
            &format!("http://{addr}"),
            "John Smith",
            &cookie_credential(),
        )
        .await
        .unwrap();
        assert!(matches!(result, DriverLookupResult::Found { .. }));
    }

    #[tokio::test]
    async fn upstream_error_carries_status_and_body() {
        let app = axum::Router::new().route(
            "/data/lookup/drivers",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let err = find_driver_by_name(
            &client,
            &format!("http://{addr}"),
            "John Smith",
            &cookie_credential(),
        )
        .await
        .unwrap_err();

        match err {
            Error::UpstreamStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::new();
        let err = find_driver_by_name(
            &client,
            &format!("http://{addr}"),
            "John Smith",
            &cookie_credential(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
