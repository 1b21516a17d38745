//! Request-line parsing.
//!
//! Only the first line of the request head is inspected. It must read
//! `GET <target> ...`, and `<target>` must carry a query string with the
//! three proximity parameters:
//!
//! | Key | Type | Rule |
//! |-----|------|------|
//! | `type` | integer | `1` food banks, `2` people, `3` everything |
//! | `lat` | float | non-zero, within `[-90, 90]` |
//! | `lng` | float | non-zero, within `[-180, 180]` |
//!
//! Unknown keys are ignored and a repeated key keeps its last value. A
//! zero coordinate is treated as missing.

use ffd_types::{CategoryFilter, Coordinates, ProximityQuery};

use crate::error::RequestError;

/// The only method served.
const METHOD_GET: &str = "GET";

/// Parse the request head into a validated query.
///
/// # Errors
///
/// Returns [`RequestError::BadRequest`] describing the first problem found.
pub fn parse_request(head: &[u8]) -> Result<ProximityQuery, RequestError> {
    let text = std::str::from_utf8(head)
        .map_err(|e| RequestError::BadRequest(format!("request is not UTF-8: {e}")))?;
    let request_line = text.split("\r\n").next().unwrap_or_default();

    let mut tokens = request_line.split(' ').filter(|token| !token.is_empty());
    match tokens.next() {
        Some(METHOD_GET) => {}
        Some(other) => return Err(bad_request(format!("unsupported method {other:?}"))),
        None => return Err(bad_request("empty request line")),
    }
    let target = tokens.next().ok_or_else(|| bad_request("missing request target"))?;

    parse_target(target)
}

/// Extract a [`ProximityQuery`] from a request target such as
/// `/nearby?type=1&lat=28.1&lng=-15.4`.
///
/// # Errors
///
/// Returns [`RequestError::BadRequest`] if a parameter is missing, zero,
/// unparsable, or out of range.
pub fn parse_target(target: &str) -> Result<ProximityQuery, RequestError> {
    let (_, query) = target
        .split_once('?')
        .ok_or_else(|| bad_request("missing query string"))?;
    let query = query.split('#').next().unwrap_or_default();

    let mut selector = None;
    let mut lat = None;
    let mut lng = None;

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "type" => {
                selector = Some(
                    value
                        .parse::<i64>()
                        .map_err(|e| bad_request(format!("type {value:?}: {e}")))?,
                );
            }
            "lat" => lat = Some(parse_coordinate("lat", value)?),
            "lng" => lng = Some(parse_coordinate("lng", value)?),
            _ => {}
        }
    }

    let selector = selector.ok_or_else(|| bad_request("missing type"))?;
    let filter = CategoryFilter::from_selector(selector)
        .ok_or_else(|| bad_request(format!("unknown type {selector}")))?;
    let lat = lat
        .filter(|value| !is_unset(*value))
        .ok_or_else(|| bad_request("lat is required and must be non-zero"))?;
    let lng = lng
        .filter(|value| !is_unset(*value))
        .ok_or_else(|| bad_request("lng is required and must be non-zero"))?;

    let origin = Coordinates::new(lat, lng);
    if !origin.is_valid() {
        return Err(bad_request(format!("coordinates out of range: {lat},{lng}")));
    }

    Ok(ProximityQuery { filter, origin })
}

fn parse_coordinate(key: &str, value: &str) -> Result<f64, RequestError> {
    value
        .parse::<f64>()
        .map_err(|e| bad_request(format!("{key} {value:?}: {e}")))
}

/// Zero doubles as "not supplied".
#[allow(clippy::float_cmp)]
const fn is_unset(value: f64) -> bool {
    value == 0.0
}

fn bad_request(reason: impl Into<String>) -> RequestError {
    RequestError::BadRequest(reason.into())
}
