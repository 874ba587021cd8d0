use crate::types::{ClassificationSummary, Headers, Method, VerbProbeResult};
use std::collections::BTreeSet;

/// Statuses taken as evidence that the server recognizes a method: success,
/// redirects, auth/permission denials, and 405 (the route exists).
const SUPPORTED_STATUSES: [u16; 12] = [200, 201, 202, 204, 301, 302, 303, 307, 308, 401, 403, 405];

/// Split the `Allow` header into uppercase method tokens.
///
/// Order follows the header; duplicates are kept.
pub fn parse_allow(headers: &Headers) -> Vec<String> {
    headers
        .get("Allow")
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_uppercase)
                .collect()
        })
        .unwrap_or_default()
}

/// Every method named in an `Allow` header of any successful probe.
pub fn allow_union(results: &[VerbProbeResult]) -> BTreeSet<String> {
    results
        .iter()
        .filter_map(|r| match r {
            VerbProbeResult::Success { headers, .. } => Some(parse_allow(headers)),
            VerbProbeResult::Failure { .. } => None,
        })
        .flatten()
        .collect()
}

pub fn is_supported(status: u16) -> bool {
    SUPPORTED_STATUSES.contains(&status)
}

/// Methods whose probe returned a supported status, in probe order
/// regardless of the order of `results`.
pub fn supported_verbs(results: &[VerbProbeResult]) -> Vec<Method> {
    results
        .iter()
        .filter_map(|r| match r {
            VerbProbeResult::Success { method, status, .. } if is_supported(*status) => {
                Some(*method)
            }
            _ => None,
        })
        .collect::<BTreeSet<Method>>()
        .into_iter()
        .collect()
}

pub fn summarize(results: &[VerbProbeResult]) -> ClassificationSummary {
    ClassificationSummary {
        allow_union: allow_union(results),
        supported_verbs: supported_verbs(results),
    }
}
