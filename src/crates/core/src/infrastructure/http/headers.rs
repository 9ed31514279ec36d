//! Browser identity headers sent with every upstream request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

pub const POW_RESPONSE_HEADER: &str = "x-ds-pow-response";
pub const THINKING_ENABLED_HEADER: &str = "x-thinking-enabled";

const BROWSER_IDENTITY: &[(&str, &str)] = &[
    ("priority", "u=1, i"),
    (
        "sec-ch-ua",
        r#""Not)A;Brand";v="8", "Chromium";v="138", "Brave";v="138""#,
    ),
    ("sec-ch-ua-arch", r#""x86""#),
    ("sec-ch-ua-bitness", r#""64""#),
    (
        "sec-ch-ua-full-version-list",
        r#""Not)A;Brand";v="8.0.0.0", "Chromium";v="138.0.0.0", "Brave";v="138.0.0.0""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-model", r#""""#),
    ("sec-ch-ua-platform", r#""Windows""#),
    ("sec-ch-ua-platform-version", r#""19.0.0""#),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    ("sec-gpc", "1"),
    ("x-app-version", "20241129.1"),
    ("x-client-locale", "en_US"),
    ("x-client-platform", "web"),
    ("x-client-version", "1.3.0-auto-resume"),
];

/// Fixed header set the upstream expects from its own web client.
///
/// `authorization` is not included; it is attached per request.
pub fn browser_identity_headers() -> HeaderMap {
    let mut header_map = HeaderMap::new();
    header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));
    header_map.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    for &(name, value) in BROWSER_IDENTITY {
        header_map.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    header_map
}
