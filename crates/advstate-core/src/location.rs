//! Read-only view of the current location (query string and path).

use url::Url;

/// Base used to resolve relative inputs such as `/app/x?id=1`.
const BASE: &str = "http://localhost/";

fn base_url() -> Url {
    Url::parse(BASE).expect("static base url")
}

/// The current page location a binding resolves its scope against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Default for Location {
    fn default() -> Self {
        Self { url: base_url() }
    }
}

impl Location {
    /// Parse an absolute URL or a path with optional query (`/a/b?x=1`).
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let base = base_url();
        let url = Url::options().base_url(Some(&base)).parse(input)?;
        Ok(Self { url })
    }

    /// Look up a query parameter. Empty values count as absent.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// Non-empty `/`-delimited path segments, in order.
    pub fn path_segments(&self) -> Vec<String> {
        self.url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}
