use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::auth::AuthError;
use crate::client::{decode, ApiClient, Endpoint};
use crate::error::{ApiError, ApiErrorKind, SdkResult, ValidationError};
use crate::methods::RawRequest;
use crate::transport::Response;

pub const LINK_HEADER: &str = "link";
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageRel {
    First,
    Last,
    Next,
    Prev,
}

impl PageRel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageRel::First => "first",
            PageRel::Last => "last",
            PageRel::Next => "next",
            PageRel::Prev => "prev",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "first" => Some(PageRel::First),
            "last" => Some(PageRel::Last),
            "next" => Some(PageRel::Next),
            "prev" => Some(PageRel::Prev),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub rel: PageRel,
    /// The full `rel` value, e.g. `next page`
    pub name: String,
    pub url: String,
}

pub type PageLinks = BTreeMap<PageRel, PageLink>;

/// Parses a `Link` header into its paging relations. The first word of each
/// `rel` selects the relation; entries with other relations are skipped.
pub fn parse_link_header(header: &str) -> PageLinks {
    let mut links = PageLinks::new();
    let mut rest = header;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let url = after[..end].trim();
        let tail = &after[end + 1..];
        // URLs may contain commas, so parameters run up to the next `<`
        let params_end = tail.find('<').unwrap_or(tail.len());
        let params = &tail[..params_end];
        rest = &tail[params_end..];

        let name = params
            .split(';')
            .filter_map(|param| param.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("rel"))
            .map(|(_, value)| {
                value
                    .trim()
                    .trim_end_matches(',')
                    .trim()
                    .trim_matches('"')
                    .trim()
            });
        let Some(name) = name else {
            continue;
        };
        let Some(rel) = name.split_whitespace().next().and_then(PageRel::parse) else {
            continue;
        };
        links.insert(
            rel,
            PageLink {
                rel,
                name: name.to_string(),
                url: url.to_string(),
            },
        );
    }
    links
}

/// Walks a collection endpoint whose responses carry `Link` and
/// `X-Total-Count` headers. Each page replaces the held items.
pub struct Pager<'a, T> {
    client: &'a ApiClient,
    items: Vec<T>,
    links: PageLinks,
    total: Option<u64>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pager<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("items", &self.items)
            .field("links", &self.links)
            .field("total", &self.total)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl<'a, T: DeserializeOwned> Pager<'a, T> {
    /// Runs `endpoint` for the first page.
    pub async fn new<E>(client: &'a ApiClient, endpoint: &E) -> Result<SdkResult<Self>, AuthError>
    where
        E: Endpoint<Output = Vec<T>>,
    {
        let mut pager = Self {
            client,
            items: Vec::new(),
            links: PageLinks::new(),
            total: None,
            limit: None,
            offset: None,
        };
        let raw = client.call_raw(endpoint).await?;
        Ok(pager.load(raw, &endpoint.query()).map(|()| pager))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn links(&self) -> &PageLinks {
        &self.links
    }

    /// Total number of items, when the server reported it.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// One-based number of the current page.
    pub fn page(&self) -> Option<u64> {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if limit > 0 => Some(offset.div_ceil(limit) + 1),
            _ => None,
        }
    }

    pub fn pages(&self) -> Option<u64> {
        match (self.total, self.limit) {
            (Some(total), Some(limit)) if total > 0 && limit > 0 => Some(total.div_ceil(limit)),
            _ => None,
        }
    }

    pub fn has_rel(&self, rel: PageRel) -> bool {
        self.links.contains_key(&rel)
    }

    pub fn more(&self) -> bool {
        self.has_rel(PageRel::Next)
    }

    /// Fetches the page behind `rel`. `limit` (with `offset`, default 0)
    /// replaces the paging parameters of the link. A relation the last
    /// response did not offer clears the pager and yields no items.
    pub async fn get_rel(
        &mut self,
        rel: PageRel,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<SdkResult<&[T]>, AuthError> {
        let link = self.links.get(&rel).map(|link| link.url.clone());
        self.reset();
        let Some(link) = link else {
            return Ok(Ok(self.items.as_slice()));
        };

        let url = match self.page_url(&link, limit, offset) {
            Ok(url) => url,
            Err(e) => return Ok(Err(e)),
        };
        let query: BTreeMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        tracing::debug!("Fetching {} page {}", rel.as_str(), url);
        let raw = self.client.call_raw(&RawRequest::get(url.to_string())).await?;
        Ok(self.load(raw, &query).map(|()| self.items.as_slice()))
    }

    pub async fn first_page(&mut self) -> Result<SdkResult<&[T]>, AuthError> {
        self.get_rel(PageRel::First, None, None).await
    }

    pub async fn last_page(&mut self) -> Result<SdkResult<&[T]>, AuthError> {
        self.get_rel(PageRel::Last, None, None).await
    }

    pub async fn next_page(&mut self) -> Result<SdkResult<&[T]>, AuthError> {
        self.get_rel(PageRel::Next, None, None).await
    }

    pub async fn prev_page(&mut self) -> Result<SdkResult<&[T]>, AuthError> {
        self.get_rel(PageRel::Prev, None, None).await
    }

    /// Follows `next` links from the current page on and returns every item
    /// seen. Stops early on an empty page.
    pub async fn collect_all(mut self) -> Result<SdkResult<Vec<T>>, AuthError> {
        let mut all = std::mem::take(&mut self.items);
        while self.more() {
            let len = match self.next_page().await? {
                Ok(page) => page.len(),
                Err(e) => return Ok(Err(e)),
            };
            if len == 0 {
                break;
            }
            all.append(&mut self.items);
        }
        Ok(Ok(all))
    }

    fn reset(&mut self) {
        self.items.clear();
        self.links.clear();
        self.total = None;
        self.limit = None;
        self.offset = None;
    }

    fn load(
        &mut self,
        raw: SdkResult<Response>,
        query: &BTreeMap<String, String>,
    ) -> SdkResult<()> {
        let response = raw?;
        self.parse(&response, query);
        self.items = decode(&response)?;
        Ok(())
    }

    fn parse(&mut self, response: &Response, query: &BTreeMap<String, String>) {
        let param = |name: &str| query.get(name).and_then(|v| v.trim().parse::<u64>().ok());
        self.limit = param("limit");
        self.offset = param("offset").or(self.limit.map(|_| 0));
        self.links = response
            .header(LINK_HEADER)
            .map(parse_link_header)
            .unwrap_or_default();
        self.total = response
            .header(TOTAL_COUNT_HEADER)
            .and_then(|v| v.trim().parse().ok());
    }

    fn page_url(&self, link: &str, limit: Option<u64>, offset: Option<u64>) -> SdkResult<url::Url> {
        let mut url = match url::Url::parse(link) {
            Ok(url) => url,
            Err(_) => url::Url::parse(&self.client.settings().base_url)
                .and_then(|base| base.join(link))
                .map_err(|e| {
                    ApiError::new(
                        ApiErrorKind::Decode,
                        None,
                        format!("Invalid page link {:?}: {}", link, e),
                    )
                })?,
        };

        if let Some(limit) = limit {
            if limit < 1 {
                return Err(ApiError::validation(ValidationError::InvalidArgument {
                    name: "limit",
                    reason: "must be at least 1".to_string(),
                }));
            }
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !matches!(&**k, "limit" | "offset"))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.unwrap_or(0).to_string());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_header() {
        let links = parse_link_header(
            r#"<https://x.test/api/4.0/users/search?fields=id,email&limit=2&offset=2>; rel="next", <https://x.test/api/4.0/users/search?limit=2&offset=0>; rel="first""#,
        );

        assert_eq!(links.len(), 2);
        assert_eq!(
            links[&PageRel::Next].url,
            "https://x.test/api/4.0/users/search?fields=id,email&limit=2&offset=2"
        );
        assert_eq!(links[&PageRel::First].name, "first");
    }

    #[test]
    fn test_parse_link_header_uses_first_rel_word() {
        let links = parse_link_header(r#"<https://x.test/a>; rel="Prev page"; title="back""#);
        assert_eq!(links[&PageRel::Prev].name, "Prev page");
    }

    #[test]
    fn test_parse_link_header_skips_unknown() {
        assert!(parse_link_header(r#"<https://x.test/a>; rel="self""#).is_empty());
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("<https://x.test/a").is_empty());
    }
}
