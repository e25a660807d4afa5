use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client, StatusCode,
};
use serde::Deserialize;
use url::Url;

use super::{filter_by_prefix, DirectoryClient};
use crate::error::{KbError, Result};
use crate::models::UserIdentity;

/// Upper bound on followed `@odata.nextLink` pages for one user.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub group_prefix: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct MemberOfPage {
    #[serde(default)]
    value: Vec<DirectoryObject>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryObject {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

enum PageResult {
    Page(MemberOfPage),
    UnknownUser,
}

/// Directory backed by a Graph-style `memberOf` endpoint.
#[derive(Clone)]
pub struct GraphDirectoryClient {
    client: Client,
    config: GraphConfig,
    base_url: Url,
}

impl GraphDirectoryClient {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                KbError::DirectoryUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;
        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn member_of_url(&self, user: &UserIdentity) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                KbError::Validation(format!(
                    "Directory base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["users", user.as_str(), "memberOf"]);
        url.query_pairs_mut().append_pair("$select", "displayName");
        Ok(url)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    KbError::DirectoryUnavailable(format!("Invalid directory token header: {e}"))
                })?,
            );
        }
        Ok(headers)
    }

    async fn fetch_page(&self, url: &str, headers: &HeaderMap) -> Result<PageResult> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = 2_u64.saturating_pow(attempt - 1);
                let delay = Duration::from_millis(100_u64.saturating_mul(backoff));
                tokio::time::sleep(delay).await;
            }

            let response = self.client.get(url).headers(headers.clone()).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let page: MemberOfPage = resp.json().await.map_err(|e| {
                            KbError::DirectoryUnavailable(format!(
                                "Failed to parse directory response: {e}"
                            ))
                        })?;
                        return Ok(PageResult::Page(page));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Ok(PageResult::UnknownUser);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_error = Some(KbError::DirectoryUnavailable(format!(
                            "Directory error {status}: {body}"
                        )));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(KbError::DirectoryUnavailable(format!(
                        "Directory error {status}: {body}"
                    )));
                }
                Err(e) => {
                    last_error = Some(KbError::DirectoryUnavailable(format!(
                        "Directory request failed: {e}"
                    )));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| KbError::DirectoryUnavailable("Unknown error".to_string())))
    }
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
    async fn resolve_groups(&self, user: &UserIdentity) -> Result<BTreeSet<String>> {
        let headers = self.headers()?;
        let mut next = Some(self.member_of_url(user)?.to_string());
        let mut names = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                return Err(KbError::DirectoryUnavailable(format!(
                    "Group listing for {user} exceeded {MAX_PAGES} pages"
                )));
            }
            pages += 1;

            match self.fetch_page(&url, &headers).await? {
                PageResult::UnknownUser if pages == 1 => {
                    tracing::debug!(user = %user, "User not known to directory");
                    return Ok(BTreeSet::new());
                }
                PageResult::UnknownUser => {
                    return Err(KbError::DirectoryUnavailable(format!(
                        "Group listing for {user} vanished at page {pages}"
                    )));
                }
                PageResult::Page(page) => {
                    names.extend(page.value.into_iter().filter_map(|o| o.display_name));
                    next = page.next_link;
                }
            }
        }

        let groups = filter_by_prefix(names, &self.config.group_prefix);
        tracing::debug!(user = %user, groups = groups.len(), pages, "Resolved directory groups");
        Ok(groups)
    }
}
