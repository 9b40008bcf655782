//! Offset pagination over listing endpoints
//!
//! Page 0 is fetched on its own to learn `totalResults`. The remaining pages
//! are fetched as one fail-fast batch keyed by offset and concatenated in
//! offset order.

use reqwest::Request;
use restbatch_domain::constants::{
    DEFAULT_PAGE_SIZE, LINKS_FIELD, MAX_LISTING_PAGES, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM,
};
use restbatch_domain::RestError;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::batch::BatchRequests;
use super::client::RestClient;

/// A JSON object as returned for one listed item.
pub type JsonObject = Map<String, Value>;

/// Listing envelope: `{"totalResults": n, "items": [...]}`
///
/// Items must be objects or `null`; anything else fails to decode, which
/// aborts the listing like any other undecodable body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub total_results: u64,
    #[serde(default)]
    pub items: Option<Vec<Option<JsonObject>>>,
}

impl Page {
    /// The page's items with their `links` field removed and `null` entries
    /// skipped.
    pub fn into_items(self) -> Vec<JsonObject> {
        self.items
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|mut object| {
                object.remove(LINKS_FIELD);
                object
            })
            .collect()
    }
}

/// Copy of `template` with `limit` and `offset` appended to its query.
fn page_request(template: &Request, offset: usize, page_size: usize) -> Result<Request, RestError> {
    let mut request = template.try_clone().ok_or_else(|| {
        RestError::InvalidRequest("request body cannot be cloned for pagination".into())
    })?;
    request
        .url_mut()
        .query_pairs_mut()
        .append_pair(PAGE_LIMIT_PARAM, &page_size.to_string())
        .append_pair(PAGE_OFFSET_PARAM, &offset.to_string());
    Ok(request)
}

/// Offsets of every page after the first needed to cover `total` items.
///
/// # Errors
/// `RestError::Decode` when `total` would take more than
/// [`MAX_LISTING_PAGES`] pages.
fn remaining_offsets(total: u64, page_size: usize) -> Result<Vec<usize>, RestError> {
    let pages = total.div_ceil(page_size as u64);
    if pages > MAX_LISTING_PAGES {
        return Err(RestError::Decode(format!(
            "totalResults {total} needs {pages} pages of {page_size}, limit is {MAX_LISTING_PAGES}"
        )));
    }
    // Bounded by MAX_LISTING_PAGES above, so these fit in usize.
    Ok((1..pages as usize).map(|page| page * page_size).collect())
}

impl RestClient {
    /// Fetch every item of a listing with the default page size of 100.
    ///
    /// # Errors
    /// The first page failure, domain or transport. No partial list is
    /// returned.
    pub async fn fetch_all(&self, template: Request) -> Result<Vec<JsonObject>, RestError> {
        self.fetch_all_with_page_size(template, DEFAULT_PAGE_SIZE).await
    }

    /// Fetch every item of a listing, `page_size` items per request.
    ///
    /// # Errors
    /// `RestError::InvalidRequest` for a zero page size, `RestError::Decode`
    /// for an implausible `totalResults`, otherwise the first page failure.
    #[instrument(skip(self, template), fields(url = %template.url()))]
    pub async fn fetch_all_with_page_size(
        &self,
        template: Request,
        page_size: usize,
    ) -> Result<Vec<JsonObject>, RestError> {
        if page_size == 0 {
            return Err(RestError::InvalidRequest("page size must be at least 1".into()));
        }

        let first: Page = self.execute(page_request(&template, 0, page_size)?).await?;
        let total = first.total_results;
        let mut items = first.into_items();

        if total <= page_size as u64 {
            debug!(total, "listing fits in one page");
            return Ok(items);
        }

        let offsets = remaining_offsets(total, page_size)?;
        debug!(total, pages = offsets.len() + 1, "fetching remaining pages");

        let mut batch = BatchRequests::with_capacity(offsets.len());
        for offset in offsets {
            batch.push(offset.to_string(), page_request(&template, offset, page_size)?)?;
        }

        let pages = self.execute_fail_fast_any(batch, Page::into_items).await.map_err(|failure| {
            warn!(offset = %failure.request_id, error = %failure.error, "page fetch failed");
            failure.into_error()
        })?;

        for (_, page_items) in pages {
            items.extend(page_items);
        }
        Ok(items)
    }
}
