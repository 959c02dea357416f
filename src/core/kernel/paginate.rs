use crate::core::errors::CbproError;
use crate::core::kernel::rate_limit::EndpointClass;
use crate::core::kernel::request::EndpointTarget;
use crate::core::kernel::rest::RestClient;
use crate::core::kernel::transport::RawResponse;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

pub const HEADER_BEFORE: &str = "cb-before";
pub const HEADER_AFTER: &str = "cb-after";

/// Items of a paginated endpoint, one at a time, across as many pages as it takes
pub type PageStream<'a, T> = BoxStream<'a, Result<T, CbproError>>;

/// Continuation tokens returned with a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl Cursor {
    /// Read the cursor headers; missing or blank values are `None`.
    pub fn from_response(response: &RawResponse) -> Self {
        let read = |name: &str| {
            response
                .header(name)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            before: read(HEADER_BEFORE),
            after: read(HEADER_AFTER),
        }
    }

    pub fn next(&self, direction: PageDirection) -> Option<&str> {
        match direction {
            PageDirection::Older => self.after.as_deref(),
            PageDirection::Newer => self.before.as_deref(),
        }
    }
}

/// Which way to walk a latest-first listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageDirection {
    /// Follow `after` towards older entries
    #[default]
    Older,
    /// Follow `before` towards newer entries
    Newer,
}

impl PageDirection {
    pub const fn query_param(self) -> &'static str {
        match self {
            Self::Older => "after",
            Self::Newer => "before",
        }
    }
}

/// One decoded page and the cursor that continues it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Cursor,
}

/// Template for every page request of one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    path: String,
    limit: Option<u32>,
    direction: PageDirection,
    start: Option<String>,
}

impl PageRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            limit: None,
            direction: PageDirection::default(),
            start: None,
        }
    }

    /// Items per page
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: PageDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Resume from a cursor saved from an earlier walk
    #[must_use]
    pub fn starting_at(mut self, cursor: impl Into<String>) -> Self {
        self.start = Some(cursor.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The target for the page that follows `cursor`, or the first page.
    pub fn target(&self, cursor: Option<&str>) -> Result<EndpointTarget, CbproError> {
        let limit = self.limit.map(|limit| limit.to_string());
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(limit) = limit.as_deref() {
            params.push(("limit", limit));
        }
        if let Some(cursor) = cursor {
            params.push((self.direction.query_param(), cursor));
        }
        EndpointTarget::get(self.path.as_str()).with_query(&params)
    }
}

enum PageState {
    Next(Option<String>),
    Done,
}

/// Walk a cursor-paginated listing lazily.
///
/// Pages are fetched only as the stream is polled, in upstream order, without
/// reordering or deduplication. The walk ends when a page carries no cursor
/// for the chosen direction. It also ends on an empty page even if that page
/// still carries a cursor, so a server that keeps echoing the same cursor
/// cannot loop the walk forever. The first failing page yields its error and
/// ends the stream; items already yielded stand.
pub fn paginate<'a, R, T>(client: &'a R, request: PageRequest, class: EndpointClass) -> PageStream<'a, T>
where
    R: RestClient + ?Sized,
    T: DeserializeOwned + Send + 'a,
{
    let initial = PageState::Next(request.start.clone());

    stream::try_unfold(initial, move |state| {
        let target = match &state {
            PageState::Next(cursor) => Some(request.target(cursor.as_deref())),
            PageState::Done => None,
        };
        let direction = request.direction;

        async move {
            let Some(target) = target else {
                return Ok(None);
            };
            let target = target?;
            let page: Page<T> = client.get_page(&target, class).await?;

            let next = match page.cursor.next(direction) {
                Some(cursor) if !page.items.is_empty() => PageState::Next(Some(cursor.to_string())),
                _ => PageState::Done,
            };
            debug!(
                path = target.path(),
                items = page.items.len(),
                last = matches!(next, PageState::Done),
                "fetched page"
            );

            Ok::<_, CbproError>(Some((page.items, next)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, CbproError>)))
    .try_flatten()
    .boxed()
}
