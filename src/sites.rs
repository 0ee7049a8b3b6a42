//! Illustrative call sites: collaborators that hand out resources which must
//! be released, and the frame discipline around them. Release is registered
//! only after acquisition succeeded; a failed acquisition has nothing to
//! release.

use crate::{Frame, FrameError, scope};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum SiteError {
    #[error("resource {0} not found")]
    NotFound(String),
    #[error("handle {0} is not open")]
    NotOpen(u64),
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("host {0} unreachable")]
    Unreachable(String),
}

/// Hands out numbered handles for a fixed set of known paths.
#[derive(Debug, Default)]
pub struct ResourceTable {
    known: BTreeSet<String>,
    next_id: Cell<u64>,
    open: RefCell<BTreeMap<u64, String>>,
    closed: RefCell<Vec<u64>>,
}

#[derive(Debug)]
pub struct Handle<'t> {
    table: &'t ResourceTable,
    id: u64,
}

impl ResourceTable {
    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn open(&self, path: &str) -> Result<Handle<'_>, SiteError> {
        if !self.known.contains(path) {
            return Err(SiteError::NotFound(path.to_owned()));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.open.borrow_mut().insert(id, path.to_owned());
        log::debug!("opened {path} as handle {id}");
        Ok(Handle { table: self, id })
    }

    pub fn open_count(&self) -> usize {
        self.open.borrow().len()
    }

    /// Ids of closed handles, in closing order.
    pub fn closed(&self) -> Vec<u64> {
        self.closed.borrow().clone()
    }
}

impl Handle<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn close(self) -> Result<(), SiteError> {
        let Some(path) = self.table.open.borrow_mut().remove(&self.id) else {
            return Err(SiteError::NotOpen(self.id));
        };
        self.table.closed.borrow_mut().push(self.id);
        log::debug!("closed handle {} ({path})", self.id);
        Ok(())
    }
}

/// Opens `path` `count` times, deferring one close per open. The frame ends
/// up with `count` entries and closes the handles in reverse opening order.
pub fn open_all(table: &ResourceTable, path: &str, count: usize) -> Result<usize, FrameError> {
    scope("open_all", |frame| {
        for _ in 0..count {
            let handle = table.open(path)?;
            frame.defer_fallible(move || Ok(handle.close()?))?;
        }
        Ok(frame.registered())
    })
}

/// Simulated HTTP client. Fetches wait on a timer and never touch the network.
#[derive(Debug)]
pub struct Client {
    latency: Duration,
    closed: RefCell<Vec<String>>,
}

#[derive(Debug)]
pub struct Response<'c> {
    client: &'c Client,
    url: String,
    pub status: u16,
}

impl Client {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            closed: RefCell::new(Vec::new()),
        }
    }

    /// Urls whose response body was closed, in closing order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.borrow().clone()
    }

    pub async fn fetch(&self, url: &str) -> Result<Response<'_>, SiteError> {
        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .and_then(|rest| rest.split('/').next())
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SiteError::InvalidUrl(url.to_owned()))?;

        tokio::time::sleep(self.latency).await;

        if host.ends_with(".invalid") {
            return Err(SiteError::Unreachable(host.to_owned()));
        }
        Ok(Response {
            client: self,
            url: url.to_owned(),
            status: 200,
        })
    }
}

impl Response<'_> {
    pub fn close(self) -> anyhow::Result<()> {
        log::debug!("closing response body of {}", self.url);
        self.client.closed.borrow_mut().push(self.url);
        Ok(())
    }
}

/// Fetches `url` and returns the status. The body close is deferred only once
/// the fetch is known to have succeeded.
pub async fn fetch_status(client: &Client, url: &str) -> Result<u16, FrameError> {
    let mut frame: Frame<u16> = Frame::with_label("fetch_status");
    let response = match client.fetch(url).await {
        Ok(response) => response,
        Err(err) => return Err(frame.exit_unwind(err).into()),
    };
    let status = response.status;
    frame.defer_fallible(move || response.close())?;
    frame.return_anonymous(status)?;
    frame.exit_normal()
}
