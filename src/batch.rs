//! Concurrent batched dispatch.
//!
//! [`BatchExecutor`] fans independent request descriptors out across a
//! bounded pool of workers and collects the responses in the order the
//! descriptors were supplied, regardless of completion order. A failure in
//! any single request surfaces as that slot's `Err` and never cancels its
//! siblings.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::Response;
use crate::session::Session;

/// One input group for a batch: a single descriptor or a list of them.
///
/// Groups are flattened into a single ordered sequence before dispatch.
#[derive(Debug)]
pub enum RequestGroup {
    /// A single request.
    Single(RequestDescriptor),
    /// A list of requests dispatched in place.
    Many(Vec<RequestDescriptor>),
}

impl RequestGroup {
    fn into_descriptors(self) -> Vec<RequestDescriptor> {
        match self {
            RequestGroup::Single(descriptor) => vec![descriptor],
            RequestGroup::Many(descriptors) => descriptors,
        }
    }
}

impl From<RequestDescriptor> for RequestGroup {
    fn from(descriptor: RequestDescriptor) -> Self {
        RequestGroup::Single(descriptor)
    }
}

impl From<Vec<RequestDescriptor>> for RequestGroup {
    fn from(descriptors: Vec<RequestDescriptor>) -> Self {
        RequestGroup::Many(descriptors)
    }
}

/// Bounded-width concurrent dispatcher over a shared [`Session`].
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    session: Arc<Session>,
    width: usize,
}

impl BatchExecutor {
    /// Creates an executor with the width from the session configuration.
    pub fn new(session: Arc<Session>) -> Self {
        let width = session.config().batch_width;
        Self::with_width(session, width)
    }

    /// Creates an executor with an explicit worker pool width.
    pub fn with_width(session: Arc<Session>, width: usize) -> Self {
        Self {
            session,
            width: width.max(1),
        }
    }

    /// Worker pool width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Flattens the groups and executes every descriptor through
    /// [`Session::request`], at most `width` in flight at once.
    ///
    /// The result vector preserves the flattened input order. Each slot
    /// carries that request's own outcome under the session's per-request
    /// error contract; sibling requests are unaffected by a failure.
    pub async fn execute<G>(&self, groups: Vec<G>) -> Vec<Result<Response>>
    where
        G: Into<RequestGroup>,
    {
        let descriptors: Vec<RequestDescriptor> = groups
            .into_iter()
            .flat_map(|group| group.into().into_descriptors())
            .collect();

        debug!(
            requests = descriptors.len(),
            width = self.width,
            "Dispatching batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut handles = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let session = Arc::clone(&self.session);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?;
                session.request(descriptor).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Task(e.to_string())),
            });
        }
        results
    }
}
