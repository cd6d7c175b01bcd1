use crate::context::{LoadingGuard, StreamingContext};
use crate::octree::decoder::{DecodeError, DecodeTask};
use crate::octree::geometry::GeometryPayload;
use crate::octree::node::OctreeNode;
use crate::resource::{ResourceClient, ResourceError};
use crate::version::Version;
use crate::worker_pool::WorkerTask;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Node files carry a `.bin` extension from this version on.
const BIN_SUFFIX: Version = Version::new(1, 4);
/// Before this version the point count is taken from the file size up front.
const DECLARED_POINT_COUNT: Version = Version::new(1, 5);

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoaded,
    AlreadyLoading,
    /// The load was cancelled while in flight; the decoded data was dropped.
    Discarded,
}

/// One in-flight load. Dropping it, on any path, clears the node's
/// `loading` flag and releases the in-flight slot.
struct LoadAttempt {
    node: OctreeNode,
    generation: u64,
    _in_flight: LoadingGuard,
}

impl Drop for LoadAttempt {
    fn drop(&mut self) {
        self.node.borrow().data.loading = false;
    }
}

/// Loads binary node files: fetch, decode on the worker pool, attach the
/// geometry and admit the node to the cache.
pub struct BinaryLoader<C: ResourceClient> {
    client: Arc<C>,
    context: Arc<StreamingContext>,
}

impl<C: ResourceClient> Clone for BinaryLoader<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C: ResourceClient + 'static> BinaryLoader<C> {
    pub fn new(client: Arc<C>, context: Arc<StreamingContext>) -> Self {
        Self { client, context }
    }

    pub fn context(&self) -> &Arc<StreamingContext> {
        &self.context
    }

    /// Start loading `node`.
    ///
    /// The node is marked as loading and counted in flight before this
    /// returns; the work itself happens when the returned future is driven.
    /// Callers are expected to check [`StreamingContext::can_load`] first.
    pub fn load(
        &self,
        node: &OctreeNode,
    ) -> impl Future<Output = Result<LoadOutcome, LoaderError>> + Send + 'static {
        let attempt = self.begin(node);
        let client = self.client.clone();
        let context = self.context.clone();

        async move {
            match attempt {
                Ok(attempt) => run(attempt, client, context).await,
                Err(outcome) => Ok(outcome),
            }
        }
    }

    fn begin(&self, node: &OctreeNode) -> Result<LoadAttempt, LoadOutcome> {
        let generation = {
            let mut inner = node.borrow();
            if inner.data.loaded {
                return Err(LoadOutcome::AlreadyLoaded);
            }
            if inner.data.loading {
                return Err(LoadOutcome::AlreadyLoading);
            }
            inner.data.loading = true;
            inner.generation
        };

        Ok(LoadAttempt {
            node: node.clone(),
            generation,
            _in_flight: self.context.begin_loading(),
        })
    }
}

async fn run<C: ResourceClient>(
    attempt: LoadAttempt,
    client: Arc<C>,
    context: Arc<StreamingContext>,
) -> Result<LoadOutcome, LoaderError> {
    let node = attempt.node.clone();
    let point_cloud = node.point_cloud().clone();
    let version = point_cloud.version;
    let name = node.name();

    let mut url = node.url();
    if version.at_least(BIN_SUFFIX) {
        url.push_str(".bin");
    }

    debug!(node = %name, %url, "fetching node");
    let buffer = match client.get(&url, None).await {
        Ok(buffer) => buffer,
        Err(error) => {
            error!(node = %name, %url, %error, "failed to load node file");
            return Err(error.into());
        }
    };

    let point_attributes = point_cloud.point_attributes.clone();
    let byte_size = point_attributes.byte_size as usize;

    let task = {
        let mut inner = node.borrow();
        if version.below(DECLARED_POINT_COUNT) {
            inner.data.num_points = buffer.len().checked_div(byte_size).unwrap_or(0);
        }

        DecodeTask {
            buffer,
            point_attributes,
            version,
            min: inner.data.bounding_box.min,
            offset: point_cloud.offset,
            scale: point_cloud.scale,
            spacing: inner.data.spacing,
            has_children: inner.data.has_children,
            name: name.clone(),
        }
    };

    let decoded = match context
        .worker_pool()
        .run_task(WorkerTask::BinaryDecode(task))
        .await
        .into_decoded()
    {
        Ok(decoded) => decoded,
        Err(error) => {
            error!(node = %name, %error, "binary decoder failed");
            return Err(error.into());
        }
    };

    let num_points = decoded.buffer.len().checked_div(byte_size).unwrap_or(0);
    let geometry = GeometryPayload::new(
        decoded.attributes,
        decoded.tight_bounding_box,
        decoded.mean,
    );

    {
        let mut inner = node.borrow();
        if inner.generation != attempt.generation {
            warn!(node = %name, "load cancelled, dropping decoded data");
            return Ok(LoadOutcome::Discarded);
        }

        let data = &mut inner.data;
        data.num_points = num_points;
        data.geometry = Some(geometry);
        data.estimated_spacing = Some(decoded.estimated_spacing);
        data.loaded = true;
        data.loading = false;
    }
    drop(attempt);

    let evicted = context.touch(&node);
    debug!(node = %name, num_points, evicted, "node loaded");

    Ok(LoadOutcome::Loaded)
}
