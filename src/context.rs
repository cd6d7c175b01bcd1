use crate::config::StreamingConfig;
use crate::lru::LruCache;
use crate::octree::node::OctreeNode;
use crate::worker_pool::{WorkerPool, WorkerPoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Shared streaming state: limits, the in-flight counter, the decoder pool
/// and the resident node cache.
///
/// One instance is normally shared by every point cloud of the host through
/// an `Arc`; its lifetime is the host's to manage.
#[derive(Debug)]
pub struct StreamingContext {
    config: RwLock<StreamingConfig>,
    num_nodes_loading: AtomicUsize,
    worker_pool: WorkerPool,
    lru: Mutex<LruCache>,
}

impl StreamingContext {
    pub fn new(config: StreamingConfig) -> Result<Arc<Self>, WorkerPoolError> {
        let worker_pool = WorkerPool::new(config.worker_count)?;
        Ok(Self::with_worker_pool(config, worker_pool))
    }

    pub fn with_worker_pool(config: StreamingConfig, worker_pool: WorkerPool) -> Arc<Self> {
        Arc::new(Self {
            lru: Mutex::new(LruCache::new(config.point_load_limit)),
            config: RwLock::new(config),
            num_nodes_loading: AtomicUsize::new(0),
            worker_pool,
        })
    }

    pub fn config(&self) -> StreamingConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_config(&self, update: impl FnOnce(&mut StreamingConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut *config);
    }

    pub fn num_nodes_loading(&self) -> usize {
        self.num_nodes_loading.load(Ordering::Acquire)
    }

    pub fn max_nodes_loading(&self) -> usize {
        self.config().max_nodes_loading
    }

    pub fn set_max_nodes_loading(&self, max_nodes_loading: usize) {
        self.update_config(|config| config.max_nodes_loading = max_nodes_loading);
    }

    pub fn max_nodes_load_gpu_frame(&self) -> usize {
        self.config().max_nodes_load_gpu_frame
    }

    pub fn set_max_nodes_load_gpu_frame(&self, max_nodes: usize) {
        self.update_config(|config| config.max_nodes_load_gpu_frame = max_nodes);
    }

    pub fn point_load_limit(&self) -> u64 {
        self.config().point_load_limit
    }

    /// Change the resident budget; evicts right away if it shrank.
    pub fn set_point_load_limit(&self, point_load_limit: u64) -> usize {
        self.update_config(|config| config.point_load_limit = point_load_limit);
        self.lru().set_max_points(point_load_limit)
    }

    /// Admission check for callers about to start another load.
    pub fn can_load(&self) -> bool {
        self.num_nodes_loading() < self.max_nodes_loading()
    }

    pub fn worker_pool(&self) -> &WorkerPool {
        &self.worker_pool
    }

    /// Exclusive access to the cache. Do not call while holding a node lock.
    pub fn lru(&self) -> MutexGuard<'_, LruCache> {
        self.lru.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn touch(&self, node: &OctreeNode) -> usize {
        self.lru().touch(node)
    }

    /// Unload `node` through the cache, or cancel its load if it is still in flight.
    pub fn remove(&self, node: &OctreeNode) -> bool {
        self.lru().remove(node)
    }

    /// Count one more load in flight until the guard is dropped.
    pub(crate) fn begin_loading(self: &Arc<Self>) -> LoadingGuard {
        self.num_nodes_loading.fetch_add(1, Ordering::AcqRel);
        LoadingGuard {
            context: self.clone(),
        }
    }
}

/// Holds one unit of `num_nodes_loading`; releases it exactly once on drop.
#[derive(Debug)]
pub(crate) struct LoadingGuard {
    context: Arc<StreamingContext>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.context
            .num_nodes_loading
            .fetch_sub(1, Ordering::AcqRel);
    }
}
