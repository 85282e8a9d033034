use std::{
    collections::HashMap,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

use async_lock::{
    Mutex,
    OnceCell,
};

use crate::{
    call::CallData,
    compile::Compiler,
    config::CallOptions,
    error::Error,
    function::Function,
    signature::HostCall,
};

type Entry<K> = Arc<OnceCell<Arc<CallData<K>>>>;

/// Resolved calls by signature and thread group size, for the lifetime of
/// the cache.
///
/// At most one resolution per signature is in flight. Concurrent callers
/// with the same signature wait for it. A failed resolution isn't stored, so
/// the next call tries again.
#[derive(Debug)]
pub struct CallCache<K> {
    entries: Mutex<HashMap<String, Entry<K>>>,
    resolutions: AtomicUsize,
}

impl<K> Default for CallCache<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
        }
    }
}

impl<K> CallCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the pipeline ran through this cache.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|entry| entry.is_initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get_or_resolve<C: Compiler<Kernel = K>>(
        &self,
        function: &Function<'_>,
        compiler: &C,
        call: HostCall,
        options: &CallOptions,
    ) -> Result<Arc<CallData<K>>, Error> {
        if !options.cache_enabled {
            return self.build(function, compiler, call, options).map(Arc::new);
        }

        let key = cache_key(function, &call, options);

        // only hold the map lock to get the entry
        let entry = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let call_data = entry
            .get_or_try_init(|| async move { self.build(function, compiler, call, options).map(Arc::new) })
            .await?;

        Ok(call_data.clone())
    }

    /// Like [`CallCache::get_or_resolve`], but blocks the thread instead.
    pub fn get_or_resolve_blocking<C: Compiler<Kernel = K>>(
        &self,
        function: &Function<'_>,
        compiler: &C,
        call: HostCall,
        options: &CallOptions,
    ) -> Result<Arc<CallData<K>>, Error> {
        if !options.cache_enabled {
            return self.build(function, compiler, call, options).map(Arc::new);
        }

        let key = cache_key(function, &call, options);

        let entry = {
            let mut entries = self.entries.lock_blocking();
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let call_data = entry.get_or_try_init_blocking(|| {
            self.build(function, compiler, call, options).map(Arc::new)
        })?;

        Ok(call_data.clone())
    }

    fn build<C: Compiler<Kernel = K>>(
        &self,
        function: &Function<'_>,
        compiler: &C,
        call: HostCall,
        options: &CallOptions,
    ) -> Result<CallData<K>, Error> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        function.build_call_data(compiler, call, options)
    }
}

/// The call signature plus the options that end up in the generated source.
fn cache_key(function: &Function<'_>, call: &HostCall, options: &CallOptions) -> String {
    format!(
        "{}.numthreads({})",
        function.signature(call),
        options.thread_group_size
    )
}
