//! Per-device compiler cache.
//!
//! One [`DeviceCompiler`] is built lazily for each device identity and
//! shared by every call targeting that device. Construction happens under
//! the cache lock, so callers racing on a new key see a single
//! construction.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use irprobe_compiler::{CompilerClient, Platform};
use irprobe_runtime::DeviceType;

use crate::error::DriverError;

/// A compiler client bound to one device.
#[derive(Debug)]
pub struct DeviceCompiler {
    device_type: DeviceType,
    client: Arc<dyn CompilerClient>,
}

impl DeviceCompiler {
    pub fn new(device_type: DeviceType, client: Arc<dyn CompilerClient>) -> Self {
        Self {
            device_type,
            client,
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn platform(&self) -> Platform {
        self.client.platform()
    }

    pub fn client(&self) -> &Arc<dyn CompilerClient> {
        &self.client
    }
}

/// A counted reference to a cached [`DeviceCompiler`].
///
/// Dropping the reference releases it; [`release`](Self::release) does so
/// explicitly.
pub struct DeviceCompilerRef {
    device_id: String,
    compiler: Arc<DeviceCompiler>,
}

impl DeviceCompilerRef {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Gives up this reference.
    pub fn release(self) {
        log::debug!("released device compiler for {}", self.device_id);
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.compiler, &b.compiler)
    }
}

impl Deref for DeviceCompilerRef {
    type Target = DeviceCompiler;

    fn deref(&self) -> &DeviceCompiler {
        &self.compiler
    }
}

impl fmt::Debug for DeviceCompilerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCompilerRef")
            .field("device_id", &self.device_id)
            .field("platform", &self.compiler.platform())
            .finish()
    }
}

/// Device identity to shared compiler.
#[derive(Debug, Default)]
pub struct DeviceCompilerCache {
    entries: Mutex<HashMap<String, Arc<DeviceCompiler>>>,
}

impl DeviceCompilerCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<DeviceCompiler>>> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a reference to the compiler for `device_id`, building it with
    /// `factory` if none is cached. A factory error is returned and nothing
    /// is cached.
    pub fn get_or_create<F>(&self, device_id: &str, factory: F) -> Result<DeviceCompilerRef, DriverError>
    where
        F: FnOnce() -> Result<DeviceCompiler, DriverError>,
    {
        let mut entries = self.entries();
        let compiler = match entries.get(device_id) {
            Some(existing) => {
                log::debug!("device compiler cache hit for {device_id}");
                Arc::clone(existing)
            }
            None => {
                log::debug!("device compiler cache miss for {device_id}, building");
                let built = Arc::new(factory()?);
                entries.insert(device_id.to_string(), Arc::clone(&built));
                built
            }
        };
        Ok(DeviceCompilerRef {
            device_id: device_id.to_string(),
            compiler,
        })
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.entries().contains_key(device_id)
    }

    /// Drops the cache's own reference for `device_id`. Outstanding
    /// references keep the compiler alive until they are released.
    pub fn evict(&self, device_id: &str) -> bool {
        self.entries().remove(device_id).is_some()
    }

    /// Live references handed out for `device_id`, excluding the cache's own.
    pub fn ref_count(&self, device_id: &str) -> Option<usize> {
        self.entries()
            .get(device_id)
            .map(|compiler| Arc::strong_count(compiler) - 1)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irprobe_compiler::LocalClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn host_compiler() -> Result<DeviceCompiler, DriverError> {
        Ok(DeviceCompiler::new(DeviceType::Cpu, Arc::new(LocalClient::host())))
    }

    #[test]
    fn repeated_lookup_returns_same_instance() {
        let cache = DeviceCompilerCache::new();
        let a = cache.get_or_create("/device:CPU:0", host_compiler).unwrap();
        let b = cache
            .get_or_create("/device:CPU:0", || panic!("must not rebuild"))
            .unwrap();
        assert!(DeviceCompilerRef::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ref_count("/device:CPU:0"), Some(2));

        a.release();
        assert_eq!(cache.ref_count("/device:CPU:0"), Some(1));
        drop(b);
        assert_eq!(cache.ref_count("/device:CPU:0"), Some(0));
    }

    #[test]
    fn distinct_devices_get_distinct_compilers() {
        let cache = DeviceCompilerCache::new();
        let cpu = cache.get_or_create("/device:CPU:0", host_compiler).unwrap();
        let gpu = cache
            .get_or_create("/device:GPU:0", || {
                Ok(DeviceCompiler::new(
                    DeviceType::Gpu,
                    Arc::new(LocalClient::new(Platform::Cuda, 1)),
                ))
            })
            .unwrap();
        assert!(!DeviceCompilerRef::ptr_eq(&cpu, &gpu));
        assert_eq!(gpu.platform(), Platform::Cuda);
        assert_eq!(cpu.device_type(), DeviceType::Cpu);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let cache = Arc::new(DeviceCompilerCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    let compiler = cache
                        .get_or_create("/device:GPU:0", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(5));
                            Ok(DeviceCompiler::new(
                                DeviceType::Gpu,
                                Arc::new(LocalClient::new(Platform::Cuda, 1)),
                            ))
                        })
                        .unwrap();
                    Arc::as_ptr(&compiler.compiler) as usize
                })
            })
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn factory_error_is_not_cached() {
        let cache = DeviceCompilerCache::new();
        let err = cache
            .get_or_create("/device:TPU:0", || Err(DriverError::internal("no client")))
            .unwrap_err();
        assert!(matches!(err, DriverError::Internal(_)));
        assert!(!cache.contains("/device:TPU:0"));
        assert!(cache.is_empty());
    }

    #[test]
    fn evicted_compiler_lives_until_released() {
        let cache = DeviceCompilerCache::new();
        let held = cache.get_or_create("/device:CPU:0", host_compiler).unwrap();
        let weak = Arc::downgrade(&held.compiler);
        assert!(cache.evict("/device:CPU:0"));
        assert!(!cache.evict("/device:CPU:0"));
        assert!(weak.upgrade().is_some());
        held.release();
        assert!(weak.upgrade().is_none());
    }
}
