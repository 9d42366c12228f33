//! Locking of the resource variables a call reads.
//!
//! Variables are resolved from their handles first; only then are locks
//! taken, one at a time in ascending argument order. Guards are held in a
//! [`VariableLocks`] value and released when it drops, on every exit path.

use std::sync::Arc;

use irprobe_runtime::{Device, RuntimeError, Tensor, TensorHandle, Var, VarGuard};

use crate::error::DriverError;

/// A resource argument resolved to its variable.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    index: usize,
    var: Arc<Var>,
}

impl VariableInfo {
    pub fn new(index: usize, var: Arc<Var>) -> Self {
        Self { index, var }
    }

    /// Argument index of the resource input.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn var(&self) -> &Arc<Var> {
        &self.var
    }
}

/// Resolves the resource inputs at `resource_indices` to variables owned by
/// `device`, sorted by argument index.
pub fn variable_infos_from_inputs(
    device: &Device,
    inputs: &[TensorHandle],
    resource_indices: &[usize],
) -> Result<Vec<VariableInfo>, DriverError> {
    let mut infos = Vec::with_capacity(resource_indices.len());
    for &index in resource_indices {
        let input = inputs.get(index).ok_or_else(|| {
            DriverError::invalid_argument(format!(
                "resource argument {index} is out of range for {} inputs",
                inputs.len()
            ))
        })?;
        let handle = input
            .tensor()
            .resource_handle()
            .ok_or(RuntimeError::NotAResource { index })?;
        if handle.device != device.name {
            return Err(RuntimeError::WrongDevice {
                name: handle.name.clone(),
                expected: handle.device.clone(),
                actual: device.name.clone(),
            }
            .into());
        }
        let var = device
            .resource_manager()
            .lookup(&handle.container, &handle.name)
            .ok_or_else(|| RuntimeError::ResourceNotFound {
                device: device.name.clone(),
                container: handle.container.clone(),
                name: handle.name.clone(),
            })?;
        infos.push(VariableInfo::new(index, var));
    }
    infos.sort_by_key(VariableInfo::index);
    Ok(infos)
}

/// Held locks over a set of variables.
///
/// Two arguments naming the same variable share one guard.
#[derive(Debug)]
pub struct VariableLocks<'a> {
    infos: Vec<&'a VariableInfo>,
    guards: Vec<VarGuard<'a>>,
    /// Guard position for each entry of `infos`.
    slots: Vec<usize>,
}

impl<'a> VariableLocks<'a> {
    /// Locks every variable in `infos`, in ascending argument order.
    ///
    /// Either all locks are taken or none: on failure the guards already
    /// acquired are dropped before the error is returned.
    pub fn acquire(infos: &'a [VariableInfo]) -> Result<Self, DriverError> {
        let mut ordered: Vec<&VariableInfo> = infos.iter().collect();
        ordered.sort_by_key(|info| info.index);

        let mut guards: Vec<VarGuard<'a>> = Vec::with_capacity(ordered.len());
        let mut held: Vec<&Arc<Var>> = Vec::with_capacity(ordered.len());
        let mut slots = Vec::with_capacity(ordered.len());
        for &info in &ordered {
            if let Some(slot) = held.iter().position(|var| Arc::ptr_eq(var, &info.var)) {
                slots.push(slot);
                continue;
            }
            match info.var.lock() {
                Ok(guard) => {
                    log::debug!("locked variable '{}' for argument {}", info.var.name(), info.index);
                    slots.push(guards.len());
                    guards.push(guard);
                    held.push(&info.var);
                }
                Err(e) => {
                    log::warn!(
                        "failed to lock variable '{}', releasing {} held lock(s)",
                        info.var.name(),
                        guards.len()
                    );
                    drop(guards);
                    return Err(e.into());
                }
            }
        }
        Ok(Self {
            infos: ordered,
            guards,
            slots,
        })
    }

    /// The variable and current value for resource argument `index`.
    pub fn get(&self, index: usize) -> Option<(&VariableInfo, Option<&Tensor>)> {
        let position = self.infos.iter().position(|info| info.index == index)?;
        let guard = self.guards.get(self.slots[position])?;
        Some((self.infos[position], (**guard).as_ref()))
    }

    /// Number of distinct variables locked.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Drop for VariableLocks<'_> {
    fn drop(&mut self) {
        if !self.guards.is_empty() {
            log::debug!("releasing {} variable lock(s)", self.guards.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irprobe_ir::ElementType;
    use irprobe_runtime::{ResourceHandle, TensorData};

    fn handle_for(device: &Device, name: &str) -> TensorHandle {
        let handle = ResourceHandle {
            device: device.name.clone(),
            container: "vars".into(),
            name: name.into(),
            dtype: ElementType::F32,
            dims: vec![2],
        };
        TensorHandle::new(Tensor::resource(handle), device)
    }

    fn device_with_vars(names: &[&str]) -> Device {
        let device = Device::cpu(0);
        for name in names {
            let value = Tensor::new(ElementType::F32, [2], vec![1.0, 2.0]).unwrap();
            device
                .resource_manager()
                .create("vars", Var::with_value(*name, value).unwrap());
        }
        device
    }

    #[test]
    fn resolves_sorted_by_index() {
        let device = device_with_vars(&["a", "b"]);
        let inputs = vec![handle_for(&device, "a"), handle_for(&device, "b")];
        let infos = variable_infos_from_inputs(&device, &inputs, &[1, 0]).unwrap();
        let order: Vec<usize> = infos.iter().map(VariableInfo::index).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(infos[1].var().name(), "b");
    }

    #[test]
    fn lookup_failures() {
        let device = device_with_vars(&["a"]);
        let dense = TensorHandle::new(Tensor::scalar(ElementType::F32, 1.0), &device);
        let err = variable_infos_from_inputs(&device, &[dense], &[0]).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Runtime(RuntimeError::NotAResource { index: 0 })
        ));

        let missing = handle_for(&device, "nope");
        let err = variable_infos_from_inputs(&device, &[missing], &[0]).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Runtime(RuntimeError::ResourceNotFound { .. })
        ));

        let other = Device::gpu(0);
        let foreign = handle_for(&other, "a");
        let err = variable_infos_from_inputs(&device, &[foreign], &[0]).unwrap_err();
        assert!(matches!(err, DriverError::Runtime(RuntimeError::WrongDevice { .. })));
    }

    #[test]
    fn locks_held_until_drop() {
        let device = device_with_vars(&["a", "b"]);
        let inputs = vec![handle_for(&device, "a"), handle_for(&device, "b")];
        let infos = variable_infos_from_inputs(&device, &inputs, &[0, 1]).unwrap();
        let locks = VariableLocks::acquire(&infos).unwrap();
        assert_eq!(locks.len(), 2);
        assert!(infos.iter().all(|i| i.var().is_locked()));

        let (info, value) = locks.get(1).unwrap();
        assert_eq!(info.var().name(), "b");
        assert!(matches!(value.map(Tensor::data), Some(TensorData::Values(_))));
        assert!(locks.get(5).is_none());

        drop(locks);
        assert!(infos.iter().all(|i| !i.var().is_locked()));
    }

    #[test]
    fn same_variable_is_locked_once() {
        let device = device_with_vars(&["a"]);
        let inputs = vec![handle_for(&device, "a"), handle_for(&device, "a")];
        let infos = variable_infos_from_inputs(&device, &inputs, &[0, 1]).unwrap();
        let locks = VariableLocks::acquire(&infos).unwrap();
        assert_eq!(locks.len(), 1);
        assert!(locks.get(0).is_some());
        assert!(locks.get(1).is_some());
    }

    #[test]
    fn failure_releases_acquired_locks() {
        let device = device_with_vars(&["a", "b"]);
        let inputs = vec![handle_for(&device, "a"), handle_for(&device, "b")];
        let infos = variable_infos_from_inputs(&device, &inputs, &[0, 1]).unwrap();

        let poisoned = Arc::clone(infos[1].var());
        let _ = std::thread::spawn(move || {
            let _guard = poisoned.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err = VariableLocks::acquire(&infos).unwrap_err();
        assert!(matches!(err, DriverError::Runtime(RuntimeError::PoisonedLock(name)) if name == "b"));
        assert!(!infos[0].var().is_locked());
    }
}
