// src/criterion/source.rs
use super::layout::MinibatchLayout;
use crate::backend::manager::get_backend;
use crate::backend::{CriterionCudaN, Device, ElementUpdate, StorageBackend};
use std::sync::Arc;

/// Producer of one criterion value per minibatch.
///
/// The value is a `[1 x 1]` storage that may live on a device. Producers that know the
/// structure of their minibatch report its true sample count; the others let the
/// caller's fallback count apply.
pub trait CriterionSource {
    type Elem: CriterionCudaN;

    fn value(&self) -> &dyn StorageBackend<Self::Elem>;

    fn has_structural_sample_count(&self) -> bool {
        false
    }

    /// Only meaningful when `has_structural_sample_count` is true.
    fn actual_sample_count(&self) -> u64 {
        0
    }
}

impl<S: CriterionSource + ?Sized> CriterionSource for &S {
    type Elem = S::Elem;

    fn value(&self) -> &dyn StorageBackend<S::Elem> {
        (**self).value()
    }

    fn has_structural_sample_count(&self) -> bool {
        (**self).has_structural_sample_count()
    }

    fn actual_sample_count(&self) -> u64 {
        (**self).actual_sample_count()
    }
}

impl<S: CriterionSource + ?Sized> CriterionSource for Box<S> {
    type Elem = S::Elem;

    fn value(&self) -> &dyn StorageBackend<S::Elem> {
        (**self).value()
    }

    fn has_structural_sample_count(&self) -> bool {
        (**self).has_structural_sample_count()
    }

    fn actual_sample_count(&self) -> u64 {
        (**self).actual_sample_count()
    }
}

/// A scalar criterion value resident on a device, optionally tied to the layout
/// of the minibatch it was computed on.
#[derive(Debug)]
pub struct ScalarNode<T: CriterionCudaN> {
    value: Box<dyn StorageBackend<T>>,
    device: Device,
    layout: Option<Arc<MinibatchLayout>>,
}

impl<T: CriterionCudaN> ScalarNode<T> {
    pub fn new(value: T, device: Device) -> Result<Self, String> {
        let (device, storage) = get_backend().create_full_storage(&[1, 1], device, value)?;
        Ok(Self {
            value: storage,
            device,
            layout: None,
        })
    }

    /// Wraps existing storage. It must hold exactly one element and live on `device`.
    pub fn from_storage(value: Box<dyn StorageBackend<T>>, device: Device) -> Result<Self, String> {
        if value.shape() != [1, 1] {
            return Err(format!(
                "A criterion value must have shape [1, 1], got {:?}",
                value.shape()
            ));
        }
        let device = get_backend().validate_device(device)?;
        if value.is_gpu() != device.is_cuda() {
            return Err(format!(
                "Criterion storage is {} memory but was declared on {}",
                if value.is_gpu() { "device" } else { "host" },
                device
            ));
        }
        Ok(Self {
            value,
            device,
            layout: None,
        })
    }

    pub fn with_layout(mut self, layout: Arc<MinibatchLayout>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn set_layout(&mut self, layout: Option<Arc<MinibatchLayout>>) {
        self.layout = layout;
    }

    pub fn layout(&self) -> Option<&Arc<MinibatchLayout>> {
        self.layout.as_ref()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Overwrites the value in place, as the next minibatch's forward pass would.
    pub fn set_value(&mut self, value: T) -> Result<(), String> {
        self.value.update_element(0, 0, value, ElementUpdate::Assign)
    }

    pub fn get_value(&self) -> Result<T, String> {
        self.value.element(0, 0)
    }
}

impl<T: CriterionCudaN> CriterionSource for ScalarNode<T> {
    type Elem = T;

    fn value(&self) -> &dyn StorageBackend<T> {
        self.value.as_ref()
    }

    fn has_structural_sample_count(&self) -> bool {
        self.layout.is_some()
    }

    fn actual_sample_count(&self) -> u64 {
        self.layout
            .as_ref()
            .map_or(0, |layout| layout.actual_num_samples())
    }
}
