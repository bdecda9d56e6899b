// src/criterion/accumulator.rs
use super::epoch::EpochCriterion;
use super::source::CriterionSource;
use crate::backend::manager::get_backend;
use crate::backend::{CriterionN, Device, ElementUpdate, StorageBackend};

/// Running totals for several criteria over one accumulation scope (usually an epoch).
///
/// Aggregate values live in a `[1 x N]` f64 storage on the accumulator's device, so adding a
/// device-resident criterion never leaves the device. Sample counts are host-side. Several
/// criteria can differ in their counts because they may be computed over different
/// sequence lengths.
#[derive(Debug)]
pub struct CriterionAccumulator {
    aggregate_criterion_values: Box<dyn StorageBackend<f64>>, // [1 x N]
    aggregate_sample_counts: Vec<u64>,                        // [N]
    device: Device,
}

impl CriterionAccumulator {
    pub fn new(num_criteria: usize, device: Device) -> Result<Self, String> {
        let (device, aggregate_criterion_values) =
            get_backend().create_storage::<f64>(&[1, num_criteria], device)?;
        log::debug!(
            "criterion accumulator for {} criteria on {}",
            num_criteria,
            device
        );

        Ok(Self {
            aggregate_criterion_values,
            aggregate_sample_counts: vec![0; num_criteria],
            device,
        })
    }

    pub fn num_criteria(&self) -> usize {
        self.aggregate_sample_counts.len()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Adds the value of `sources[i]` and its sample count into slot `i`.
    /// `legacy_num_samples` is the count used when the source has no structural layout.
    ///
    /// # Panics
    /// If `i` is not a valid criterion index or `sources` has no element `i`.
    pub fn add<S>(
        &mut self,
        sources: &[S],
        i: usize,
        legacy_num_samples: u64,
    ) -> Result<&mut Self, String>
    where
        S: CriterionSource,
    {
        self.accumulate(sources, i, legacy_num_samples, ElementUpdate::Add)
    }

    /// Like [`add`](Self::add) but overwrites slot `i` instead of accumulating into it.
    pub fn assign<S>(
        &mut self,
        sources: &[S],
        i: usize,
        legacy_num_samples: u64,
    ) -> Result<&mut Self, String>
    where
        S: CriterionSource,
    {
        self.accumulate(sources, i, legacy_num_samples, ElementUpdate::Assign)
    }

    /// Snapshot of slot `i` as (numerator, denominator). Reading a device-resident
    /// total synchronizes with the device.
    pub fn get_criterion(&self, i: usize) -> Result<EpochCriterion, String> {
        let count = self.aggregate_sample_counts[i];
        let value = self.aggregate_criterion_values.element(0, i)?;
        Ok(EpochCriterion::new(value, count))
    }

    /// Snapshots of every slot, in index order.
    pub fn criteria(&self) -> Result<Vec<EpochCriterion>, String> {
        (0..self.num_criteria())
            .map(|i| self.get_criterion(i))
            .collect()
    }

    // shared part of add() and assign()
    fn accumulate<S>(
        &mut self,
        sources: &[S],
        i: usize,
        legacy_num_samples: u64,
        mode: ElementUpdate,
    ) -> Result<&mut Self, String>
    where
        S: CriterionSource,
    {
        assert!(
            i < self.num_criteria(),
            "criterion index {} out of range for {} criteria",
            i,
            self.num_criteria()
        );
        let source = &sources[i];
        let value = source.value();
        // Only scalar criteria; per-frame criteria would need a masked reduction here
        if value.shape() != [1, 1] {
            return Err(format!(
                "Criterion {} must be a [1, 1] value, got shape {:?}",
                i,
                value.shape()
            ));
        }

        let num_samples = Self::num_samples(source, legacy_num_samples);
        value.element_to_element(
            0,
            0,
            self.aggregate_criterion_values.as_mut(),
            0,
            i,
            mode,
        )?;

        match mode {
            ElementUpdate::Assign => self.aggregate_sample_counts[i] = num_samples,
            ElementUpdate::Add => {
                let count = &mut self.aggregate_sample_counts[i];
                *count = count.wrapping_add(num_samples);
            }
        }
        log::trace!(
            "criterion {} {:?} {} samples ({})",
            i,
            mode,
            num_samples,
            <S::Elem as CriterionN>::DTYPE
        );
        Ok(self)
    }

    fn num_samples<S: CriterionSource>(source: &S, legacy_num_samples: u64) -> u64 {
        if source.has_structural_sample_count() {
            source.actual_sample_count()
        } else {
            legacy_num_samples
        }
    }
}
