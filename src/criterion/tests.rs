#[cfg(test)]
mod tests {
    use crate::backend::{cpu, CPUStorage, CriterionCudaN, StorageBackend};
    use crate::criterion::{
        CriterionAccumulator, CriterionSource, EpochCriterion, EpochSummary, MinibatchLayout,
        ScalarNode,
    };
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn nodes<T: CriterionCudaN>(values: &[T]) -> Vec<ScalarNode<T>> {
        values
            .iter()
            .map(|&v| ScalarNode::new(v, cpu()).unwrap())
            .collect()
    }

    // ============= EpochCriterion =============

    #[test]
    fn test_average_is_ratio() {
        let c = EpochCriterion::new(7.0, 15);
        assert_eq!(c.average(), 7.0 / 15.0);

        let c = EpochCriterion::new(-3.5, 7);
        assert_eq!(c.average(), -0.5);
    }

    #[test]
    fn test_average_of_zero_count_is_zero() {
        assert_eq!(EpochCriterion::default().average(), 0.0);
        assert_eq!(EpochCriterion::new(42.0, 0).average(), 0.0);
        assert_eq!(EpochCriterion::new(-1.0, 0).average(), 0.0);
        assert_eq!(EpochCriterion::new(f64::NAN, 0).average(), 0.0);
        assert_eq!(EpochCriterion::new(f64::NEG_INFINITY, 0).average(), 0.0);
    }

    #[test]
    fn test_nan_is_not_infinity() {
        for count in [0, 1, 1000] {
            let c = EpochCriterion::new(f64::NAN, count);
            assert!(c.is_nan());
            assert!(!c.is_infinity());
        }
    }

    #[test]
    fn test_infinity_sentinel() {
        let inf = EpochCriterion::infinity();
        assert!(inf.is_infinity());
        assert!(!inf.is_nan());
        assert_eq!(inf.aggregate_sample_count, 0);
        assert_eq!(inf.average(), f64::INFINITY);

        // Worse than any finite average
        assert!(EpochCriterion::new(1e300, 1).average() < inf.average());

        assert!(!EpochCriterion::new(f64::NEG_INFINITY, 1).is_infinity());
        assert!(EpochCriterion::new(f64::INFINITY, 3).is_infinity());
    }

    #[test]
    fn test_delta_of_snapshots() {
        let before = EpochCriterion::new(3.0, 10);
        let after = EpochCriterion::new(7.0, 15);
        let delta = after - before;
        assert_eq!(delta, EpochCriterion::new(4.0, 5));
        assert_eq!(delta.average(), 4.0 / 5.0);
    }

    #[test]
    fn test_out_of_order_delta_is_not_rejected() {
        let delta = EpochCriterion::new(3.0, 10) - EpochCriterion::new(7.0, 15);
        assert_eq!(delta.aggregate_value, -4.0);
        assert_eq!(delta.aggregate_sample_count, 10u64.wrapping_sub(15));
    }

    #[test]
    fn test_out_of_order_delta_folds_back() {
        let earlier = EpochCriterion::new(3.0, 10);
        let later = EpochCriterion::new(7.0, 15);

        let mut restored = earlier - later;
        restored += later;
        assert_eq!(restored, earlier);
        assert_eq!((earlier - later) + later, earlier);
    }

    #[test]
    fn test_accumulator_count_wraps_instead_of_overflowing() {
        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        let sources = nodes(&[1.0f64]);
        acc.add(&sources, 0, u64::MAX).unwrap().add(&sources, 0, 2).unwrap();
        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::new(2.0, 1));
    }

    #[test]
    fn test_merge_is_pointwise_commutative_and_associative() {
        let a = EpochCriterion::new(1.5, 3);
        let b = EpochCriterion::new(2.0, 4);
        let c = EpochCriterion::new(0.25, 1);

        let mut merged = a;
        merged += b;
        assert_eq!(merged, EpochCriterion::new(3.5, 7));

        assert_eq!(a + b, b + a);
        assert_eq!((a + b) + c, a + (b + c));

        let workers = [a, b, c];
        let total: EpochCriterion = workers.iter().sum();
        assert_eq!(total, EpochCriterion::new(3.75, 8));
    }

    #[test]
    fn test_display_format() {
        assert_eq!(EpochCriterion::new(5.0, 10).to_string(), "0.50000000 * 10");
        assert_eq!(EpochCriterion::default().to_string(), "0.00000000 * 0");
    }

    // ============= CriterionAccumulator =============

    #[test]
    fn test_new_accumulator_is_zeroed() {
        let acc = CriterionAccumulator::new(4, cpu()).unwrap();
        assert_eq!(acc.num_criteria(), 4);
        for c in acc.criteria().unwrap() {
            assert_eq!(c, EpochCriterion::default());
        }
    }

    #[test]
    fn test_accumulate_law() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();

        let first = nodes(&[3.0f64, 0.0]);
        let second = nodes(&[4.0f64, 0.0]);
        acc.add(&first, 0, 10).unwrap();
        acc.add(&second, 0, 5).unwrap();

        let c = acc.get_criterion(0).unwrap();
        assert_eq!(c, EpochCriterion::new(7.0, 15));
        assert_eq!(c.average(), 7.0 / 15.0);
    }

    #[test]
    fn test_overwrite_law() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        acc.add(&nodes(&[3.0f64]), 0, 10)
            .unwrap()
            .add(&nodes(&[4.0f64]), 0, 5)
            .unwrap()
            .assign(&nodes(&[1.0f64]), 0, 1)
            .unwrap();

        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::new(1.0, 1));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        let sources = nodes(&[2.0f64, 9.0]);

        acc.add(&sources, 1, 3).unwrap();
        let before = acc.get_criterion(1).unwrap();

        acc.add(&sources, 0, 10).unwrap();
        acc.assign(&sources, 0, 1).unwrap();
        acc.add(&sources, 0, 4).unwrap();

        assert_eq!(acc.get_criterion(1).unwrap(), before);
        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::new(4.0, 5));
    }

    #[test]
    fn test_get_criterion_does_not_mutate() {
        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        acc.add(&nodes(&[0.5f64]), 0, 2).unwrap();

        let first = acc.get_criterion(0).unwrap();
        let second = acc.get_criterion(0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_delta_law_on_accumulator() {
        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        acc.add(&nodes(&[1.0f64]), 0, 4).unwrap();
        let a = acc.get_criterion(0).unwrap();

        acc.add(&nodes(&[3.0f64]), 0, 6).unwrap();
        acc.add(&nodes(&[2.0f64]), 0, 2).unwrap();
        let b = acc.get_criterion(0).unwrap();

        assert_relative_eq!((b - a).average(), (3.0 + 2.0) / (6.0 + 2.0));
    }

    #[test]
    fn test_end_to_end_three_criteria() {
        let mut acc = CriterionAccumulator::new(3, cpu()).unwrap();

        let mb1 = nodes(&[2.0f64, 1.0, 0.0]);
        let mb2 = nodes(&[3.0f64, 1.5, 0.0]);
        for i in 0..3 {
            acc.add(&mb1, i, 4).unwrap();
        }
        for i in 0..3 {
            acc.add(&mb2, i, 6).unwrap();
        }

        let c0 = acc.get_criterion(0).unwrap();
        let c1 = acc.get_criterion(1).unwrap();
        let c2 = acc.get_criterion(2).unwrap();
        assert_eq!(c0, EpochCriterion::new(5.0, 10));
        assert_eq!(c1, EpochCriterion::new(2.5, 10));
        assert_eq!(c2, EpochCriterion::new(0.0, 10));
        assert_eq!(c0.average(), 0.5);
        assert_eq!(c1.average(), 0.25);
        assert_eq!(c2.average(), 0.0);
    }

    #[test]
    fn test_single_precision_values_accumulate_in_double() {
        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        let step = nodes(&[0.1f32]);
        for _ in 0..100_000 {
            acc.add(&step, 0, 1).unwrap();
        }

        let c = acc.get_criterion(0).unwrap();
        assert_eq!(c.aggregate_sample_count, 100_000);
        // An f32 running sum is off by more than one at this length
        assert_relative_eq!(c.aggregate_value, 100_000.0 * (0.1f32 as f64), max_relative = 1e-9);
    }

    #[test]
    fn test_nan_propagates() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        acc.add(&nodes(&[1.0f64, 1.0]), 0, 1).unwrap();
        acc.add(&nodes(&[f64::NAN, 1.0]), 0, 1).unwrap();
        acc.add(&nodes(&[1.0f64, 1.0]), 1, 1).unwrap();

        assert!(acc.get_criterion(0).unwrap().is_nan());
        assert!(!acc.get_criterion(1).unwrap().is_nan());
    }

    #[test]
    fn test_structural_sample_count_wins_over_legacy() {
        let mut layout = MinibatchLayout::new(2, 5);
        layout.add_sequence(0, 0, 0, 5).unwrap();
        layout.add_sequence(1, 1, 0, 3).unwrap();
        let layout = Arc::new(layout);

        let with_layout = vec![ScalarNode::new(2.0f64, cpu()).unwrap().with_layout(layout)];
        let without_layout = nodes(&[2.0f64]);

        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        acc.add(&with_layout, 0, 999).unwrap();
        assert_eq!(acc.get_criterion(0).unwrap().aggregate_sample_count, 8);

        acc.add(&without_layout, 0, 999).unwrap();
        assert_eq!(acc.get_criterion(0).unwrap().aggregate_sample_count, 8 + 999);

        acc.assign(&with_layout, 0, 1).unwrap();
        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::new(2.0, 8));
    }

    #[test]
    fn test_heterogeneous_sources() {
        struct Fixed {
            value: CPUStorage<f32>,
            samples: u64,
        }

        impl CriterionSource for Fixed {
            type Elem = f32;

            fn value(&self) -> &dyn StorageBackend<f32> {
                &self.value
            }

            fn has_structural_sample_count(&self) -> bool {
                true
            }

            fn actual_sample_count(&self) -> u64 {
                self.samples
            }
        }

        let sources: Vec<Box<dyn CriterionSource<Elem = f32>>> = vec![
            Box::new(ScalarNode::new(1.0f32, cpu()).unwrap()),
            Box::new(Fixed {
                value: CPUStorage::scalar(2.0),
                samples: 7,
            }),
        ];

        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        acc.add(&sources, 0, 3).unwrap().add(&sources, 1, 3).unwrap();

        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::new(1.0, 3));
        assert_eq!(acc.get_criterion(1).unwrap(), EpochCriterion::new(2.0, 7));
    }

    #[test]
    fn test_non_scalar_source_is_rejected() {
        let storage = CPUStorage::<f64>::zeros(&[1, 2]).unwrap();
        assert!(ScalarNode::from_storage(storage, cpu()).is_err());

        struct Wide(CPUStorage<f64>);
        impl CriterionSource for Wide {
            type Elem = f64;
            fn value(&self) -> &dyn StorageBackend<f64> {
                &self.0
            }
        }

        let wide = [Wide(CPUStorage::new(ndarray::ArrayD::zeros(ndarray::IxDyn(&[2, 2]))))];
        let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
        assert!(acc.add(&wide, 0, 1).is_err());
        assert_eq!(acc.get_criterion(0).unwrap(), EpochCriterion::default());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range_panics() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        let sources = nodes(&[1.0f64, 1.0, 1.0]);
        let _ = acc.add(&sources, 2, 1);
    }

    #[test]
    fn test_scalar_node_set_value() {
        let mut node = ScalarNode::new(1.0f64, cpu()).unwrap();
        node.set_value(4.5).unwrap();
        assert_eq!(node.get_value().unwrap(), 4.5);
        assert!(!node.has_structural_sample_count());
        assert_eq!(node.device(), cpu());
    }

    #[test]
    fn test_scalar_node_from_host_storage() {
        let node = ScalarNode::<f32>::from_storage(Box::new(CPUStorage::scalar(2.5)), cpu()).unwrap();
        assert_eq!(node.device(), cpu());
        assert_eq!(node.get_value().unwrap(), 2.5);

        let wide = CPUStorage::<f32>::zeros(&[1, 2]).unwrap();
        assert!(ScalarNode::from_storage(wide, cpu()).is_err());
    }

    // ============= MinibatchLayout =============

    #[test]
    fn test_layout_excludes_padding() {
        let mut layout = MinibatchLayout::new(3, 4);
        layout.add_sequence(0, 0, 0, 4).unwrap();
        layout.add_sequence(1, 1, 0, 2).unwrap();
        layout.add_gap(1, 2, 4).unwrap();
        layout.add_sequence(2, 2, 1, 3).unwrap();

        assert_eq!(layout.num_cols(), 12);
        assert_eq!(layout.actual_num_samples(), 4 + 2 + 2);
        assert_eq!(layout.num_gap_frames(), 2);
        assert_eq!(layout.sequences().len(), 3);
    }

    #[test]
    fn test_layout_clips_sequences_to_window() {
        let mut layout = MinibatchLayout::new(1, 5);
        // Started in the previous minibatch and continues into the next
        layout.add_sequence(7, 0, -3, 8).unwrap();
        assert_eq!(layout.actual_num_samples(), 5);
        assert_eq!(layout.sequences()[0].len(), 11);
    }

    #[test]
    fn test_layout_rejects_overlap_and_bad_ranges() {
        let mut layout = MinibatchLayout::new(2, 4);
        layout.add_sequence(0, 0, 0, 3).unwrap();
        assert!(layout.add_sequence(1, 0, 2, 4).is_err());
        assert!(layout.add_gap(0, 1, 2).is_err());
        assert!(layout.add_sequence(2, 5, 0, 1).is_err());
        assert!(layout.add_sequence(3, 1, 2, 2).is_err());
        assert!(layout.add_sequence(4, 1, 6, 9).is_err());

        // Failed additions leave no trace
        assert_eq!(layout.sequences().len(), 1);
        assert_eq!(layout.actual_num_samples(), 3);
    }

    #[test]
    fn test_dense_layout() {
        let layout = MinibatchLayout::dense(4, 8).unwrap();
        assert_eq!(layout.actual_num_samples(), 32);
        assert_eq!(layout.num_parallel_sequences(), 4);
        assert_eq!(layout.num_time_steps(), 8);
    }

    // ============= EpochSummary =============

    #[test]
    fn test_epoch_summary() {
        let mut acc = CriterionAccumulator::new(2, cpu()).unwrap();
        let sources = nodes(&[5.0f64, 2.5]);
        acc.add(&sources, 0, 10).unwrap().add(&sources, 1, 10).unwrap();

        let names = vec!["ce".to_string(), "err".to_string()];
        let summary = EpochSummary::from_accumulator(3, &names, &acc).unwrap();

        assert_eq!(summary.get("ce"), Some(&EpochCriterion::new(5.0, 10)));
        assert_eq!(summary.get("missing"), None);
        assert!(!summary.any_nan());
        assert_eq!(
            summary.to_string(),
            "Finished Epoch[3]: ce = 0.50000000 * 10; err = 0.25000000 * 10"
        );

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: EpochSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);

        assert!(EpochSummary::from_accumulator(3, &names[..1], &acc).is_err());
    }
}
