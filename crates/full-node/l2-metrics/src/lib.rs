//! Prometheus metrics for the L2 node.

#![deny(missing_docs)]

use std::sync::OnceLock;

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
};

/// Applies a function to the global [`Metrics`] instance if and only if the
/// `native` feature is enabled.
pub fn update_metrics<F>(f: F)
where
    F: FnOnce(&Metrics),
{
    if cfg!(feature = "native") {
        static METRICS: OnceLock<Metrics> = OnceLock::new();

        f(OnceLock::get_or_init(&METRICS, || {
            Metrics::new(prometheus::default_registry())
                .expect("failed to register L2 node metrics; this is a bug")
        }));
    }
}

/// Prometheus metrics for the driver and the execution backend.
///
/// Values of this type are only accessible through the [`update_metrics`] function.
#[derive(Debug)]
pub struct Metrics {
    /// Number of successful derivation steps.
    pub derivation_steps: IntCounter,
    /// Number of failed derivation steps scheduled for a retry.
    pub derivation_retries: IntCounter,
    /// Number of recoveries started.
    pub recoveries: IntCounter,
    /// Number of successful sequencer steps.
    pub sequencer_steps: IntCounter,
    /// Number of fork-choice updates processed.
    pub forkchoice_updates: IntCounter,
    /// Number of blocks sealed by the payload builder.
    pub blocks_built: IntCounter,
    /// Number of transactions included in built blocks.
    pub transactions_included: IntCounter,
    /// Number of pool transactions skipped or dropped while building.
    pub transactions_skipped: IntCounter,
    /// Height of the current canonical head.
    pub head_number: IntGauge,
}

impl Metrics {
    fn new(registry: &prometheus::Registry) -> prometheus::Result<Self> {
        let derivation_steps = register_int_counter_with_registry!(
            "l2_derivation_steps",
            "Number of successful derivation steps",
            registry,
        )?;

        let derivation_retries = register_int_counter_with_registry!(
            "l2_derivation_retries",
            "Number of failed derivation steps scheduled for a retry",
            registry,
        )?;

        let recoveries = register_int_counter_with_registry!(
            "l2_recoveries",
            "Number of recoveries started",
            registry,
        )?;

        let sequencer_steps = register_int_counter_with_registry!(
            "l2_sequencer_steps",
            "Number of successful sequencer steps",
            registry,
        )?;

        let forkchoice_updates = register_int_counter_with_registry!(
            "l2_forkchoice_updates",
            "Number of fork-choice updates processed",
            registry,
        )?;

        let blocks_built = register_int_counter_with_registry!(
            "l2_blocks_built",
            "Number of blocks sealed by the payload builder",
            registry,
        )?;

        let transactions_included = register_int_counter_with_registry!(
            "l2_transactions_included",
            "Number of transactions included in built blocks",
            registry,
        )?;

        let transactions_skipped = register_int_counter_with_registry!(
            "l2_transactions_skipped",
            "Number of pool transactions skipped or dropped while building",
            registry,
        )?;

        let head_number = register_int_gauge_with_registry!(
            "l2_head_number",
            "Height of the current canonical head",
            registry,
        )?;

        Ok(Self {
            derivation_steps,
            derivation_retries,
            recoveries,
            sequencer_steps,
            forkchoice_updates,
            blocks_built,
            transactions_included,
            transactions_skipped,
            head_number,
        })
    }
}

#[cfg(all(test, feature = "native"))]
mod tests {
    use super::*;

    #[test]
    fn counters_are_shared_across_calls() {
        update_metrics(|m| m.blocks_built.inc());
        let mut seen = 0;
        update_metrics(|m| seen = m.blocks_built.get());
        assert!(seen >= 1);
    }
}
