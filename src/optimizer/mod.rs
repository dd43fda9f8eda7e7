//! Query tree optimizer
//!
//! Rewrites a parsed tree, in a fixed order, into one the emitter can lower
//! directly:
//!
//! 1. Field lists fan out to their physical fields
//! 2. The all-fields sentinel fans out to every default full-text field
//! 3. Rollup, array merge and reduce run to a fixed point
//! 4. Predicates bind to their owning index; foreign subtrees get generated
//!    expansions, sibling expansions fold together, and joins matching more
//!    than half of their index are inverted
//! 5. Negated primary-key arrays fold into positive siblings
//! 6. Generated expansions are paired with a copy of their inner query
//!
//! Each step sees the output of the one before it.

mod errors;
mod expansion;
mod fields;
mod hoist;
mod normalize;

use serde::Serialize;

use crate::ast::QueryTree;
use crate::compiler::CompilerConfig;
use crate::estimate::CountEstimator;
use crate::metadata::IndexMetadataRegistry;
use crate::observability::MetricsRegistry;

pub use errors::{OptimizerError, OptimizerErrorCode, OptimizerResult};

/// What the optimizer did to a tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub field_lists_expanded: usize,
    pub all_fields_expanded: usize,
    pub normalize_passes: usize,
    pub expansions_generated: usize,
    pub joins_inverted: usize,
    pub negations_hoisted: usize,
}

/// Runs the rewrite pipeline against one query's metadata
pub struct Optimizer<'r, 's> {
    registry: &'r mut IndexMetadataRegistry<'s>,
    config: &'r CompilerConfig,
    estimator: &'r CountEstimator<'r>,
    metrics: Option<&'r MetricsRegistry>,
}

impl<'r, 's> Optimizer<'r, 's> {
    pub fn new(
        registry: &'r mut IndexMetadataRegistry<'s>,
        config: &'r CompilerConfig,
        estimator: &'r CountEstimator<'r>,
    ) -> Self {
        Self {
            registry,
            config,
            estimator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'r MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Optimizes `tree` in place
    pub fn optimize(&mut self, tree: &mut QueryTree) -> OptimizerResult<OptimizeReport> {
        let mut report = OptimizeReport::default();
        let max_passes = self.config.max_rewrite_passes;

        // 1. Field lists
        report.field_lists_expanded = fields::expand_field_lists(tree, self.registry);

        // 2. All-fields sentinel
        report.all_fields_expanded =
            fields::expand_all_fields(tree, self.registry, &self.config.all_field);

        // 3. Structural fixed point
        report.normalize_passes = normalize::normalize(tree, max_passes)?;

        // 4. Expansion
        expansion::assign_links(tree, self.registry)?;
        let mut generated = expansion::generate(tree, self.registry)?;
        expansion::merge_siblings(tree, self.registry, &mut generated);
        report.normalize_passes += normalize::normalize(tree, max_passes)?;
        let inverted =
            expansion::invert(tree, self.registry, self.config, self.estimator, &generated)?;
        report.expansions_generated = generated.legs;
        report.joins_inverted = inverted.len();

        // 5. Negation hoisting
        report.negations_hoisted = hoist::hoist_negations(tree, self.registry);

        // 6. Generated expansions keep their inner query as an alternative
        expansion::pair_with_inner(tree, &inverted);

        if let Some(metrics) = self.metrics {
            metrics.add_expansions_generated(report.expansions_generated as u64);
            metrics.add_joins_inverted(report.joins_inverted as u64);
            metrics.add_not_hoists(report.negations_hoisted as u64);
        }

        Ok(report)
    }
}
