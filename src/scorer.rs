use std::sync::Arc;

use crate::{context::Context, kernel::Kernel, member::Marker, planner::ConstructorDirective, request::Request};

/// Ranks the constructors of a plan. The highest score wins, ties are ambiguous.
pub trait ConstructorScorer: Send + Sync {
    fn score(&self, kernel: &Kernel, context: &Arc<Context>, directive: &ConstructorDirective) -> i64;
}

/// A constructor carrying the inject marker always wins. Otherwise each satisfiable parameter
/// adds a point and a single unsatisfiable one sinks the constructor below every satisfiable one.
pub struct StandardConstructorScorer {
    marker: Marker,
}

impl StandardConstructorScorer {
    #[inline]
    #[must_use]
    pub fn new(marker: Marker) -> Self {
        Self { marker }
    }
}

impl ConstructorScorer for StandardConstructorScorer {
    fn score(&self, kernel: &Kernel, context: &Arc<Context>, directive: &ConstructorDirective) -> i64 {
        if directive.member.has_marker(self.marker) {
            return i64::MAX;
        }

        let mut score: i64 = 1;
        for target in &directive.targets {
            let satisfiable = context.parameters.iter().any(|parameter| parameter.applies_to(target))
                || target.is_optional()
                || target.is_many()
                || target.default().is_some()
                || kernel.can_resolve(&Request::child(context, target));

            score = score.saturating_add(1);
            if !satisfiable && score > 0 {
                score = score.saturating_add(i64::MIN);
            }
        }
        score
    }
}
