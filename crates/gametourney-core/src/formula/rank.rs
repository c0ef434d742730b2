// Formula for games scored by finishing rank.

use super::{Expression, FixedTerms, Formula, FormulaError, Term, INVERSE_ADJUSTED_RANK};
use crate::models::TournamentConfig;

/// `Inverse Adjusted Rank x Rank Multiplier x Duration Multiplier`, optionally
/// followed by `+ Participation Award`.
///
/// Ranks only carry order, so there is no bonus/penalty term even when the
/// tournament enables one.
#[derive(Debug, Clone)]
pub struct RankFormula {
    expression: Expression,
}

impl RankFormula {
    pub fn new(config: &TournamentConfig) -> Self {
        let fixed = FixedTerms::from_config(config);
        let expression = fixed.scaled(Term::resettable(INVERSE_ADJUSTED_RANK));
        Self {
            expression: fixed.with_participation(expression),
        }
    }
}

impl Formula for RankFormula {
    fn expression(&self) -> &Expression {
        &self.expression
    }

    fn bind(
        &self,
        expression: &mut Expression,
        inverse_rank: usize,
        _cohort_values: &[f64],
        _own_value: f64,
    ) -> Result<(), FormulaError> {
        expression.bind(INVERSE_ADJUSTED_RANK, inverse_rank as f64)
    }
}
