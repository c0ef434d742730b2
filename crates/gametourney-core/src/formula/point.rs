// Formula for games scored in points.

use super::{
    Expression, FixedTerms, Formula, FormulaError, Operator, Term, BONUS_OR_PENALTY, INVERSE_RANK,
};
use crate::models::TournamentConfig;
use crate::stats::{compute_cohort_stats, deviations_from_mean};

/// `Inverse Rank x Rank Multiplier x Duration Multiplier`, optionally
/// followed by `+ Bonus/Penalty` and `+ Participation Award`.
///
/// The bonus/penalty is how many standard deviations a player's points sit
/// from the game's mean, so a runaway win is worth more than a narrow one.
#[derive(Debug, Clone)]
pub struct PointFormula {
    expression: Expression,
    apply_bonus_or_penalty: bool,
}

impl PointFormula {
    pub fn new(config: &TournamentConfig) -> Self {
        let fixed = FixedTerms::from_config(config);
        let mut expression = fixed.scaled(Term::resettable(INVERSE_RANK));
        if config.apply_bonus_or_penalty {
            expression = expression.combine(Operator::Add, Term::resettable(BONUS_OR_PENALTY));
        }
        Self {
            expression: fixed.with_participation(expression),
            apply_bonus_or_penalty: config.apply_bonus_or_penalty,
        }
    }
}

impl Formula for PointFormula {
    fn expression(&self) -> &Expression {
        &self.expression
    }

    fn bind(
        &self,
        expression: &mut Expression,
        inverse_rank: usize,
        cohort_values: &[f64],
        own_value: f64,
    ) -> Result<(), FormulaError> {
        expression.bind(INVERSE_RANK, inverse_rank as f64)?;
        if self.apply_bonus_or_penalty {
            let stats = compute_cohort_stats(cohort_values);
            expression.bind(BONUS_OR_PENALTY, deviations_from_mean(own_value, &stats))?;
        }
        Ok(())
    }
}
