// Metascore formulas: expression templates built from tournament config.

pub mod expression;
pub mod point;
pub mod rank;

use thiserror::Error;

use crate::models::{ScoreType, TournamentConfig};

pub use expression::{Expression, Node, Operand, Operator, Term};
pub use point::PointFormula;
pub use rank::RankFormula;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("cannot evaluate term `{label}`: it has no value")]
    UnboundTerm { label: String },

    #[error("cannot set term `{label}`: it is fixed by the tournament configuration")]
    ImmutableTerm { label: String },

    #[error("formula has no term labelled `{label}`")]
    UnknownTerm { label: String },

    #[error("division by zero (dividend {dividend})")]
    DivisionByZero { dividend: f64 },

    #[error("cannot evaluate an empty expression")]
    EmptyExpression,
}

// ---------------------------------------------------------------------------
// Term labels
// ---------------------------------------------------------------------------

pub const RANK_MULTIPLIER: &str = "Rank Multiplier";
pub const DURATION_MULTIPLIER: &str = "Duration Multiplier";
pub const PARTICIPATION_AWARD: &str = "Participation Award";
pub const INVERSE_RANK: &str = "Inverse Rank";
pub const INVERSE_ADJUSTED_RANK: &str = "Inverse Adjusted Rank";
pub const BONUS_OR_PENALTY: &str = "Bonus/Penalty";

// ---------------------------------------------------------------------------
// Formula trait
// ---------------------------------------------------------------------------

/// A metascore formula.
///
/// Implementors hold an expression template whose resettable terms are
/// unbound. `compute` binds a private copy of the template for one player, so
/// a formula is never mutated by scoring and calls cannot leak into each
/// other.
pub trait Formula {
    /// The expression template.
    fn expression(&self) -> &Expression;

    /// Bind this formula's resettable terms for one player.
    fn bind(
        &self,
        expression: &mut Expression,
        inverse_rank: usize,
        cohort_values: &[f64],
        own_value: f64,
    ) -> Result<(), FormulaError>;

    /// Metascore for one player.
    fn compute(
        &self,
        inverse_rank: usize,
        cohort_values: &[f64],
        own_value: f64,
    ) -> Result<f64, FormulaError> {
        let mut expression = self.expression().clone();
        expression.reset_all();
        self.bind(&mut expression, inverse_rank, cohort_values, own_value)?;
        expression.evaluate()
    }

    /// The formula as text, with placeholders for per-player terms.
    fn show(&self) -> String {
        let mut expression = self.expression().clone();
        expression.reset_all();
        expression.render()
    }
}

// ---------------------------------------------------------------------------
// Fixed terms shared by both formulas
// ---------------------------------------------------------------------------

/// The configuration-derived terms every formula carries.
#[derive(Debug, Clone)]
pub struct FixedTerms {
    pub rank_multiplier: Term,
    pub duration_multiplier: Term,
    /// Present only when the tournament has an active participation award.
    pub participation_award: Option<Term>,
}

impl FixedTerms {
    pub fn from_config(config: &TournamentConfig) -> Self {
        Self {
            rank_multiplier: Term::fixed(RANK_MULTIPLIER, config.rank_multiplier),
            duration_multiplier: Term::fixed(DURATION_MULTIPLIER, config.duration_multiplier),
            participation_award: config
                .has_participation_award()
                .then(|| Term::fixed(PARTICIPATION_AWARD, config.participation_award)),
        }
    }

    /// `lead x Rank Multiplier x Duration Multiplier`
    pub fn scaled(&self, lead: Term) -> Expression {
        Expression::from(lead)
            .combine(Operator::Multiply, self.rank_multiplier.clone())
            .combine(Operator::Multiply, self.duration_multiplier.clone())
    }

    /// Append `+ Participation Award` when the award is active.
    pub fn with_participation(&self, expression: Expression) -> Expression {
        match &self.participation_award {
            Some(award) => expression.combine(Operator::Add, award.clone()),
            None => expression,
        }
    }
}

// ---------------------------------------------------------------------------
// Formula selection
// ---------------------------------------------------------------------------

/// The formula matching a game's score type.
#[derive(Debug, Clone)]
pub enum MetascoreFormula {
    Point(PointFormula),
    Rank(RankFormula),
}

impl MetascoreFormula {
    pub fn new(score_type: ScoreType, config: &TournamentConfig) -> Self {
        match score_type {
            ScoreType::Points => MetascoreFormula::Point(PointFormula::new(config)),
            ScoreType::Rank => MetascoreFormula::Rank(RankFormula::new(config)),
        }
    }

    pub fn score_type(&self) -> ScoreType {
        match self {
            MetascoreFormula::Point(_) => ScoreType::Points,
            MetascoreFormula::Rank(_) => ScoreType::Rank,
        }
    }
}

impl Formula for MetascoreFormula {
    fn expression(&self) -> &Expression {
        match self {
            MetascoreFormula::Point(formula) => formula.expression(),
            MetascoreFormula::Rank(formula) => formula.expression(),
        }
    }

    fn bind(
        &self,
        expression: &mut Expression,
        inverse_rank: usize,
        cohort_values: &[f64],
        own_value: f64,
    ) -> Result<(), FormulaError> {
        match self {
            MetascoreFormula::Point(formula) => {
                formula.bind(expression, inverse_rank, cohort_values, own_value)
            }
            MetascoreFormula::Rank(formula) => {
                formula.bind(expression, inverse_rank, cohort_values, own_value)
            }
        }
    }
}
