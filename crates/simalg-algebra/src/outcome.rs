//! Outcome of a product that may require symbolic distribution first

/// Either a concrete value or a request to distribute composite operands
/// before the product can be formed.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome<T> {
    Value(T),
    NeedsDistribution,
}

impl<T> EvalOutcome<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, EvalOutcome::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            EvalOutcome::Value(v) => Some(v),
            EvalOutcome::NeedsDistribution => None,
        }
    }

    pub fn as_ref(&self) -> EvalOutcome<&T> {
        match self {
            EvalOutcome::Value(v) => EvalOutcome::Value(v),
            EvalOutcome::NeedsDistribution => EvalOutcome::NeedsDistribution,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> EvalOutcome<U> {
        match self {
            EvalOutcome::Value(v) => EvalOutcome::Value(f(v)),
            EvalOutcome::NeedsDistribution => EvalOutcome::NeedsDistribution,
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> EvalOutcome<U>>(self, f: F) -> EvalOutcome<U> {
        match self {
            EvalOutcome::Value(v) => f(v),
            EvalOutcome::NeedsDistribution => EvalOutcome::NeedsDistribution,
        }
    }

    /// Convert into a `Result`, using `err` for the distribution request.
    pub fn ok_or_else<E, F: FnOnce() -> E>(self, err: F) -> Result<T, E> {
        match self {
            EvalOutcome::Value(v) => Ok(v),
            EvalOutcome::NeedsDistribution => Err(err()),
        }
    }
}

/// Return types that can carry a distribution request out of a function.
pub trait DistributionSignal {
    fn needs_distribution() -> Self;
}

impl<T> DistributionSignal for EvalOutcome<T> {
    fn needs_distribution() -> Self {
        EvalOutcome::NeedsDistribution
    }
}

impl<T, E> DistributionSignal for Result<EvalOutcome<T>, E> {
    fn needs_distribution() -> Self {
        Ok(EvalOutcome::NeedsDistribution)
    }
}

/// Unwrap an [`EvalOutcome`], returning the distribution request from the
/// enclosing function when there is no value.
#[macro_export]
macro_rules! try_value {
    ($outcome:expr) => {
        match $outcome {
            $crate::EvalOutcome::Value(value) => value,
            $crate::EvalOutcome::NeedsDistribution => {
                return $crate::DistributionSignal::needs_distribution();
            }
        }
    };
}
