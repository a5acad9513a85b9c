use thiserror::Error;

/// Which tier of a [`TwoTier`] produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub tier: Tier,
}

/// Both tiers failed; keeps both errors for logging.
#[derive(Debug, Error)]
#[error("primary failed: {primary}; fallback failed: {fallback}")]
pub struct Exhausted<E> {
    pub primary: E,
    pub fallback: E,
}

/// A primary operation plus the operation to run when it fails.
///
/// The fallback receives the primary's error so it can log or adapt.
pub struct TwoTier<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> TwoTier<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn run<I, T, E>(&self, input: &I) -> Result<Resolved<T>, Exhausted<E>>
    where
        I: ?Sized,
        P: Fn(&I) -> Result<T, E>,
        F: Fn(&I, &E) -> Result<T, E>,
    {
        let primary = match (self.primary)(input) {
            Ok(value) => return Ok(Resolved { value, tier: Tier::Primary }),
            Err(e) => e,
        };
        match (self.fallback)(input, &primary) {
            Ok(value) => Ok(Resolved { value, tier: Tier::Fallback }),
            Err(fallback) => Err(Exhausted { primary, fallback }),
        }
    }
}
