use clap::ValueEnum;
use primal_core::DirectionMode;

/// Direction mode used for nonlinear objectives.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeChoice {
    /// Conjugate-gradient over superbasic variables
    Cg,
    /// Full reduced gradient
    Full,
    /// Largest single reduced cost, as for LPs
    Single,
    /// Superbasic variables only
    Superbasic,
}

impl From<ModeChoice> for DirectionMode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::Cg => DirectionMode::ConjugateGradient,
            ModeChoice::Full => DirectionMode::FullReducedGradient,
            ModeChoice::Single => DirectionMode::LargestSingleDj,
            ModeChoice::Superbasic => DirectionMode::SuperBasicOnly,
        }
    }
}
