//! Configuration for the exists-forall loop

/// Loop limits and simulation gating
#[derive(Debug, Clone)]
pub struct EfsmtConfig {
    /// Maximum number of candidates examined (None means unbounded)
    ///
    /// A bound of `n` admits exactly `n` candidates; the next iteration
    /// reports `UnknownResult`. A `loops <= max` style bound would admit
    /// `n + 1`.
    pub max_loops: Option<usize>,
    /// Consult the batch oracle before each exact universal query
    pub simulate: bool,
}

impl Default for EfsmtConfig {
    fn default() -> Self {
        Self {
            max_loops: Some(1000),
            simulate: true,
        }
    }
}

impl EfsmtConfig {
    /// Create a config with no iteration bound
    pub fn unbounded() -> Self {
        Self {
            max_loops: None,
            ..Self::default()
        }
    }

    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = Some(max_loops);
        self
    }

    pub fn with_max_loops_option(mut self, max_loops: Option<usize>) -> Self {
        self.max_loops = max_loops;
        self
    }

    pub fn with_simulation(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }
}
