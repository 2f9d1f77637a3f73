use std::env;

/// Per-iteration tracing, switched on through the environment.
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub every: usize,
}

impl DiagnosticsConfig {
    pub fn from_env() -> Self {
        let enabled = match env::var("PRIMAL_DIAGNOSTICS") {
            Ok(v) => v != "0" && v.to_lowercase() != "false",
            Err(_) => false,
        };

        let every = env::var("PRIMAL_DIAGNOSTICS_EVERY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1);

        Self { enabled, every }
    }

    #[inline]
    pub fn should_log(&self, iter: usize) -> bool {
        self.enabled && (iter % self.every == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_log_respects_interval() {
        let diag = DiagnosticsConfig {
            enabled: true,
            every: 3,
        };
        assert!(diag.should_log(0));
        assert!(!diag.should_log(1));
        assert!(diag.should_log(6));

        let off = DiagnosticsConfig {
            enabled: false,
            every: 1,
        };
        assert!(!off.should_log(0));
    }
}
