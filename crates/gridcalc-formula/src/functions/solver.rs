//! Bounded Newton-Raphson iteration for the rate and yield functions

/// Iteration budget shared by every iterative numeric function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Converged once successive estimates differ by at most this much
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl SolverOptions {
    pub const DEFAULT: SolverOptions = SolverOptions {
        tolerance: 1.0e-7,
        max_iterations: 100,
    };
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Newton-Raphson with an analytic derivative
///
/// `None` when the function leaves its domain, the derivative vanishes or
/// the budget runs out without converging.
pub fn newton<F, DF>(guess: f64, options: SolverOptions, f: F, df: DF) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
    DF: Fn(f64) -> Option<f64>,
{
    let mut x = guess;
    for iteration in 0..options.max_iterations {
        let fx = f(x)?;
        let dfx = df(x)?;
        if dfx == 0.0 || !dfx.is_finite() {
            return None;
        }

        let next = x - fx / dfx;
        if !next.is_finite() {
            return None;
        }

        if (next - x).abs() <= options.tolerance {
            log::trace!("newton converged after {} iterations at {}", iteration + 1, next);
            return Some(next);
        }
        x = next;
    }

    log::debug!(
        "newton did not converge within {} iterations from guess {}",
        options.max_iterations,
        guess
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_root_of_two() {
        let root = newton(1.0, SolverOptions::DEFAULT, |x| Some(x * x - 2.0), |x| Some(2.0 * x));
        assert!((root.unwrap() - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_no_root_gives_up() {
        // x^2 + 1 has no real root; Newton wanders until the budget is spent
        let options = SolverOptions {
            tolerance: 1e-12,
            max_iterations: 50,
        };
        assert_eq!(newton(0.5, options, |x| Some(x * x + 1.0), |x| Some(2.0 * x)), None);
    }

    #[test]
    fn test_domain_exit() {
        assert_eq!(
            newton(1.0, SolverOptions::DEFAULT, |_| None, |_| Some(1.0)),
            None
        );
    }
}
