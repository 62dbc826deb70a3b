//! Newton-Raphson iteration over symbolic functions
//!
//! The function is given one level up: an `Expr<Expr<V>>` evaluated once in
//! a first-level space that lifts its leaves into `Expr<V>` leaves. This
//! lowers every derivative operator into its stencil, leaving plain `F` and
//! `dF = dF/dU` expressions over grid samples. Both are then simplified and
//! interned into one arena, so every solve only evaluates `Expr<V>` trees.

use crate::config::{CacheMode, NewtonConfig};
use crate::policy::{FixedIterations, TerminationPolicy};
use crate::{Result, SolverError};
use log::{debug, trace};
use simalg_algebra::{AlgebraicElem, AlgebraicFactory, Coefficient, EvalOutcome, Magnitude, Side};
use simalg_symbolic::{
    wrt, EvalCache, Evaluator, Expr, ExprArena, ImplicitSpace, Leaf, NodeId, SpaceToken,
    StepSizes, WrtSet,
};

/// An implicit space holding the current guess for the unknown.
pub trait GuessSpace<V>: ImplicitSpace<V> {
    /// Add `delta` to the current guess.
    fn perform_iteration_update(&mut self, delta: &V);

    /// Remember the current guess so a rejected step can be undone.
    fn save_guess(&mut self);

    /// Return to the guess recorded by the last `save_guess`.
    fn restore_guess(&mut self);
}

/// Views a guess space under a solver-owned generation, so one shared cache
/// never serves entries from before a guess update.
struct AtGeneration<'a, G> {
    space: &'a G,
    generation: u64,
}

impl<V, G: ImplicitSpace<V>> ImplicitSpace<V> for AtGeneration<'_, G> {
    fn token(&self) -> SpaceToken {
        self.space.token().with_generation(self.generation)
    }

    fn lookup(&self, leaf: &Leaf) -> Option<V> {
        self.space.lookup(leaf)
    }
}

/// Which prepared expression to evaluate
#[derive(Debug, Clone, Copy)]
enum Target {
    Function,
    Derivative,
}

impl Target {
    fn stage(self) -> &'static str {
        match self {
            Target::Function => "function",
            Target::Derivative => "derivative",
        }
    }
}

pub struct NewtonRaphson<V: AlgebraicElem> {
    config: NewtonConfig,
    steps: StepSizes,
    unknown: WrtSet,
    function: Expr<V>,
    derivative: Expr<V>,
    arena: ExprArena<V>,
    function_id: NodeId,
    derivative_id: NodeId,
}

impl<V: AlgebraicElem> NewtonRaphson<V> {
    /// Prepare `F` and `dF/d(unknown)`.
    pub fn construct<S>(
        function: &Expr<Expr<V>>,
        unknown: Leaf,
        first_level: &S,
        steps: StepSizes,
        config: NewtonConfig,
    ) -> Result<Self>
    where
        S: ImplicitSpace<Expr<V>>,
    {
        Self::construct_with_respect_to(function, wrt(unknown), first_level, steps, config)
    }

    /// Like [`construct`](Self::construct), differentiating with respect to
    /// every leaf of `with_respect_to` at once.
    pub fn construct_with_respect_to<S>(
        function: &Expr<Expr<V>>,
        with_respect_to: WrtSet,
        first_level: &S,
        steps: StepSizes,
        config: NewtonConfig,
    ) -> Result<Self>
    where
        S: ImplicitSpace<Expr<V>>,
    {
        config.validate()?;

        let mut outer = ExprArena::new(function.value_factory().clone());
        let root = outer.intern(function);
        let mut cache = EvalCache::new();
        let mut evaluator = Evaluator::new(&outer, first_level, &steps, &mut cache);
        let f = match evaluator.eval(root)? {
            EvalOutcome::Value(f) => f,
            EvalOutcome::NeedsDistribution => {
                return Err(SolverError::NeedsDistribution { stage: "function" })
            }
        };
        let df = match evaluator.eval_partial_derivative(root, &with_respect_to)? {
            EvalOutcome::Value(df) => df,
            EvalOutcome::NeedsDistribution => {
                return Err(SolverError::NeedsDistribution { stage: "derivative" })
            }
        };
        let stats = evaluator.cache_stats();

        let raw_nodes = (f.node_count(), df.node_count());
        let function = config.simplification.apply(f);
        let derivative = config.simplification.apply(df);
        debug!(
            "newton: F {} -> {} nodes, dF {} -> {} nodes ({:?} simplification); first-level cache {} hits, {} misses",
            raw_nodes.0,
            function.node_count(),
            raw_nodes.1,
            derivative.node_count(),
            config.simplification,
            stats.hits,
            stats.misses,
        );

        let mut arena = ExprArena::new(function.value_factory().clone());
        let function_id = arena.intern(&function);
        let derivative_id = arena.intern(&derivative);

        Ok(NewtonRaphson {
            config,
            steps,
            unknown: with_respect_to,
            function,
            derivative,
            arena,
            function_id,
            derivative_id,
        })
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn unknown(&self) -> &WrtSet {
        &self.unknown
    }

    /// `F` over grid samples
    pub fn function(&self) -> &Expr<V> {
        &self.function
    }

    /// `dF` over grid samples
    pub fn derivative(&self) -> &Expr<V> {
        &self.derivative
    }

    /// Run the configured fixed number of iterations and return the last
    /// residual.
    pub fn eval<G: GuessSpace<V>>(&self, guess: &mut G) -> Result<V> {
        let mut policy = FixedIterations::new(self.config.iterations);
        self.eval_with(guess, &mut policy)
    }

    pub fn eval_with<G, P>(&self, guess: &mut G, policy: &mut P) -> Result<V>
    where
        G: GuessSpace<V>,
        P: TerminationPolicy<V> + ?Sized,
    {
        self.solve(guess, policy, None)
    }

    /// Newton iteration with step halving: a step that `improved` rejects is
    /// undone and retried at half length, up to `max_backtrack` times.
    pub fn eval_backtracking<G, P, I>(&self, guess: &mut G, policy: &mut P, improved: I) -> Result<V>
    where
        G: GuessSpace<V>,
        P: TerminationPolicy<V> + ?Sized,
        I: Fn(&V, &V) -> bool,
    {
        self.solve(guess, policy, Some(&improved))
    }

    fn solve<G, P>(
        &self,
        guess: &mut G,
        policy: &mut P,
        improved: Option<&dyn Fn(&V, &V) -> bool>,
    ) -> Result<V>
    where
        G: GuessSpace<V>,
        P: TerminationPolicy<V> + ?Sized,
    {
        let mut shared = EvalCache::new();
        let mut generation = 0u64;
        let mut iterations = 0usize;
        let mut backtracks = 0usize;

        policy.reset();
        let mut last = self.value(Target::Function, guess, generation, &mut shared)?;
        while !policy.iterations_done(&last) {
            let slope = self.value(Target::Derivative, guess, generation, &mut shared)?;
            let delta = self.offset(&last, &slope)?;

            guess.save_guess();
            guess.perform_iteration_update(&delta);
            generation += 1;
            let mut next = self.value(Target::Function, guess, generation, &mut shared)?;

            if let Some(improved) = improved {
                if !improved(&last, &next) {
                    let half = delta.factory().coefficient(&Coefficient::rational(1, 2));
                    let mut step = delta;
                    let mut accepted = false;
                    for _ in 0..self.config.max_backtrack {
                        step = match half.multiply(&step) {
                            EvalOutcome::Value(s) => s,
                            EvalOutcome::NeedsDistribution => {
                                return Err(SolverError::NeedsDistribution {
                                    stage: "backtracking",
                                })
                            }
                        };
                        backtracks += 1;
                        guess.restore_guess();
                        guess.perform_iteration_update(&step);
                        generation += 1;
                        next = self.value(Target::Function, guess, generation, &mut shared)?;
                        if improved(&last, &next) {
                            accepted = true;
                            break;
                        }
                    }
                    if !accepted {
                        trace!("newton: backtracking exhausted after {backtracks} halvings");
                    }
                }
            }

            last = next;
            iterations += 1;
            trace!("newton: iteration {iterations} residual {last:?}");
        }

        let stats = shared.stats();
        debug!(
            "newton: solved in {iterations} iterations, {backtracks} backtracks; shared cache {} hits, {} misses",
            stats.hits, stats.misses
        );
        Ok(last)
    }

    /// `-(dF^-1 F)` or `-(F dF^-1)` depending on the configured side.
    fn offset(&self, residual: &V, slope: &V) -> Result<V> {
        let side = self.config.side;
        let inverse = match slope.invert(side)? {
            EvalOutcome::Value(inv) => inv,
            EvalOutcome::NeedsDistribution => {
                return Err(SolverError::NeedsDistribution { stage: "inversion" })
            }
        };
        let product = match side {
            Side::Left => inverse.multiply(residual),
            Side::Right => residual.multiply(&inverse),
        };
        match product {
            EvalOutcome::Value(p) => Ok(p.negate()),
            EvalOutcome::NeedsDistribution => Err(SolverError::NeedsDistribution { stage: "update" }),
        }
    }

    fn value<G: ImplicitSpace<V>>(
        &self,
        target: Target,
        guess: &G,
        generation: u64,
        shared: &mut EvalCache<V>,
    ) -> Result<V> {
        let space = AtGeneration {
            space: guess,
            generation,
        };
        let mut local: EvalCache<V>;
        let cache = match self.config.cache_mode {
            CacheMode::SharedPerSolve => shared,
            CacheMode::PerEvaluation => {
                local = EvalCache::new();
                &mut local
            }
        };
        let mut evaluator = Evaluator::new(&self.arena, &space, &self.steps, cache);
        let outcome = match target {
            Target::Function => evaluator.eval(self.function_id)?,
            Target::Derivative => evaluator.eval(self.derivative_id)?,
        };
        match outcome {
            EvalOutcome::Value(v) => Ok(v),
            EvalOutcome::NeedsDistribution => Err(SolverError::NeedsDistribution {
                stage: target.stage(),
            }),
        }
    }
}

impl<V: AlgebraicElem + Magnitude> NewtonRaphson<V> {
    /// Solve with the configured termination policy, backtracking on
    /// [`residual_decreased`](crate::residual_decreased) when enabled.
    pub fn eval_configured<G: GuessSpace<V>>(&self, guess: &mut G) -> Result<V> {
        let mut policy = self.config.termination_policy::<V>();
        if self.config.backtrack {
            self.eval_backtracking(guess, &mut policy, crate::residual_decreased::<V>)
        } else {
            self.eval_with(guess, &mut policy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simalg_algebra::F64Factory;
    use simalg_symbolic::{ExprFactory, MapSpace, SymbolicSpace};

    struct Scalar {
        space: MapSpace<f64>,
        saved: f64,
    }

    impl Scalar {
        fn new(x: f64) -> Self {
            Scalar {
                space: MapSpace::new().with(Leaf::named("x"), x),
                saved: x,
            }
        }

        fn x(&self) -> f64 {
            self.space.get(&Leaf::named("x")).copied().unwrap_or(f64::NAN)
        }
    }

    impl ImplicitSpace<f64> for Scalar {
        fn token(&self) -> SpaceToken {
            self.space.token()
        }

        fn lookup(&self, leaf: &Leaf) -> Option<f64> {
            self.space.lookup(leaf)
        }
    }

    impl GuessSpace<f64> for Scalar {
        fn perform_iteration_update(&mut self, delta: &f64) {
            let x = self.x() + delta;
            self.space.bind(Leaf::named("x"), x);
        }

        fn save_guess(&mut self) {
            self.saved = self.x();
        }

        fn restore_guess(&mut self) {
            self.space.bind(Leaf::named("x"), self.saved);
        }
    }

    #[test]
    fn test_linear_equation_solves_in_one_step() {
        // 4x - 2
        let x = Expr::leaf(Leaf::named("x"), ExprFactory::new(F64Factory));
        let four = Expr::constant(Expr::constant(4.0));
        let two = Expr::constant(Expr::constant(2.0));
        let f = four.times(&x).minus(&two);
        let solver = NewtonRaphson::construct(
            &f,
            Leaf::named("x"),
            &SymbolicSpace::new(F64Factory),
            StepSizes::new(),
            NewtonConfig::default().with_iterations(1),
        )
        .unwrap();

        let mut guess = Scalar::new(10.0);
        let residual = solver.eval(&mut guess).unwrap();
        assert_eq!(guess.x(), 0.5);
        assert_eq!(residual, 0.0);
    }
}
