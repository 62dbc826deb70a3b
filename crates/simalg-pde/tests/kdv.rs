use simalg_algebra::{EvalOutcome, F64Factory};
use simalg_pde::{CellReport, Grid, KdvProblem, NoopObserver, Window, KDV_REACH};
use simalg_symbolic::eval_expr;

fn small_problem() -> KdvProblem {
    KdvProblem {
        time_rows: 8,
        space_columns: 9,
        bump_center: 4,
        ..KdvProblem::default()
    }
}

#[test]
fn default_problem_marches_every_cell() {
    let problem = KdvProblem::default();
    let initial = problem.initial_row();

    let mut cells = 0usize;
    let mut observer = |report: &CellReport<'_, f64>| {
        cells += 1;
        let (residual, value) = (*report.residual, *report.value);
        assert!(
            residual.abs() < 0.01 * value.abs() + 0.01,
            "residual {residual} at ({}, {})",
            report.t,
            report.x
        );

        let touches = &report.touches;
        for (dt, dx) in [(0, -2), (0, -1), (0, 0), (0, 1), (0, 2), (1, 0), (-1, 0)] {
            assert!(touches.touched(dt, dx), "({dt}, {dx}) unread\n{touches}");
        }
        for (dt, dx) in [(-1, -2), (1, 2), (1, -1), (-1, 1)] {
            assert!(!touches.touched(dt, dx), "({dt}, {dx}) read\n{touches}");
        }
    };
    let grid = problem.solve_with_observer(&mut observer).unwrap();

    assert_eq!(cells, 148 * 25);
    assert_eq!(grid.height(), 150);
    assert_eq!(grid.row(0), initial.as_slice());
    assert_eq!(grid.row(1), initial.as_slice());
    assert!(grid.rows().flatten().all(|v| v.is_finite()));
}

#[test]
fn corrector_only_changes_later_rows() {
    let corrected = small_problem().solve().unwrap();
    let plain = KdvProblem {
        predictor_corrector: false,
        ..small_problem()
    }
    .solve()
    .unwrap();

    // t = 1 is solved once either way
    assert_eq!(corrected.row(2), plain.row(2));
    assert_ne!(corrected.row(3), plain.row(3));
    assert!(corrected.rows().flatten().all(|v| v.is_finite()));
}

#[test]
fn dispersion_term_reaches_two_columns() {
    let problem = KdvProblem {
        dispersion: 1.0,
        ..small_problem()
    };
    let solver = problem.solver().unwrap();

    // a single raised sample two columns to the right of the cell
    let mut row = vec![0.0; problem.space_columns];
    row[6] = 1.0;
    let grid = Grid::new(vec![row.clone(), row], F64Factory).unwrap();
    let mut window = Window::with_reach(&F64Factory, KDV_REACH);
    window.load(&grid, 1, 4);

    // only V * u[x+2] / 2dx^3 survives
    let f = match eval_expr(solver.function(), &window, &problem.step_sizes()).unwrap() {
        EvalOutcome::Value(v) => v,
        EvalOutcome::NeedsDistribution => panic!("F needs distribution"),
    };
    let expected = 1.0 / (2.0 * problem.dx.powi(3));
    assert!((f - expected).abs() < 1e-6 * expected, "F = {f}");

    // d/du[t+1] of -(u[t+1] - u[t-1]) / 2dt
    let slope = match eval_expr(solver.derivative(), &window, &problem.step_sizes()).unwrap() {
        EvalOutcome::Value(v) => v,
        EvalOutcome::NeedsDistribution => panic!("dF needs distribution"),
    };
    assert!((slope + 1.0 / (2.0 * problem.dt)).abs() < 1e-9, "slope {slope}");
}

#[test]
fn narrow_window_cannot_hold_the_dispersion_stencil() {
    let problem = small_problem();
    let solver = problem.solver().unwrap();
    let grid = Grid::new(vec![problem.initial_row(), problem.initial_row()], F64Factory).unwrap();
    let mut window = Window::new(&F64Factory);
    window.load(&grid, 1, 4);
    assert!(eval_expr(solver.function(), &window, &problem.step_sizes()).is_err());
}

#[test]
fn marching_is_deterministic() {
    let problem = small_problem();
    let run = || -> Vec<u64> {
        problem
            .solve_from_row(problem.initial_row(), &mut NoopObserver)
            .unwrap()
            .into_rows()
            .into_iter()
            .flatten()
            .map(f64::to_bits)
            .collect()
    };
    assert_eq!(run(), run());
}
