//! Derivative-free Nelder–Mead simplex minimizer used to tune GP hyper-parameters.
//!
//! Coefficients are the standard ones (reflection 1, expansion 2, contraction ½, shrink ½).
//! Non-finite objective values are treated as `+∞`, so infeasible regions simply repel the
//! simplex.

/// Result of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Minimize `f` starting from `x0` with an initial simplex of edge `step`.
///
/// Stops when the spread of objective values over the simplex drops below `tol`
/// or after `max_iter` iterations.
pub(crate) fn minimize<F>(mut f: F, x0: &[f64], step: f64, max_iter: usize, tol: f64) -> Minimum
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    let mut eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((x0.to_vec(), eval(x0)));
    for i in 0..n {
        let mut x = x0.to_vec();
        x[i] += step;
        let v = eval(&x);
        simplex.push((x, v));
    }

    let mut iterations = 0;
    while iterations < max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[n].1;
        if best.is_finite() && (worst - best).abs() <= tol {
            break;
        }
        iterations += 1;

        // Centroid of every vertex but the worst
        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |coef: f64, from: &[f64]| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coef * (x - c))
                .collect()
        };

        let reflected = towards(-1.0, &simplex[n].0);
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = towards(-2.0, &simplex[n].0);
            let f_expanded = eval(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
        } else {
            let contracted = if f_reflected < simplex[n].1 {
                towards(-0.5, &simplex[n].0)
            } else {
                towards(0.5, &simplex[n].0)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < simplex[n].1.min(f_reflected) {
                simplex[n] = (contracted, f_contracted);
            } else {
                // shrink towards the best vertex
                let best_x = simplex[0].0.clone();
                for vertex in simplex.iter_mut().skip(1) {
                    let x: Vec<f64> = best_x
                        .iter()
                        .zip(&vertex.0)
                        .map(|(b, x)| b + 0.5 * (x - b))
                        .collect();
                    let v = eval(&x);
                    *vertex = (x, v);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Minimum {
        x,
        value,
        iterations,
    }
}
