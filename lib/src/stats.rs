//! # Binomial proportion confidence bounds
//!
//! Exact (Clopper-Pearson) one-sided bounds on a binomial proportion,
//! built on the regularized incomplete beta function. The observed success
//! count may be fractional: the scorer feeds it scaled point totals, not
//! just win counts.

const MAX_ITERATIONS: usize = 200;
const EPSILON: f64 = 3.0e-14;
const FPMIN: f64 = 1.0e-300;

/// Natural log of the gamma function (Lanczos approximation)
pub fn ln_gamma(x: f64) -> f64 {
  const COF: [f64; 6] = [
    76.180_091_729_471_46,
    -86.505_320_329_416_77,
    24.014_098_240_830_91,
    -1.231_739_572_450_155,
    0.120_865_097_386_617_9e-2,
    -0.539_523_938_495_3e-5,
  ];
  let mut y = x;
  let tmp = x + 5.5;
  let tmp = (x + 0.5) * tmp.ln() - tmp;
  let mut ser = 1.000_000_000_190_015;
  for &c in COF.iter() {
    y += 1.0;
    ser += c / y;
  }
  tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Continued fraction for the incomplete beta function (modified Lentz)
fn betacf(a: f64, b: f64, x: f64) -> f64 {
  let qab = a + b;
  let qap = a + 1.0;
  let qam = a - 1.0;
  let mut c = 1.0;
  let mut d = 1.0 - qab * x / qap;
  if d.abs() < FPMIN {
    d = FPMIN;
  }
  d = 1.0 / d;
  let mut h = d;
  for m in 1..=MAX_ITERATIONS {
    let m = m as f64;
    let m2 = 2.0 * m;
    let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
    d = 1.0 + aa * d;
    if d.abs() < FPMIN {
      d = FPMIN;
    }
    c = 1.0 + aa / c;
    if c.abs() < FPMIN {
      c = FPMIN;
    }
    d = 1.0 / d;
    h *= d * c;
    let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
    d = 1.0 + aa * d;
    if d.abs() < FPMIN {
      d = FPMIN;
    }
    c = 1.0 + aa / c;
    if c.abs() < FPMIN {
      c = FPMIN;
    }
    d = 1.0 / d;
    let del = d * c;
    h *= del;
    if (del - 1.0).abs() < EPSILON {
      break;
    }
  }
  h
}

/// Regularized incomplete beta function I_x(a, b)
pub fn inc_beta(a: f64, b: f64, x: f64) -> f64 {
  if x <= 0.0 {
    return 0.0;
  }
  if x >= 1.0 {
    return 1.0;
  }
  let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
  let front = ln_front.exp();
  if x < (a + 1.0) / (a + b + 2.0) {
    front * betacf(a, b, x) / a
  } else {
    1.0 - front * betacf(b, a, 1.0 - x) / b
  }
}

/// Inverse of I_x(a, b) in x, by bisection. I_x is monotone increasing in
/// x, so 100 halvings pin the root well below the tolerance of the forward
/// evaluation.
pub fn inv_inc_beta(a: f64, b: f64, p: f64) -> f64 {
  if p <= 0.0 {
    return 0.0;
  }
  if p >= 1.0 {
    return 1.0;
  }
  let mut lo = 0.0;
  let mut hi = 1.0;
  for _ in 0..100 {
    let mid = 0.5 * (lo + hi);
    if inc_beta(a, b, mid) < p {
      lo = mid;
    } else {
      hi = mid;
    }
  }
  0.5 * (lo + hi)
}

/// Lower Clopper-Pearson bound on p given `successes` out of `trials`,
/// holding with one-sided risk `alpha`
pub fn proportion_lower_bound(trials: f64, successes: f64, alpha: f64) -> f64 {
  if trials <= 0.0 || successes <= 0.0 {
    return 0.0;
  }
  if successes >= trials {
    return inv_inc_beta(trials, 1.0, alpha);
  }
  inv_inc_beta(successes, trials - successes + 1.0, alpha)
}

/// Upper Clopper-Pearson bound on p given `successes` out of `trials`,
/// holding with one-sided risk `alpha`
pub fn proportion_upper_bound(trials: f64, successes: f64, alpha: f64) -> f64 {
  if trials <= 0.0 {
    return 1.0;
  }
  if successes >= trials {
    return 1.0;
  }
  if successes <= 0.0 {
    return inv_inc_beta(1.0, trials, 1.0 - alpha);
  }
  inv_inc_beta(successes + 1.0, trials - successes, 1.0 - alpha)
}

#[cfg(test)]
mod tests {
  use crate::stats::*;

  fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
  }

  #[test]
  fn inc_beta_known_values() {
    // I_x(1, 1) = x
    assert!(close(inc_beta(1.0, 1.0, 0.3), 0.3, 1e-10));
    // I_0.5(2, 2) = 0.5 by symmetry
    assert!(close(inc_beta(2.0, 2.0, 0.5), 0.5, 1e-10));
    // I_x(1, n) = 1 - (1 - x)^n
    let x: f64 = 0.2;
    assert!(close(
      inc_beta(1.0, 10.0, x),
      1.0 - (1.0 - x).powi(10),
      1e-10
    ));
  }

  #[test]
  fn inv_inc_beta_inverts() {
    for &(a, b) in &[(1.0, 10.0), (3.0, 7.0), (5.5, 4.5), (10.0, 1.0)] {
      for &p in &[0.01, 0.05, 0.5, 0.95, 0.99] {
        let x = inv_inc_beta(a, b, p);
        assert!(close(inc_beta(a, b, x), p, 1e-9));
      }
    }
  }

  #[test]
  fn zero_successes_upper_bound_closed_form() {
    // no successes in n trials: upper = 1 - alpha^(1/n)
    let upper = proportion_upper_bound(10.0, 0.0, 0.05);
    assert!(close(upper, 1.0 - 0.05f64.powf(0.1), 1e-9));
    assert_eq!(proportion_lower_bound(10.0, 0.0, 0.05), 0.0);
  }

  #[test]
  fn all_successes_lower_bound_closed_form() {
    // all successes in n trials: lower = alpha^(1/n)
    let lower = proportion_lower_bound(10.0, 10.0, 0.05);
    assert!(close(lower, 0.05f64.powf(0.1), 1e-9));
    assert_eq!(proportion_upper_bound(10.0, 10.0, 0.05), 1.0);
  }

  #[test]
  fn five_of_ten_95_percent_interval() {
    // textbook Clopper-Pearson interval for 5/10 at 95% two-sided
    assert!(close(proportion_lower_bound(10.0, 5.0, 0.025), 0.187, 1e-3));
    assert!(close(proportion_upper_bound(10.0, 5.0, 0.025), 0.813, 1e-3));
  }

  #[test]
  fn bounds_bracket_the_observed_proportion() {
    for n in 1..=30u32 {
      for k in 0..=n {
        let (n, k) = (n as f64, k as f64);
        let lower = proportion_lower_bound(n, k, 0.01);
        let upper = proportion_upper_bound(n, k, 0.01);
        assert!(lower <= k / n + 1e-12, "lower {} > {}/{}", lower, k, n);
        assert!(upper >= k / n - 1e-12, "upper {} < {}/{}", upper, k, n);
        assert!(lower <= upper);
      }
    }
  }

  #[test]
  fn fractional_successes_are_accepted() {
    let lower = proportion_lower_bound(20.0, 7.5, 0.01);
    let upper = proportion_upper_bound(20.0, 7.5, 0.01);
    assert!(lower > 0.0 && lower < 0.375);
    assert!(upper < 1.0 && upper > 0.375);
  }
}
