//! Combinatorial and numeric helpers shared by the analysis modules.

pub mod stats;

pub use stats::{normal_quantile, z_value};

/// Every combination taking one element from each list, the last list
/// varying fastest.
///
/// An empty outer slice yields a single empty combination; any empty inner
/// list yields nothing.
///
/// # Examples
///
/// ```
/// use gtheory::utils::cartesian_product;
///
/// let combos = cartesian_product(&[vec![1, 2], vec![10, 20, 30]]);
/// assert_eq!(combos.len(), 6);
/// assert_eq!(combos[0], vec![1, 10]);
/// assert_eq!(combos[5], vec![2, 30]);
/// ```
#[must_use]
pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.iter()
            .flat_map(|prefix| {
                list.iter().map(move |item| {
                    let mut next = prefix.clone();
                    next.push(item.clone());
                    next
                })
            })
            .collect()
    })
}

/// Harmonic mean of positive values.
///
/// Returns `None` for an empty input or any non-positive value.
///
/// # Examples
///
/// ```
/// use gtheory::utils::harmonic_mean;
///
/// assert_eq!(harmonic_mean([2.0, 2.0]), Some(2.0));
/// assert!((harmonic_mean([1.0, 2.0, 4.0]).unwrap() - 12.0 / 7.0).abs() < 1e-12);
/// assert_eq!(harmonic_mean(std::iter::empty()), None);
/// ```
#[must_use]
pub fn harmonic_mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut n = 0usize;
    let mut reciprocal_sum = 0.0;
    for v in values {
        if v <= 0.0 {
            return None;
        }
        n += 1;
        reciprocal_sum += 1.0 / v;
    }
    (n > 0).then(|| n as f64 / reciprocal_sum)
}
