//! Top-N selection driven by an asynchronous comparator.

use std::cmp::Ordering;
use std::future::Future;

use crate::Result;

/// The `n` smallest items of `items` in ascending order.
///
/// Comparisons run one at a time, so a comparator may depend on the
/// outcome of earlier ones (a human or a model judging pairs). Each item
/// is binary-inserted into a sorted buffer of at most `n` entries; equal
/// items keep their input order. `n <= 0` yields an empty result and
/// `items` is never modified.
///
/// # Errors
///
/// Returns the first comparator error.
pub async fn nsmallest_async<T, F, Fut>(n: i64, items: &[T], mut cmp: F) -> Result<Vec<T>>
where
    T: Clone,
    F: FnMut(T, T) -> Fut,
    Fut: Future<Output = Result<Ordering>>,
{
    if n <= 0 {
        return Ok(Vec::new());
    }
    let n = usize::try_from(n).unwrap_or(usize::MAX);

    let mut buffer: Vec<T> = Vec::with_capacity(n.min(items.len()) + 1);
    for item in items {
        // Upper bound: first position whose element orders strictly after `item`.
        let mut lo = 0;
        let mut hi = buffer.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp(item.clone(), buffer[mid].clone()).await? == Ordering::Less {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        buffer.insert(lo, item.clone());
        if buffer.len() > n {
            buffer.pop();
        }
    }
    Ok(buffer)
}

/// Upper bound on comparator calls made by [`nsmallest_async`] for
/// `len` items, suitable for sizing a progress indicator.
#[must_use]
pub fn estimated_comparisons(len: usize, n: i64) -> usize {
    let Ok(n) = usize::try_from(n) else {
        return 0;
    };
    (0..len)
        .map(|seen| {
            let size = seen.min(n);
            (usize::BITS - size.leading_zeros()) as usize
        })
        .sum()
}
