//! Set operations on ascending slices, used for measurement-record bookkeeping.

use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::SortedIterator;

/// Values in exactly one of two strictly ascending slices.
#[must_use]
pub fn symmetric_difference(v1: &[usize], v2: &[usize]) -> Vec<usize> {
    debug_assert!(is_strictly_ascending(v1) && is_strictly_ascending(v2));
    v1.iter()
        .assume_sorted_by_item()
        .symmetric_difference(v2.iter().assume_sorted_by_item())
        .copied()
        .collect()
}

/// Sorts the values and cancels repeated values in pairs, leaving the set of values that occur an odd
/// number of times.
#[must_use]
pub fn parity_set(values: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut sorted: Vec<usize> = values.into_iter().collect();
    sorted.sort_unstable();
    let mut result: Vec<usize> = Vec::with_capacity(sorted.len());
    for value in sorted {
        if result.last() == Some(&value) {
            result.pop();
        } else {
            result.push(value);
        }
    }
    result
}

fn is_strictly_ascending(values: &[usize]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

#[test]
fn symmetric_difference_test() {
    assert_eq!(
        symmetric_difference(&[1, 2, 3, 6], &[3, 4, 5, 10]),
        vec![1, 2, 4, 5, 6, 10]
    );
    assert_eq!(symmetric_difference(&[0], &[0]), Vec::<usize>::new());
}

#[test]
fn parity_set_test() {
    assert_eq!(parity_set([5, 1, 5, 3, 1, 1]), vec![1, 3]);
    assert_eq!(parity_set([2, 2]), Vec::<usize>::new());
}
