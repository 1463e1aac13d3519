use std::cmp::Ordering;

use super::result::EligibilityResult;

/// Order results for presentation.
///
/// The comparison is pairwise: two ranked results compare by `tie_breaker_rank`
/// ascending, any other pair compares by `score` descending. That relation is not
/// transitive when only some results carry a rank, so the outcome depends on which
/// pairs get compared. The order follows a short-array TimSort pass: the leading run is
/// detected (and reversed when strictly descending), then the remaining elements are
/// binary-inserted into the sorted prefix.
pub fn rank(mut results: Vec<EligibilityResult>) -> Vec<EligibilityResult> {
    if results.len() < 2 {
        return results;
    }
    let run = leading_run(&mut results);
    binary_insert(&mut results, run);
    results
}

/// Length of the run at the front, reversing it in place when strictly descending.
fn leading_run(results: &mut [EligibilityResult]) -> usize {
    let descending = compare(&results[1], &results[0]) == Ordering::Less;
    let mut length = 2;
    while length < results.len() {
        let order = compare(&results[length], &results[length - 1]);
        let continues = if descending {
            order == Ordering::Less
        } else {
            order != Ordering::Less
        };
        if !continues {
            break;
        }
        length += 1;
    }
    if descending {
        results[..length].reverse();
    }
    length
}

fn binary_insert(results: &mut [EligibilityResult], sorted: usize) {
    for start in sorted..results.len() {
        let (mut left, mut right) = (0, start);
        while left < right {
            let mid = left + (right - left) / 2;
            if compare(&results[start], &results[mid]) == Ordering::Less {
                right = mid;
            } else {
                left = mid + 1;
            }
        }
        results[left..=start].rotate_right(1);
    }
}

pub(crate) fn compare(left: &EligibilityResult, right: &EligibilityResult) -> Ordering {
    match (left.tie_breaker_rank, right.tie_breaker_rank) {
        (Some(left_rank), Some(right_rank)) => left_rank.cmp(&right_rank),
        _ => right.score.cmp(&left.score),
    }
}
