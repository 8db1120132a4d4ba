//! Unit tests for comparator-driven top-N selection.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use recipe_harness::concurrency::nsmallest_async;
use recipe_harness::{AppError, Result};

async fn cmp(a: i32, b: i32) -> Result<Ordering> {
    Ok(a.cmp(&b))
}

#[tokio::test]
async fn returns_the_n_smallest_in_order() {
    let xs = vec![7, 8, 4, 3, 1, 6, 2, 0, 9, 5];
    let smallest = nsmallest_async(3, &xs, cmp).await.expect("select");
    assert_eq!(smallest, vec![0, 1, 2]);
    assert_eq!(xs, vec![7, 8, 4, 3, 1, 6, 2, 0, 9, 5], "input is untouched");
}

#[tokio::test]
async fn boundary_sizes() {
    assert!(nsmallest_async(1, &[], cmp).await.expect("empty").is_empty());
    assert!(nsmallest_async(0, &[1], cmp).await.expect("zero").is_empty());
    assert!(nsmallest_async(-1, &[2, 1, 3], cmp)
        .await
        .expect("negative")
        .is_empty());
    assert_eq!(nsmallest_async(1, &[2, 1, 3], cmp).await.expect("one"), vec![1]);
    assert_eq!(
        nsmallest_async(4, &[2, 1, 3], cmp).await.expect("more than len"),
        vec![1, 2, 3]
    );
    assert_eq!(nsmallest_async(1, &[1], cmp).await.expect("single"), vec![1]);
    let range: Vec<i32> = (0..10).collect();
    assert_eq!(
        nsmallest_async(3, &range, cmp).await.expect("sorted"),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn ties_keep_first_seen_order() {
    let items = vec![(1, "a"), (0, "b"), (1, "c"), (0, "d")];
    let smallest = nsmallest_async(3, &items, |x: (i32, &str), y: (i32, &str)| async move {
        Ok(x.0.cmp(&y.0))
    })
    .await
    .expect("select");
    assert_eq!(smallest, vec![(0, "b"), (0, "d"), (1, "a")]);
}

#[tokio::test]
async fn comparator_errors_propagate() {
    let calls = AtomicUsize::new(0);
    let err = nsmallest_async(2, &[3, 2, 1], |_, _| {
        calls.fetch_add(1, AtomicOrdering::Relaxed);
        async { Err::<Ordering, _>(AppError::Recipe("comparator broke".into())) }
    })
    .await
    .expect_err("comparator failure");
    assert!(matches!(err, AppError::Recipe(_)));
    assert_eq!(calls.load(AtomicOrdering::Relaxed), 1);
}
