//! ksq list pipeline: one filter → transform → sort → paginate pass over any
//! collection of objects that expose standard metadata.
//!
//! Resource-specific behavior plugs in through three function contracts:
//! [`FilterFunc`], [`CompareFunc`] and [`TransformFunc`].

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use ksq_core::{Field, Filter, ListResult, Query};
use tracing::debug;

mod meta;

pub use meta::{default_object_meta_compare, default_object_meta_filter, label_match};

/// "Left is strictly greater than right" under the given sort field.
pub type CompareFunc<T> = Arc<dyn Fn(&T, &T, &Field) -> bool + Send + Sync>;

/// Whether an object satisfies a single filter.
pub type FilterFunc<T> = Arc<dyn Fn(&T, &Filter) -> bool + Send + Sync>;

/// Applied to every selected object, in registration order, before sorting.
pub type TransformFunc<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Filter, transform, sort and paginate `objects` according to `q`.
///
/// - An object is kept only if every filter in the query accepts it; an empty
///   filter set keeps everything.
/// - Order is descending by default: `a` precedes `b` when `compare(a, b)`.
///   `q.ascending` reverses that exactly.
/// - `total_items` is the filtered count before the page window is applied.
pub fn default_list<T, C, F>(
    objects: Vec<T>,
    q: &Query,
    compare: C,
    filter: F,
    transforms: &[TransformFunc<T>],
) -> ListResult<T>
where
    C: Fn(&T, &T, &Field) -> bool,
    F: Fn(&T, &Filter) -> bool,
{
    let started = Instant::now();
    let input = objects.len();
    let filters = q.to_filters();

    let mut filtered: Vec<T> = objects
        .into_iter()
        .filter(|o| filters.iter().all(|f| filter(o, f)))
        .map(|o| transforms.iter().fold(o, |acc, t| t(acc)))
        .collect();

    let sort_by = &q.sort_by;
    filtered.sort_by(|a, b| {
        let ord = directed_order(a, b, sort_by, &compare);
        if q.ascending { ord.reverse() } else { ord }
    });

    let total = filtered.len();
    let (start, end) = q.pagination().valid_range(total);
    let items: Vec<T> = filtered.drain(start..end).collect();

    debug!(input, total, page = items.len(), sort_by = %sort_by, ascending = q.ascending, "list pipeline");
    metrics::histogram!("list_filtered_items", total as f64);
    metrics::histogram!("list_eval_ms", started.elapsed().as_secs_f64() * 1_000.0);

    ListResult { total_items: total, items }
}

/// Turn the "greater than" predicate into a total order for a descending sort.
/// Elements neither side calls greater compare equal and keep their input order.
fn directed_order<T, C>(a: &T, b: &T, sort_by: &Field, compare: &C) -> Ordering
where
    C: Fn(&T, &T, &Field) -> bool,
{
    if compare(a, b, sort_by) {
        Ordering::Less
    } else if compare(b, a, sort_by) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
