use vigil_core::query::{PointQuery, matches_custom_attribute, matches_string_filter};
use vigil_transaction::{TraceCollector, Transaction};

/// Does a live or pending transaction satisfy the query's filter criteria?
///
/// A conjunction of independent checks, cheapest first, short-circuiting on
/// the first failure. Slow-only and error-only are the collector's decisions,
/// not reimplemented here.
pub(crate) fn matches_transaction(
    query: &PointQuery,
    transaction: &Transaction,
    collector: &TraceCollector,
) -> bool {
    query.matches_duration(transaction.duration().as_nanos() as u64)
        && query.matches_transaction_type(transaction.transaction_type())
        && (!query.slow_only || collector.should_store_slow(transaction))
        && (!query.error_only || collector.should_store_error(transaction))
        && matches_string_filter(
            query.headline_comparator,
            query.headline.as_deref(),
            Some(transaction.headline().as_str()),
        )
        && matches_string_filter(
            query.transaction_name_comparator,
            query.transaction_name.as_deref(),
            Some(transaction.transaction_name().as_str()),
        )
        && matches_string_filter(
            query.error_comparator,
            query.error.as_deref(),
            transaction.error_message().as_deref(),
        )
        && matches_string_filter(
            query.user_comparator,
            query.user.as_deref(),
            transaction.user().as_deref(),
        )
        && matches_custom_attribute(
            query.custom_attribute_name.as_deref(),
            query.custom_attribute_value_comparator,
            query.custom_attribute_value.as_deref(),
            &transaction.custom_attributes(),
        )
}
