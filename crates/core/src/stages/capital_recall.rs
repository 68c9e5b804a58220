//! Capital recall: withdraw the user's own funds from deployment venues.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use waterfall_api::VenueRetrievalQuery;

use super::{bounded, non_negative};
use crate::error::SimulationError;
use crate::position::Venue;
use crate::result::{ItemFailure, StageItem, StageKind, StageResult, VenueRecall};

const KIND: StageKind = StageKind::CapitalRecall;

/// Sums what every venue would hand back. Recalling owned capital has no
/// cost, so the stage cost is always zero.
#[derive(Debug, Clone)]
pub struct CapitalRecallStage {
    query: Arc<dyn VenueRetrievalQuery>,
    timeout: Duration,
}

impl CapitalRecallStage {
    pub fn new(query: Arc<dyn VenueRetrievalQuery>, timeout: Duration) -> Self {
        Self { query, timeout }
    }

    #[instrument(skip(self, venues), fields(venues = venues.len()))]
    pub async fn run(&self, user: &str, venues: &[Venue], remaining: Decimal) -> StageResult {
        if remaining.is_zero() {
            debug!("Nothing to cover, skipping capital recall");
            return StageResult::skipped(KIND);
        }
        if venues.is_empty() {
            return StageResult::computed(KIND, remaining, Decimal::ZERO, Decimal::ZERO, Vec::new(), Vec::new());
        }

        let queries = venues.iter().map(|venue| async move {
            let result = bounded(self.timeout, self.query.retrievable(&venue.address, user)).await;
            (venue, result)
        });
        let results = join_all(queries).await;

        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(venues.len());
        let mut failures = Vec::new();

        for (venue, result) in results {
            let amount = match result {
                Ok(amount) => non_negative(amount, "retrievable amount"),
                Err(error) => {
                    warn!(venue = %venue.address, error = %error, "Venue query failed, counting it as zero");
                    failures.push(ItemFailure {
                        key: venue.address.clone(),
                        error,
                    });
                    Decimal::ZERO
                }
            };
            total += amount;
            items.push(StageItem::Venue(VenueRecall {
                venue: venue.address.clone(),
                amount,
            }));
        }

        if failures.len() == venues.len() {
            warn!("Every venue query failed");
            return StageResult::no_data(
                KIND,
                remaining,
                SimulationError::StageFailed("every venue query failed".to_string()),
                items,
                failures,
            );
        }

        debug!(total = %total, failed = failures.len(), "Capital recall computed");
        StageResult::computed(KIND, remaining, total, Decimal::ZERO, items, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::StageOutcome;
    use crate::testing::{venue, MockReply, MockVenues};
    use rust_decimal_macros::dec;

    fn stage(mock: &Arc<MockVenues>) -> CapitalRecallStage {
        CapitalRecallStage::new(mock.clone(), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_sums_all_venues() {
        let mock = Arc::new(
            MockVenues::default()
                .with("v1", MockReply::Ok(dec!(18)))
                .with("v2", MockReply::Ok(dec!(12))),
        );
        let result = stage(&mock)
            .run("user", &[venue("v1"), venue("v2")], dec!(100))
            .await;

        assert_eq!(result.fulfilled(), Some(dec!(30)));
        assert_eq!(result.cost(), Some(Decimal::ZERO));
        assert_eq!(result.remaining_after, dec!(70));
        assert_eq!(result.items.len(), 2);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_venue_counts_as_zero() {
        let mock = Arc::new(
            MockVenues::default()
                .with("v1", MockReply::Ok(dec!(18)))
                .with("v2", MockReply::Fail("rpc down".to_string()))
                .with("v3", MockReply::Hang),
        );
        let result = stage(&mock)
            .run("user", &[venue("v1"), venue("v2"), venue("v3")], dec!(100))
            .await;

        assert_eq!(result.fulfilled(), Some(dec!(18)));
        assert_eq!(result.failures.len(), 2);
        assert!(result.failures[1].error.is_timeout());
        assert_eq!(
            result.items[1],
            StageItem::Venue(VenueRecall {
                venue: "v2".to_string(),
                amount: Decimal::ZERO
            })
        );
    }

    #[tokio::test]
    async fn test_no_venues_is_computed_zero() {
        let mock = Arc::new(MockVenues::default());
        let result = stage(&mock).run("user", &[], dec!(100)).await;

        assert_eq!(result.outcome, StageOutcome::ComputedZero);
        assert!(result.items.is_empty());
        assert_eq!(result.remaining_after, dec!(100));
    }

    #[tokio::test]
    async fn test_every_venue_failing_is_no_data() {
        let mock = Arc::new(MockVenues::default().with("v1", MockReply::Fail("gone".to_string())));
        let result = stage(&mock).run("user", &[venue("v1")], dec!(100)).await;

        assert!(result.is_no_data());
        assert_eq!(result.remaining_after, dec!(100));
    }

    #[tokio::test]
    async fn test_negative_amount_clamped() {
        let mock = Arc::new(MockVenues::default().with("v1", MockReply::Ok(dec!(-5))));
        let result = stage(&mock).run("user", &[venue("v1")], dec!(100)).await;

        assert_eq!(result.outcome, StageOutcome::ComputedZero);
        assert_eq!(result.cost(), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_zero_remaining_skips_queries() {
        let mock = Arc::new(MockVenues::default().with("v1", MockReply::Ok(dec!(18))));
        let result = stage(&mock).run("user", &[venue("v1")], Decimal::ZERO).await;

        assert_eq!(result.outcome, StageOutcome::ComputedZero);
        assert_eq!(mock.calls(), 0);
    }
}
