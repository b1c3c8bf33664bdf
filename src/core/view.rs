//! Month listing.
//!
//! The caller keeps a [`ViewState`] and hands it back on every call; nothing about the
//! current view lives in the engine.

use crate::{
    core::{bill::load_bills_for_month, month::YearMonth},
    entities::{BillStatus, bill},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

/// Which month and which bills the caller is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Month shown
    pub month: YearMonth,
    /// Only bills in this status
    pub status: Option<BillStatus>,
    /// Only bills of this category
    pub category_id: Option<String>,
    /// Only bills of this person
    pub person_id: Option<String>,
    /// Only bills carrying this tag
    pub tag: Option<String>,
}

impl ViewState {
    /// Unfiltered view of a month.
    #[must_use]
    pub const fn for_month(month: YearMonth) -> Self {
        Self {
            month,
            status: None,
            category_id: None,
            person_id: None,
            tag: None,
        }
    }

    /// Same filters, one month later.
    #[must_use]
    pub fn next_month(&self) -> Self {
        Self {
            month: self.month.add_months(1),
            ..self.clone()
        }
    }

    /// Same filters, one month earlier.
    #[must_use]
    pub fn previous_month(&self) -> Self {
        Self {
            month: self.month.add_months(-1),
            ..self.clone()
        }
    }

    /// True when `bill` passes every filter.
    #[must_use]
    pub fn matches(&self, bill: &bill::Model) -> bool {
        self.status.is_none_or(|s| bill.current_status() == s)
            && self
                .category_id
                .as_deref()
                .is_none_or(|c| bill.category_id.as_deref() == Some(c))
            && self
                .person_id
                .as_deref()
                .is_none_or(|p| bill.person_id.as_deref() == Some(p))
            && self.tag.as_deref().is_none_or(|t| bill.tags.contains(t))
    }
}

/// Totals over the listed bills. Skipped bills are counted but owe nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTotals {
    /// Sum of amounts of bills not skipped
    pub total: i64,
    /// Sum of paid amounts of bills not skipped
    pub paid: i64,
    /// Sum of remaining balances of bills not skipped
    pub remaining: i64,
    /// Bills open
    pub open: usize,
    /// Bills partially paid
    pub partial: usize,
    /// Bills paid
    pub paid_count: usize,
    /// Bills skipped
    pub skipped: usize,
}

/// Bills of one month after filtering and sorting.
#[derive(Debug, Clone)]
pub struct BillListing {
    /// Bills in display order
    pub bills: Vec<bill::Model>,
    /// Totals over `bills`
    pub totals: MonthTotals,
}

/// Pinned first, then manual order, then due date.
pub fn sort_bills(bills: &mut [bill::Model]) {
    bills.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then(a.sort_order.cmp(&b.sort_order))
            .then(a.due_date.cmp(&b.due_date))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Totals and status counts over a list of bills.
#[must_use]
pub fn month_totals(bills: &[bill::Model]) -> MonthTotals {
    let mut totals = MonthTotals::default();
    for bill in bills {
        match bill.current_status() {
            BillStatus::Open => totals.open += 1,
            BillStatus::Partial => totals.partial += 1,
            BillStatus::Paid => totals.paid_count += 1,
            BillStatus::Skipped => {
                totals.skipped += 1;
                continue;
            }
        }
        totals.total += bill.amount;
        totals.paid += bill.paid_so_far();
        totals.remaining += bill.remaining();
    }
    totals
}

/// Lists the bills of the view's month, repaired, filtered and sorted.
///
/// # Arguments
/// * `db` - Database connection
/// * `state` - Month and filters to apply
///
/// # Returns
/// * The state, unchanged, so the caller can keep threading it
/// * The listing with its totals
pub async fn list_month(db: &DatabaseConnection, state: ViewState) -> Result<(ViewState, BillListing)> {
    let mut bills: Vec<bill::Model> = load_bills_for_month(db, state.month)
        .await?
        .into_iter()
        .filter(|b| state.matches(b))
        .collect();
    sort_bills(&mut bills);
    let totals = month_totals(&bills);

    debug!("Listing {} bills for {}", bills.len(), state.month);
    Ok((state, BillListing { bills, totals }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Tags;
    use crate::test_utils::*;

    #[test]
    fn test_navigation_keeps_filters() {
        let state = ViewState {
            tag: Some("home".to_string()),
            ..ViewState::for_month(month("2024-12"))
        };
        let next = state.next_month();
        assert_eq!(next.month, month("2025-01"));
        assert_eq!(next.tag.as_deref(), Some("home"));
        assert_eq!(next.previous_month(), state);
    }

    #[test]
    fn test_sort_pinned_then_order_then_due_date() {
        let mut early = bill_fixture("Early", "2024-03", 100);
        early.due_date = date(2024, 3, 1);
        let mut late = bill_fixture("Late", "2024-03", 100);
        late.due_date = date(2024, 3, 25);
        let mut pinned = bill_fixture("Pinned", "2024-03", 100);
        pinned.pinned = true;
        pinned.due_date = date(2024, 3, 28);
        let mut ordered = bill_fixture("Ordered", "2024-03", 100);
        ordered.sort_order = -1;
        ordered.due_date = date(2024, 3, 30);

        let mut bills = vec![late, early, ordered, pinned];
        sort_bills(&mut bills);
        let names: Vec<&str> = bills.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Pinned", "Ordered", "Early", "Late"]);
    }

    #[test]
    fn test_totals_ignore_skipped_balances() {
        let open = bill_fixture("Rent", "2024-03", 100_000);
        let mut partial = bill_fixture("Power", "2024-03", 20_000);
        partial.status = Some(BillStatus::Partial);
        partial.paid_amount = Some(5_000);
        let mut skipped = bill_fixture("Gym", "2024-03", 9_000);
        skipped.status = Some(BillStatus::Skipped);

        let totals = month_totals(&[open, partial, skipped]);
        assert_eq!(totals.total, 120_000);
        assert_eq!(totals.paid, 5_000);
        assert_eq!(totals.remaining, 115_000);
        assert_eq!((totals.open, totals.partial, totals.paid_count, totals.skipped), (1, 1, 0, 1));
    }

    #[tokio::test]
    async fn test_list_month_filters_and_repairs() -> Result<()> {
        let db = setup_test_db().await?;
        let mut tagged = bill_fixture("Internet", "2024-03", 10_000);
        tagged.tags = ["home"].into_iter().collect::<Tags>();
        insert_bill(&db, tagged).await?;
        // Stale status: fully paid but still marked open.
        let mut stale = bill_fixture("Water", "2024-03", 5_000);
        stale.paid_amount = Some(5_000);
        insert_bill(&db, stale).await?;
        create_test_bill(&db, "Next month", "2024-04", 1_000).await?;

        let (state, listing) = list_month(&db, ViewState::for_month(month("2024-03"))).await?;
        assert_eq!(state.month, month("2024-03"));
        assert_eq!(listing.bills.len(), 2);
        assert_eq!(listing.totals.paid_count, 1);
        assert_eq!(listing.totals.remaining, 10_000);

        let filtered = ViewState {
            tag: Some("home".to_string()),
            ..state
        };
        let (_, listing) = list_month(&db, filtered).await?;
        assert_eq!(listing.bills.len(), 1);
        assert_eq!(listing.bills[0].name, "Internet");

        let paid_only = ViewState {
            status: Some(BillStatus::Paid),
            ..ViewState::for_month(month("2024-03"))
        };
        let (_, listing) = list_month(&db, paid_only).await?;
        assert_eq!(listing.bills.len(), 1);
        assert_eq!(listing.bills[0].name, "Water");
        Ok(())
    }
}
