//! Route/date task generation.
//!
//! A run window is split per route into sub-windows of at most one month so
//! that each availability request stays within the upstream's page size.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use wingo_client::models::Route;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering `months` months from `start`.
    pub fn months_from(start: NaiveDate, months: u32) -> Option<Self> {
        start
            .checked_add_months(Months::new(months))
            .map(|end| Self::new(start, end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of days in the window.
    pub fn days(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days()).unwrap_or(0)
    }

    /// Contiguous, non-overlapping sub-windows of at most `span_months`
    /// months; the last one is clipped to `end`.
    pub fn split(&self, span_months: u32) -> Vec<DateWindow> {
        let span = Months::new(span_months.max(1));
        let mut windows = Vec::new();
        let mut start = self.start;

        while start < self.end {
            let end = start
                .checked_add_months(span)
                .map_or(self.end, |end| end.min(self.end));
            windows.push(DateWindow::new(start, end));
            start = end;
        }

        windows
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Stage 1 input: one route over one sub-window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTask {
    pub route: Route,
    pub window: DateWindow,
}

/// Expand routes × window into per-month tasks, route by route.
///
/// Pure: calling it twice yields the same sequence.
pub fn window_tasks<'a>(
    routes: &'a [Route],
    window: DateWindow,
) -> impl Iterator<Item = WindowTask> + 'a {
    let sub_windows = window.split(1);
    routes.iter().flat_map(move |route| {
        sub_windows
            .clone()
            .into_iter()
            .map(move |window| WindowTask {
                route: route.clone(),
                window,
            })
    })
}
