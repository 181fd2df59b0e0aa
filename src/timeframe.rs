use std::sync::atomic::{AtomicUsize, Ordering};

use crate::aggregator::Period;

/// Chart timeframes, in cycling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    /// Interval identifier, as used by the data source.
    pub fn id(self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1wk",
            Timeframe::Monthly => "1mo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }

    /// Calendar period this timeframe is resampled to from daily data.
    /// `None` for the base timeframe itself.
    pub fn period(self) -> Option<Period> {
        match self {
            Timeframe::Daily => None,
            Timeframe::Weekly => Some(Period::Week),
            Timeframe::Monthly => Some(Period::Month),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }
}

/// Cyclic cursor over [`Timeframe::ALL`], shareable across threads.
///
/// Updates are a plain load followed by a store. Only the input listener
/// writes, so the render loop may at worst observe a value one step stale
/// for a single redraw.
#[derive(Debug, Default)]
pub struct TimeframeSelector {
    index: AtomicUsize,
}

impl TimeframeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Timeframe {
        Timeframe::from_index(self.index.load(Ordering::Relaxed))
    }

    pub fn advance(&self) -> Timeframe {
        let next = self.current().next();
        self.index.store(next.index(), Ordering::Relaxed);
        next
    }

    pub fn retreat(&self) -> Timeframe {
        let prev = self.current().prev();
        self.index.store(prev.index(), Ordering::Relaxed);
        prev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector_at(tf: Timeframe) -> TimeframeSelector {
        let selector = TimeframeSelector::new();
        while selector.current() != tf {
            selector.advance();
        }
        selector
    }

    #[test]
    fn starts_at_daily() {
        assert_eq!(TimeframeSelector::new().current(), Timeframe::Daily);
    }

    #[test]
    fn two_advances_reach_monthly_and_a_third_wraps() {
        let selector = TimeframeSelector::new();
        selector.advance();
        assert_eq!(selector.advance(), Timeframe::Monthly);
        assert_eq!(selector.advance(), Timeframe::Daily);
    }

    #[test]
    fn retreat_from_daily_wraps_to_monthly() {
        let selector = TimeframeSelector::new();
        assert_eq!(selector.retreat(), Timeframe::Monthly);
    }

    #[test]
    fn advance_and_retreat_are_inverse() {
        for tf in Timeframe::ALL {
            let selector = selector_at(tf);
            selector.advance();
            selector.retreat();
            assert_eq!(selector.current(), tf);

            selector.retreat();
            selector.advance();
            assert_eq!(selector.current(), tf);
        }
    }

    #[test]
    fn advancing_n_times_is_identity() {
        for tf in Timeframe::ALL {
            let selector = selector_at(tf);
            for _ in 0..Timeframe::ALL.len() {
                selector.advance();
            }
            assert_eq!(selector.current(), tf);
        }
    }

    #[test]
    fn identifiers_and_periods() {
        let ids: Vec<_> = Timeframe::ALL.iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["1d", "1wk", "1mo"]);
        assert_eq!(Timeframe::Daily.period(), None);
        assert_eq!(Timeframe::Weekly.period(), Some(Period::Week));
        assert_eq!(Timeframe::Monthly.period(), Some(Period::Month));
    }
}
