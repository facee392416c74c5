//! Current holiday set, regenerated every local midnight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use ldr_core::error::CoreError;
use ldr_core::holidays::{HolidayCalendar, HolidaySet};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Used when the next midnight cannot be resolved (DST gaps).
const FALLBACK_SLEEP: Duration = Duration::from_secs(3600);

pub struct HolidayCache {
    calendar: HolidayCalendar,
    current: RwLock<Arc<HolidaySet>>,
}

impl HolidayCache {
    /// Starts empty; call [`refresh`](Self::refresh) before first use.
    pub fn new(calendar: HolidayCalendar) -> Self {
        Self {
            calendar,
            current: RwLock::new(Arc::new(HolidaySet::empty())),
        }
    }

    /// The set forecasts should use right now. Cheap to call.
    pub async fn current(&self) -> Arc<HolidaySet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Regenerate for `[today.year, today.year + 1]` and swap it in.
    pub async fn refresh(&self, today: NaiveDate) -> Result<Arc<HolidaySet>, CoreError> {
        let set = Arc::new(self.calendar.generate(today.year(), today.year() + 1)?);
        *self.current.write().await = Arc::clone(&set);
        tracing::info!(
            start_year = set.start_year(),
            end_year = set.end_year(),
            dates = set.len(),
            "Holiday set regenerated"
        );
        Ok(set)
    }

    /// Refresh at every local midnight until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let wait = until_next_midnight(Local::now()).unwrap_or(FALLBACK_SLEEP);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Holiday refresher stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.refresh(Local::now().date_naive()).await {
                        tracing::error!(error = %e, "Failed to regenerate holiday set");
                    }
                }
            }
        }
    }
}

/// Time from `now` to the next midnight in `now`'s time zone.
pub fn until_next_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> Option<Duration> {
    let tomorrow = now.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?;
    let midnight = now.timezone().from_local_datetime(&tomorrow).earliest()?;
    (midnight - now).to_std().ok()
}
