use crate::{config::AppConfig, preview::PreviewContext, time::TimeRange};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Preview context bounded by the configured limit ceiling.
    pub fn preview_context(
        &self,
        time_range: Option<TimeRange>,
        interval_ms: Option<u64>,
    ) -> PreviewContext {
        let ctx = PreviewContext::new(time_range).with_max_limit(self.config.max_limit);
        match interval_ms {
            Some(millis) => ctx.with_interval(Duration::from_millis(millis)),
            None => ctx,
        }
    }
}
