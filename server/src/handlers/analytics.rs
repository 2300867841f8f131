use axum::extract::{Query, State};
use axum::response::Response;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::RequestContext;
use crate::services::analytics::DEFAULT_TOP_N;
use crate::services::AnalyticsQuery;
use crate::state::AppState;
use crate::store::DateWindow;
use crate::utils::error::AppError;
use crate::utils::response::success;

const MAX_TOP_N: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub top: Option<usize>,
}

impl AnalyticsParams {
    fn into_query(self) -> Result<AnalyticsQuery, AppError> {
        let top = self.top.unwrap_or(DEFAULT_TOP_N);
        if top == 0 || top > MAX_TOP_N {
            return Err(AppError::ValidationError(format!(
                "top must be between 1 and {MAX_TOP_N}"
            )));
        }
        Ok(AnalyticsQuery {
            window: DateWindow::new(self.start_date, self.end_date),
            top,
        })
    }
}

pub async fn analytics_report(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<AnalyticsParams>,
) -> Result<Response, AppError> {
    let report = state.analytics.report(&ctx, params.into_query()?).await?;
    Ok(success(report, "Analytics report generated"))
}
