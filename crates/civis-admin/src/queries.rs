//! Cache subscriptions for every admin read.

use crate::api::AdminApi;
use crate::keys;
use crate::models::{
    AdminUser, DashboardFilter, DashboardOverview, DashboardSummary, MapPoint, Observation, ObservationFilter, Page,
    Report, ReportFilter, Secretaria, TopReport, UserFilter,
};
use crate::AdminConsole;
use civis_core::{QueryKey, QueryOptions, Result, Subscription};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;

/// Dashboard aggregates count as fresh for a minute.
const DASHBOARD_STALE_TIME: Duration = Duration::from_secs(60);

fn dashboard_options() -> QueryOptions {
    QueryOptions::default().stale_time(DASHBOARD_STALE_TIME)
}

fn report_fetch(
    city_id: String,
    filter: ReportFilter,
) -> impl Fn(AdminApi) -> BoxFuture<'static, Result<Page<Report>>> + Send + Sync + 'static {
    move |api| {
        let city_id = city_id.clone();
        let filter = filter.clone();
        async move { api.list_reports(&city_id, &filter).await }.boxed()
    }
}

impl AdminConsole {
    fn watch<T, F, Fut>(&self, key: QueryKey, options: QueryOptions, fetch: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(AdminApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let api = self.api.clone();
        self.cache.subscribe(key, move || fetch(api.clone()), options)
    }

    pub fn users(&self, filter: UserFilter) -> Subscription<Vec<AdminUser>> {
        self.watch(keys::users(&filter), QueryOptions::default(), move |api| {
            let filter = filter.clone();
            async move { api.list_users(&filter).await }
        })
    }

    pub fn user(&self, id: &str) -> Subscription<AdminUser> {
        let id = id.to_string();
        self.watch(keys::user(&id), QueryOptions::default(), move |api| {
            let id = id.clone();
            async move { api.get_user(&id).await }
        })
    }

    pub fn secretarias(&self, city_id: &str) -> Subscription<Vec<Secretaria>> {
        let city_id = city_id.to_string();
        self.watch(keys::secretarias(&city_id), QueryOptions::default(), move |api| {
            let city_id = city_id.clone();
            async move { api.list_secretarias(&city_id).await }
        })
    }

    pub fn dashboard_overview(&self, filter: DashboardFilter) -> Subscription<DashboardOverview> {
        self.watch(keys::dashboard("overview", &filter), dashboard_options(), move |api| {
            let filter = filter.clone();
            async move { api.dashboard_overview(&filter).await }
        })
    }

    pub fn dashboard_summary(&self, filter: DashboardFilter) -> Subscription<DashboardSummary> {
        self.watch(keys::dashboard("summary", &filter), dashboard_options(), move |api| {
            let filter = filter.clone();
            async move { api.dashboard_summary(&filter).await }
        })
    }

    pub fn dashboard_map(&self, filter: DashboardFilter) -> Subscription<Vec<MapPoint>> {
        self.watch(keys::dashboard("map", &filter), dashboard_options(), move |api| {
            let filter = filter.clone();
            async move { api.dashboard_map(&filter).await }
        })
    }

    pub fn top_reports(&self, filter: DashboardFilter) -> Subscription<Vec<TopReport>> {
        self.watch(keys::dashboard("top-reports", &filter), dashboard_options(), move |api| {
            let filter = filter.clone();
            async move { api.top_reports(&filter).await }
        })
    }

    /// A city's reports, one page at a time. Move between pages with
    /// [`show_reports`](Self::show_reports) to keep the current page visible
    /// while the next one loads.
    pub fn reports(&self, city_id: &str, filter: ReportFilter) -> Subscription<Page<Report>> {
        let key = keys::reports(city_id, &filter);
        self.watch(key, QueryOptions::paginated(), report_fetch(city_id.to_string(), filter))
    }

    /// Point an existing report subscription at another page or filter.
    pub fn show_reports(&self, subscription: &mut Subscription<Page<Report>>, city_id: &str, filter: ReportFilter) {
        let key = keys::reports(city_id, &filter);
        let api = self.api.clone();
        let fetch = report_fetch(city_id.to_string(), filter);
        subscription.set_key(key, move || fetch(api.clone()));
    }

    pub fn observations(&self, filter: ObservationFilter) -> Subscription<Vec<Observation>> {
        self.watch(keys::observations(&filter), QueryOptions::default(), move |api| {
            let filter = filter.clone();
            async move { api.list_observations(&filter).await }
        })
    }
}
