//! The dashboard engine.
//!
//! [`Dashboard`] owns the whole session state and is driven by plain
//! method calls: user events in, backend results in, drawing calls out to
//! a [`RenderSink`]. It performs no I/O itself. Operations that change the
//! data-source query return the [`AggregateRequest`]s the caller must run
//! and feed back through [`Dashboard::deliver`] or [`Dashboard::reject`].

use geo_dashboard_choropleth::ChoroplethFrame;
use geo_dashboard_choropleth::chart::BarChart;
use geo_dashboard_choropleth::regions::RegionShapes;
use geo_dashboard_models::config::DashboardConfig;
use geo_dashboard_models::{
    ALL_CATEGORIES, AggregateRequest, Caption, CategoryCount, CircleSelection, GeometryEdit,
    Selection, ViewId,
};
use geo_dashboard_query::{Filter, QueryBuilder};

use crate::controller::{GateState, SelectionController};
use crate::sink::RenderSink;
use crate::source::DataSource;
use crate::views::{Acceptance, AggregateViews, Delivery};
use crate::{DashboardError, DashboardSnapshot, DashboardStatus};

/// One dashboard session.
pub struct Dashboard<S: RenderSink> {
    config: DashboardConfig,
    builder: QueryBuilder,
    source: DataSource,
    views: AggregateViews,
    controller: SelectionController,
    selection: Selection,
    filter: Filter,
    shapes: RegionShapes,
    chart: Option<BarChart>,
    map: Option<ChoroplethFrame>,
    drawn_category: Option<String>,
    status: DashboardStatus,
    sink: S,
}

impl<S: RenderSink> Dashboard<S> {
    /// Creates a session in the `Loading` state.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Config`] if the definition is invalid.
    pub fn new(config: DashboardConfig, sink: S) -> Result<Self, DashboardError> {
        config.validate()?;
        let initial = config.initial_circle();

        Ok(Self {
            builder: QueryBuilder::new(&config.dataset),
            source: DataSource::default(),
            views: AggregateViews::default(),
            controller: SelectionController::new(initial),
            selection: Selection::default(),
            filter: Filter::within(initial),
            shapes: RegionShapes::default(),
            chart: None,
            map: None,
            drawn_category: None,
            status: DashboardStatus::Loading,
            config,
            sink,
        })
    }

    /// Finishes startup once the region shapes are loaded: subscribes both
    /// views and issues the initial query.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Query`] if the initial query cannot be
    /// built.
    pub fn start(&mut self, shapes: RegionShapes) -> Result<Vec<AggregateRequest>, DashboardError> {
        if self.status != DashboardStatus::Loading {
            log::warn!("Ignoring start in {} state", self.status);
            return Ok(Vec::new());
        }

        log::info!(
            "Starting dashboard '{}' with {} regions",
            self.config.id,
            shapes.len()
        );
        self.shapes = shapes;
        self.views
            .subscribe(ViewId::Categories, self.config.category_spec(), Delivery::Once);
        self.views
            .subscribe(ViewId::Regions, self.config.region_spec(), Delivery::Every);

        let requests = self.apply(self.filter.clone())?;
        self.status = DashboardStatus::Ready;
        self.sink
            .draw_caption(&Caption::from(&self.controller.circle()));
        Ok(requests)
    }

    /// Marks the session as failed and shows the placeholder. Every later
    /// event is ignored.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("Dashboard '{}' failed: {message}", self.config.id);
        self.sink.show_placeholder(&message);
        self.status = DashboardStatus::Failed { message };
    }

    /// Handles an edit-move or edit-resize event by refreshing the caption.
    pub fn edit(&mut self, edit: &GeometryEdit) {
        if !self.is_ready() {
            return;
        }
        let caption = self.controller.on_edit(edit);
        self.sink.draw_caption(&caption);
    }

    /// Handles a commit gesture carrying the circle as released.
    ///
    /// Returns no requests when nothing was edited since the last accepted
    /// commit or the query is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Query`] if the circle is invalid. The
    /// current query is kept and the edit stays pending.
    pub fn commit(
        &mut self,
        circle: CircleSelection,
    ) -> Result<Vec<AggregateRequest>, DashboardError> {
        if !self.is_ready() {
            return Ok(Vec::new());
        }
        let Some(circle) = self.controller.on_commit(circle) else {
            return Ok(Vec::new());
        };

        let filter = Filter {
            circle: Some(circle),
            category: self.filter.category.clone(),
        };
        let result = self.apply(filter);
        self.controller.settle(result.is_ok());
        if let Err(e) = &result {
            log::warn!("Rejected commit: {e}");
        }
        result
    }

    /// Handles a click on a category bar. [`ALL_CATEGORIES`] clears the
    /// category filter. The circle filter is kept either way. Clicks
    /// before the chart is built are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Query`] if the key cannot be used in a
    /// filter. The selection is left unchanged.
    pub fn select_category(&mut self, key: &str) -> Result<Vec<AggregateRequest>, DashboardError> {
        if !self.is_ready() {
            return Ok(Vec::new());
        }
        if self.chart.is_none() {
            log::debug!("Ignoring category {key:?} before the chart is built");
            return Ok(Vec::new());
        }
        if key == self.selection.active_category {
            log::debug!("Category {key:?} already active");
            return Ok(Vec::new());
        }

        let filter = Filter {
            circle: self.filter.circle,
            category: (key != ALL_CATEGORIES).then(|| key.to_string()),
        };
        let requests = self.apply(filter)?;

        key.clone_into(&mut self.selection.active_category);
        if let Some(chart) = &mut self.chart {
            chart.restate(key);
        }
        self.sink.restate_chart(key);
        Ok(requests)
    }

    /// Feeds back a successful aggregate fetch.
    pub fn deliver(&mut self, view: ViewId, generation: u64, result: Vec<CategoryCount>) {
        if !self.is_ready() {
            return;
        }
        match self
            .views
            .accept(view, generation, self.source.generation(), result)
        {
            Acceptance::Fire(counts) => match view {
                ViewId::Categories => self.build_chart(&counts),
                ViewId::Regions => {
                    self.selection.counts = counts;
                    self.redraw_map();
                }
            },
            Acceptance::Unchanged
                if view == ViewId::Regions
                    && self.drawn_category.as_deref()
                        != Some(self.selection.active_category.as_str()) =>
            {
                self.redraw_map();
            }
            Acceptance::Unchanged => {
                log::debug!("{view} result unchanged at generation {generation}");
            }
            Acceptance::Stale => {
                log::debug!(
                    "Ignoring stale {view} result for generation {generation} (current {})",
                    self.source.generation()
                );
            }
            Acceptance::Closed => {
                log::debug!("Ignoring {view} result for a closed view");
            }
        }
    }

    /// Feeds back a failed aggregate fetch. The last-good selection stays.
    pub fn reject(&self, view: ViewId, generation: u64, error: &dyn std::error::Error) {
        log::warn!(
            "{view} aggregate for generation {generation} failed (current {}): {error}",
            self.source.generation()
        );
    }

    fn build_chart(&mut self, counts: &[CategoryCount]) {
        let mut chart = BarChart::build(counts);
        chart.restate(&self.selection.active_category);
        self.sink.draw_chart(&chart);
        self.chart = Some(chart);
    }

    fn redraw_map(&mut self) {
        let frame = ChoroplethFrame::draw(&self.shapes, &self.selection, &self.config.map);
        self.sink.draw_map(&frame);
        self.drawn_category = Some(self.selection.active_category.clone());
        self.map = Some(frame);
    }

    /// Builds the query for `filter` and pushes it to the data source.
    fn apply(&mut self, filter: Filter) -> Result<Vec<AggregateRequest>, DashboardError> {
        let query = self.builder.build(&filter)?;
        self.filter = filter;

        let Some(update) = self.source.set_query(query) else {
            return Ok(Vec::new());
        };
        self.sink.draw_points(&update.query);
        Ok(self.views.requests(&update))
    }

    fn is_ready(&self) -> bool {
        if self.status == DashboardStatus::Ready {
            return true;
        }
        log::debug!("Ignoring event in {} state", self.status);
        false
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> &DashboardStatus {
        &self.status
    }

    /// Current selection.
    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Controller gate state.
    #[must_use]
    pub const fn gate_state(&self) -> GateState {
        self.controller.state()
    }

    /// Current point-overlay query.
    #[must_use]
    pub fn query(&self) -> &str {
        self.source.query()
    }

    /// Current data-source generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.source.generation()
    }

    /// Loaded region shapes; empty until started.
    #[must_use]
    pub const fn shapes(&self) -> &RegionShapes {
        &self.shapes
    }

    /// The render sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Serializable view of the session.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            id: self.config.id.clone(),
            title: self.config.title.clone(),
            status: self.status.clone(),
            caption: Caption::from(&self.controller.circle()),
            gate: self.controller.state().to_string(),
            selection: self.selection.clone(),
            query: self.source.query().to_string(),
            generation: self.source.generation(),
            chart: self.chart.clone(),
            map: self.map.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_dashboard_choropleth::regions::RegionFill;
    use geo_dashboard_models::{EditKind, LatLng};

    #[derive(Debug, Clone, PartialEq)]
    enum Drawn {
        Placeholder(String),
        Caption(String),
        Chart(usize),
        Restate(String),
        Map(String),
        Points(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        drawn: Vec<Drawn>,
    }

    impl RecordingSink {
        fn count(&self, f: impl Fn(&Drawn) -> bool) -> usize {
            self.drawn.iter().filter(|d| f(d)).count()
        }

        fn points(&self) -> Vec<&str> {
            self.drawn
                .iter()
                .filter_map(|d| match d {
                    Drawn::Points(q) => Some(q.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderSink for RecordingSink {
        fn show_placeholder(&mut self, message: &str) {
            self.drawn.push(Drawn::Placeholder(message.to_string()));
        }

        fn draw_caption(&mut self, caption: &Caption) {
            self.drawn.push(Drawn::Caption(caption.to_string()));
        }

        fn draw_chart(&mut self, chart: &BarChart) {
            self.drawn.push(Drawn::Chart(chart.bars.len()));
        }

        fn restate_chart(&mut self, active_category: &str) {
            self.drawn.push(Drawn::Restate(active_category.to_string()));
        }

        fn draw_map(&mut self, frame: &ChoroplethFrame) {
            self.drawn.push(Drawn::Map(frame.legend.caption.clone()));
        }

        fn draw_points(&mut self, query: &str) {
            self.drawn.push(Drawn::Points(query.to_string()));
        }
    }

    fn shapes() -> RegionShapes {
        let doc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "postalCode": "10001" }, "geometry": null },
                { "type": "Feature", "properties": { "postalCode": "10002" }, "geometry": null },
                { "type": "Feature", "properties": { "postalCode": "10003" }, "geometry": null }
            ]
        });
        RegionShapes::parse(&doc.to_string(), "postalCode", None).unwrap()
    }

    fn started() -> (Dashboard<RecordingSink>, Vec<AggregateRequest>) {
        let mut dashboard =
            Dashboard::new(DashboardConfig::embedded_default(), RecordingSink::default()).unwrap();
        let requests = dashboard.start(shapes()).unwrap();
        (dashboard, requests)
    }

    fn charted() -> Dashboard<RecordingSink> {
        let (mut dashboard, _) = started();
        dashboard.deliver(
            ViewId::Categories,
            1,
            vec![
                CategoryCount::new("Pizza", 10),
                CategoryCount::new("Tacos", 4),
            ],
        );
        dashboard
    }

    fn circle(lat: f64, lng: f64, radius_m: f64) -> CircleSelection {
        CircleSelection::new(LatLng::new(lat, lng), radius_m)
    }

    fn edit(circle: CircleSelection) -> GeometryEdit {
        GeometryEdit {
            kind: EditKind::Move,
            circle,
        }
    }

    #[test]
    fn start_issues_initial_query_for_both_views() {
        let (dashboard, requests) = started();
        assert_eq!(dashboard.status(), &DashboardStatus::Ready);
        assert_eq!(dashboard.generation(), 1);
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.generation == 1));
        assert!(dashboard.query().contains("ST_MakePoint(-73.9866, 40.7306)"));
        assert_eq!(
            dashboard.sink().count(|d| matches!(d, Drawn::Caption(_))),
            1
        );
    }

    #[test]
    fn edits_then_one_commit_issue_one_query_at_commit_geometry() {
        let (mut dashboard, _) = started();
        for i in 0..5 {
            dashboard.edit(&edit(circle(f64::from(i).mul_add(0.001, 40.70), -73.98, 900.0)));
        }
        assert_eq!(dashboard.gate_state(), GateState::PendingUpdate);
        assert_eq!(dashboard.generation(), 1);

        let requests = dashboard.commit(circle(40.75, -73.95, 1_234.5)).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(dashboard.generation(), 2);
        assert_eq!(dashboard.gate_state(), GateState::Idle);

        let points = dashboard.sink().points();
        assert_eq!(points.len(), 2);
        assert!(points[1].contains("ST_MakePoint(-73.9500, 40.7500)"));
        assert!(points[1].contains("1234.50)"));
        assert_eq!(
            dashboard.sink().count(|d| matches!(d, Drawn::Caption(_))),
            6
        );
    }

    #[test]
    fn commit_without_edit_is_a_no_op() {
        let (mut dashboard, _) = started();
        assert!(dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap().is_empty());
        assert_eq!(dashboard.generation(), 1);

        dashboard.edit(&edit(circle(40.75, -73.95, 500.0)));
        dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap();
        assert!(dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap().is_empty());
        assert_eq!(dashboard.generation(), 2);
        assert_eq!(dashboard.sink().points().len(), 2);
    }

    #[test]
    fn invalid_commit_keeps_query_and_stays_pending() {
        let (mut dashboard, _) = started();
        let before = dashboard.query().to_string();
        dashboard.edit(&edit(circle(40.75, -73.95, 500.0)));
        let caption = dashboard.snapshot().caption;

        let result = dashboard.commit(circle(40.75, -73.95, f64::NAN));
        assert!(matches!(result, Err(DashboardError::Query(_))));
        let result = dashboard.commit(circle(40.75, -73.95, -1.0));
        assert!(matches!(result, Err(DashboardError::Query(_))));
        assert_eq!(dashboard.query(), before);
        assert_eq!(dashboard.gate_state(), GateState::PendingUpdate);
        assert_eq!(dashboard.snapshot().caption, caption);

        assert_eq!(dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap().len(), 2);
    }

    #[test]
    fn chart_is_built_once() {
        let (mut dashboard, _) = started();
        let counts = vec![
            CategoryCount::new("Pizza", 10),
            CategoryCount::new("Tacos", 4),
        ];
        dashboard.deliver(ViewId::Categories, 1, counts.clone());

        let requests = dashboard.select_category("Pizza").unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].view, ViewId::Regions);
        dashboard.deliver(ViewId::Categories, 2, counts);

        dashboard.edit(&edit(circle(40.75, -73.95, 500.0)));
        dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap();

        assert_eq!(dashboard.sink().count(|d| matches!(d, Drawn::Chart(_))), 1);
        let snapshot = dashboard.snapshot();
        let chart = snapshot.chart.unwrap();
        assert_eq!(chart.bars.len(), 2);
        assert!(chart.is_active("Pizza"));
    }

    #[test]
    fn click_before_chart_is_ignored() {
        let (mut dashboard, _) = started();
        assert!(dashboard.select_category("Pizza").unwrap().is_empty());
        assert_eq!(dashboard.generation(), 1);
        assert_eq!(dashboard.selection().active_category, ALL_CATEGORIES);
        assert_eq!(
            dashboard.sink().count(|d| matches!(d, Drawn::Restate(_))),
            0
        );

        dashboard.deliver(ViewId::Categories, 1, vec![CategoryCount::new("Pizza", 3)]);
        assert_eq!(dashboard.select_category("Pizza").unwrap().len(), 1);
        assert_eq!(dashboard.generation(), 2);
    }

    #[test]
    fn pizza_then_tacos_issues_two_queries() {
        let mut dashboard = charted();
        dashboard.select_category("Pizza").unwrap();
        dashboard.select_category("Tacos").unwrap();

        let points = dashboard.sink().points();
        assert_eq!(points.len(), 3);
        assert!(points[1].contains("cuisine = 'Pizza'"));
        assert!(points[2].contains("cuisine = 'Tacos'"));
        assert!(!points[2].contains("Pizza"));
        assert!(points[2].contains("ST_DWithin"));
        assert_eq!(
            dashboard.sink().count(|d| matches!(d, Drawn::Restate(_))),
            2
        );
    }

    #[test]
    fn all_clears_category_filter() {
        let mut dashboard = charted();
        let initial = dashboard.query().to_string();
        dashboard.select_category("Pizza").unwrap();
        dashboard.select_category(ALL_CATEGORIES).unwrap();
        assert_eq!(dashboard.query(), initial);
        assert_eq!(dashboard.selection().category_filter(), None);
    }

    #[test]
    fn unusable_category_leaves_selection() {
        let mut dashboard = charted();
        assert!(dashboard.select_category("").is_err());
        assert!(dashboard.select_category("Pi\nzza").is_err());
        assert_eq!(dashboard.selection().active_category, ALL_CATEGORIES);
        assert_eq!(dashboard.generation(), 1);
    }

    #[test]
    fn quoted_category_is_escaped() {
        let mut dashboard = charted();
        dashboard.select_category("Jimmy's").unwrap();
        assert!(dashboard.query().contains("cuisine = 'Jimmy''s'"));
    }

    #[test]
    fn region_delivery_redraws_map() {
        let (mut dashboard, _) = started();
        dashboard.deliver(
            ViewId::Regions,
            1,
            vec![
                CategoryCount::new("10001", 5),
                CategoryCount::new("10002", 0),
                CategoryCount::new("10003", 12),
            ],
        );

        let map = dashboard.snapshot().map.unwrap();
        let fill = &map.regions[1].fill;
        assert!(matches!(fill, RegionFill::Bucket { index: 0, .. }));
        assert_eq!(map.legend.swatches.len(), 5);
        assert_eq!(dashboard.selection().max_count(), Some(12));
    }

    #[test]
    fn empty_region_result_redraws_without_scale() {
        let (mut dashboard, _) = started();
        dashboard.deliver(ViewId::Regions, 1, Vec::new());

        let map = dashboard.snapshot().map.unwrap();
        assert!(map.legend.is_empty());
        assert!(
            map.regions
                .iter()
                .all(|r| matches!(r.fill, RegionFill::NoData { .. }))
        );
        assert_eq!(dashboard.sink().count(|d| matches!(d, Drawn::Map(_))), 1);
    }

    #[test]
    fn stale_region_result_is_ignored() {
        let mut dashboard = charted();
        dashboard.deliver(ViewId::Regions, 1, vec![CategoryCount::new("10001", 5)]);
        dashboard.select_category("Pizza").unwrap();

        dashboard.deliver(ViewId::Regions, 1, vec![CategoryCount::new("10001", 99)]);
        assert_eq!(
            dashboard.selection().counts,
            vec![CategoryCount::new("10001", 5)]
        );
        assert_eq!(dashboard.sink().count(|d| matches!(d, Drawn::Map(_))), 1);
    }

    #[test]
    fn failed_fetch_keeps_last_good_selection() {
        let mut dashboard = charted();
        dashboard.deliver(ViewId::Regions, 1, vec![CategoryCount::new("10001", 5)]);
        dashboard.select_category("Pizza").unwrap();

        let error = std::io::Error::other("connection reset");
        dashboard.reject(ViewId::Regions, 2, &error);
        assert_eq!(
            dashboard.selection().counts,
            vec![CategoryCount::new("10001", 5)]
        );
    }

    #[test]
    fn unchanged_counts_still_refresh_legend_caption() {
        let mut dashboard = charted();
        let counts = vec![CategoryCount::new("10001", 5)];
        dashboard.deliver(ViewId::Regions, 1, counts.clone());
        dashboard.select_category("Pizza").unwrap();
        dashboard.deliver(ViewId::Regions, 2, counts.clone());

        let maps: Vec<&Drawn> = dashboard
            .sink()
            .drawn
            .iter()
            .filter(|d| matches!(d, Drawn::Map(_)))
            .collect();
        assert_eq!(maps.len(), 2);
        assert_eq!(
            maps[1],
            &Drawn::Map("Restaurants per zip code: Pizza".to_string())
        );

        dashboard.edit(&edit(circle(40.75, -73.95, 500.0)));
        dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap();
        dashboard.deliver(ViewId::Regions, 3, counts);
        assert_eq!(dashboard.sink().count(|d| matches!(d, Drawn::Map(_))), 2);
    }

    #[test]
    fn failed_dashboard_ignores_events() {
        let mut dashboard =
            Dashboard::new(DashboardConfig::embedded_default(), RecordingSink::default()).unwrap();
        dashboard.fail("shape fetch failed");

        dashboard.edit(&edit(circle(40.75, -73.95, 500.0)));
        assert!(dashboard.commit(circle(40.75, -73.95, 500.0)).unwrap().is_empty());
        assert!(dashboard.select_category("Pizza").unwrap().is_empty());
        assert!(dashboard.start(shapes()).unwrap().is_empty());

        assert_eq!(
            dashboard.sink().drawn,
            vec![Drawn::Placeholder("shape fetch failed".to_string())]
        );
        assert!(matches!(
            dashboard.status(),
            DashboardStatus::Failed { .. }
        ));
    }
}
