//! Client side of the place query protocol.
//!
//! A [`MarkerSet`] owns the pins currently on a [`MapWidget`] and reconciles them
//! against each query response. Every fetch is a full refresh: all markers are torn
//! down when a fetch begins and rebuilt from the response. Each fetch carries a
//! sequence number and only the most recent one may populate the map, so a slow
//! response to an older filter can never overwrite a newer one.

use crate::error::{PlacesError, Result};
use crate::protocol::{Envelope, PlaceMarker, PlacesRequest};
use crate::settings::Viewport;
use crate::templates::ClientConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// The rendering surface. Pins and info-windows are owned by the widget;
/// the marker set only holds handles to them.
pub trait MapWidget {
    fn set_view(&mut self, viewport: Viewport);
    fn set_center(&mut self, latitude: f64, longitude: f64);
    fn add_pin(&mut self, latitude: f64, longitude: f64) -> PinHandle;
    fn remove_pin(&mut self, pin: PinHandle);
    fn create_info_window(&mut self, content: &str) -> WindowHandle;
    fn release_info_window(&mut self, window: WindowHandle);
    fn open_info_window(&mut self, window: WindowHandle, anchor: PinHandle);
    fn close_info_window(&mut self, window: WindowHandle);
    /// Blocking user-facing message.
    fn alert(&mut self, message: &str);
}

/// Fetches one page of markers for a filter.
#[async_trait]
pub trait PlacesTransport: Send + Sync {
    async fn fetch(&self, request: &PlacesRequest) -> Result<Envelope<PlaceMarker>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub pin: PinHandle,
    pub window: WindowHandle,
    pub latitude: f64,
    pub longitude: f64,
    open: bool,
}

impl MapMarker {
    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerPhase {
    Empty,
    Loading,
    Populated,
    /// Zero markers, with the message that was shown to the user.
    Failed(String),
}

/// Handed out by [`MarkerSet::begin_fetch`] and returned with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub sequence: u64,
    pub request: PlacesRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer fetch began after this one; the response was dropped.
    Stale,
}

pub struct MarkerSet<W: MapWidget> {
    widget: W,
    markers: Vec<MapMarker>,
    phase: MarkerPhase,
    latest: u64,
}

impl<W: MapWidget> MarkerSet<W> {
    pub fn new(mut widget: W, viewport: Viewport) -> Self {
        widget.set_view(viewport);
        Self {
            widget,
            markers: Vec::new(),
            phase: MarkerPhase::Empty,
            latest: 0,
        }
    }

    pub fn phase(&self) -> &MarkerPhase {
        &self.phase
    }

    pub fn markers(&self) -> &[MapMarker] {
        &self.markers
    }

    pub fn pin_count(&self) -> usize {
        self.markers.len()
    }

    pub fn open_windows(&self) -> usize {
        self.markers.iter().filter(|m| m.open).count()
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// New position from a location watch. Markers are left alone.
    pub fn recenter(&mut self, latitude: f64, longitude: f64) {
        self.widget.set_center(latitude, longitude);
    }

    fn clear(&mut self) {
        for marker in self.markers.drain(..) {
            self.widget.remove_pin(marker.pin);
            self.widget.release_info_window(marker.window);
        }
    }

    /// Tear down every marker and start a new fetch cycle.
    pub fn begin_fetch(&mut self, request: PlacesRequest) -> FetchTicket {
        self.clear();
        self.latest += 1;
        self.phase = MarkerPhase::Loading;
        debug!(sequence = self.latest, "Fetch cycle started");
        FetchTicket {
            sequence: self.latest,
            request,
        }
    }

    /// Apply a fetch result, unless a newer fetch has begun since.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<Envelope<PlaceMarker>>,
    ) -> Completion {
        if ticket.sequence != self.latest {
            debug!(
                sequence = ticket.sequence,
                latest = self.latest,
                "Discarding stale response"
            );
            return Completion::Stale;
        }

        match outcome {
            Ok(Envelope::Success(entries)) => {
                for entry in &entries {
                    let pin = self.widget.add_pin(entry.latitude, entry.longitude);
                    let window = self.widget.create_info_window(&entry.content);
                    self.markers.push(MapMarker {
                        pin,
                        window,
                        latitude: entry.latitude,
                        longitude: entry.longitude,
                        open: false,
                    });
                }
                self.phase = if entries.is_empty() {
                    MarkerPhase::Empty
                } else {
                    MarkerPhase::Populated
                };
                info!(pins = entries.len(), "Markers rendered");
            }
            Ok(Envelope::Failure(message)) => {
                self.widget.alert(&message);
                self.phase = MarkerPhase::Failed(message);
            }
            Err(e) => {
                warn!(error = %e, "Place fetch failed");
                let message = format!("Could not load places: {e}");
                self.widget.alert(&message);
                self.phase = MarkerPhase::Failed(message);
            }
        }
        Completion::Applied
    }

    /// Clicking a pin closes every other info-window, then opens its own.
    pub fn click(&mut self, index: usize) -> Result<()> {
        if index >= self.markers.len() {
            return Err(PlacesError::NotFound(format!("no marker at index {index}")));
        }
        for (i, marker) in self.markers.iter_mut().enumerate() {
            if i != index && marker.open {
                self.widget.close_info_window(marker.window);
                marker.open = false;
            }
        }
        let marker = &mut self.markers[index];
        self.widget.open_info_window(marker.window, marker.pin);
        marker.open = true;
        Ok(())
    }
}

/// Category checkboxes. The selection is always re-derived from every box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    checked: BTreeMap<Uuid, bool>,
}

impl FilterState {
    /// All categories start checked.
    pub fn all_checked<I: IntoIterator<Item = Uuid>>(ids: I) -> Self {
        Self {
            checked: ids.into_iter().map(|id| (id, true)).collect(),
        }
    }

    pub fn set(&mut self, id: Uuid, checked: bool) {
        self.checked.insert(id, checked);
    }

    pub fn selected(&self) -> Vec<Uuid> {
        self.checked
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| *id)
            .collect()
    }

    /// With no box checked the request carries no filter and every place comes back.
    pub fn request(&self) -> PlacesRequest {
        PlacesRequest {
            placetypes: self.selected(),
        }
    }
}

/// One map view: widget, checkbox state and transport wired together.
pub struct MapSession<W: MapWidget, T: PlacesTransport> {
    markers: MarkerSet<W>,
    filter: FilterState,
    transport: T,
}

impl<W: MapWidget, T: PlacesTransport> MapSession<W, T> {
    pub fn new(widget: W, config: &ClientConfig, categories: Vec<Uuid>, transport: T) -> Self {
        let viewport = Viewport::parse(
            &config.google_maps_latitude,
            &config.google_maps_longitude,
            &config.google_maps_zoom,
        );
        Self {
            markers: MarkerSet::new(widget, viewport),
            filter: FilterState::all_checked(categories),
            transport,
        }
    }

    pub fn markers(&self) -> &MarkerSet<W> {
        &self.markers
    }

    /// A click on the pin at `index`.
    pub fn click(&mut self, index: usize) -> Result<()> {
        self.markers.click(index)
    }

    /// Run one full fetch cycle with the current checkbox state.
    pub async fn refresh(&mut self) -> Completion {
        let ticket = self.markers.begin_fetch(self.filter.request());
        let outcome = self.transport.fetch(&ticket.request).await;
        self.markers.complete(&ticket, outcome)
    }

    pub async fn toggle(&mut self, category: Uuid, checked: bool) -> Completion {
        self.filter.set(category, checked);
        self.refresh().await
    }

    pub fn on_position(&mut self, latitude: f64, longitude: f64) {
        self.markers.recenter(latitude, longitude);
    }
}

/// Posts the filter to a `get_places` endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    ajax_url: String,
}

impl HttpTransport {
    pub fn new(ajax_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            ajax_url: ajax_url.into(),
        }
    }
}

#[async_trait]
impl PlacesTransport for HttpTransport {
    async fn fetch(&self, request: &PlacesRequest) -> Result<Envelope<PlaceMarker>> {
        let body = self
            .client
            .post(&self.ajax_url)
            .form(&request.to_form_pairs())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Envelope::from_json(&body)
    }
}

/// Terminal "map" for the `browse` command: prints what a real map would draw.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    next_handle: u64,
    windows: BTreeMap<u64, String>,
}

impl ConsoleMap {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapWidget for ConsoleMap {
    fn set_view(&mut self, viewport: Viewport) {
        println!(
            "🗺️  Map centered at ({}, {}) zoom {}",
            viewport.latitude, viewport.longitude, viewport.zoom
        );
    }

    fn set_center(&mut self, latitude: f64, longitude: f64) {
        println!("📍 Recentered at ({latitude}, {longitude})");
    }

    fn add_pin(&mut self, latitude: f64, longitude: f64) -> PinHandle {
        let handle = self.next();
        println!("📌 Pin {handle} at ({latitude}, {longitude})");
        PinHandle(handle)
    }

    fn remove_pin(&mut self, _pin: PinHandle) {}

    fn create_info_window(&mut self, content: &str) -> WindowHandle {
        let handle = self.next();
        println!("   {content}");
        self.windows.insert(handle, content.to_string());
        WindowHandle(handle)
    }

    fn release_info_window(&mut self, window: WindowHandle) {
        self.windows.remove(&window.0);
    }

    fn open_info_window(&mut self, window: WindowHandle, _anchor: PinHandle) {
        if let Some(content) = self.windows.get(&window.0) {
            println!("💬 {content}");
        }
    }

    fn close_info_window(&mut self, _window: WindowHandle) {}

    fn alert(&mut self, message: &str) {
        println!("⚠️  {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeMap {
        next: u64,
        pins: HashSet<u64>,
        windows: HashSet<u64>,
        open: HashSet<u64>,
        alerts: Vec<String>,
        center: Option<(f64, f64)>,
    }

    impl MapWidget for FakeMap {
        fn set_view(&mut self, viewport: Viewport) {
            self.center = Some((viewport.latitude, viewport.longitude));
        }
        fn set_center(&mut self, latitude: f64, longitude: f64) {
            self.center = Some((latitude, longitude));
        }
        fn add_pin(&mut self, _: f64, _: f64) -> PinHandle {
            self.next += 1;
            self.pins.insert(self.next);
            PinHandle(self.next)
        }
        fn remove_pin(&mut self, pin: PinHandle) {
            assert!(self.pins.remove(&pin.0), "removed unknown pin");
        }
        fn create_info_window(&mut self, _: &str) -> WindowHandle {
            self.next += 1;
            self.windows.insert(self.next);
            WindowHandle(self.next)
        }
        fn release_info_window(&mut self, window: WindowHandle) {
            self.open.remove(&window.0);
            assert!(self.windows.remove(&window.0), "released unknown window");
        }
        fn open_info_window(&mut self, window: WindowHandle, _: PinHandle) {
            self.open.insert(window.0);
        }
        fn close_info_window(&mut self, window: WindowHandle) {
            self.open.remove(&window.0);
        }
        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }
    }

    fn markers(n: usize) -> Envelope<PlaceMarker> {
        Envelope::Success(
            (0..n)
                .map(|i| PlaceMarker {
                    latitude: i as f64,
                    longitude: i as f64,
                    content: format!("<p><b>Place {i}</b></p>"),
                })
                .collect(),
        )
    }

    fn viewport() -> Viewport {
        Viewport::parse("55.7", "13.1", "12")
    }

    #[test]
    fn pins_match_response_length_and_refresh_replaces_them() {
        let mut set = MarkerSet::new(FakeMap::default(), viewport());
        let ticket = set.begin_fetch(PlacesRequest::default());
        assert_eq!(set.phase(), &MarkerPhase::Loading);
        assert_eq!(set.complete(&ticket, Ok(markers(3))), Completion::Applied);
        assert_eq!(set.pin_count(), 3);
        assert_eq!(set.widget().pins.len(), 3);
        assert_eq!(set.phase(), &MarkerPhase::Populated);

        let ticket = set.begin_fetch(PlacesRequest::default());
        assert_eq!(set.widget().pins.len(), 0, "teardown happens before the request");
        assert!(set.widget().windows.is_empty());
        set.complete(&ticket, Ok(markers(1)));
        assert_eq!(set.widget().pins.len(), 1);
    }

    #[test]
    fn at_most_one_info_window_is_open() {
        let mut set = MarkerSet::new(FakeMap::default(), viewport());
        let ticket = set.begin_fetch(PlacesRequest::default());
        set.complete(&ticket, Ok(markers(3)));

        set.click(0).unwrap();
        set.click(2).unwrap();
        set.click(1).unwrap();
        assert_eq!(set.open_windows(), 1);
        assert_eq!(set.widget().open.len(), 1);
        assert!(set.markers()[1].is_open());
        assert!(set.click(7).is_err());
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut set = MarkerSet::new(FakeMap::default(), viewport());
        let first = set.begin_fetch(PlacesRequest::default());
        let second = set.begin_fetch(PlacesRequest::default());

        assert_eq!(set.complete(&second, Ok(markers(2))), Completion::Applied);
        assert_eq!(set.complete(&first, Ok(markers(5))), Completion::Stale);
        assert_eq!(set.pin_count(), 2);
    }

    #[test]
    fn failure_envelope_alerts_and_leaves_map_empty() {
        let mut set = MarkerSet::new(FakeMap::default(), viewport());
        let ticket = set.begin_fetch(PlacesRequest::default());
        set.complete(&ticket, Ok(Envelope::Failure("nothing here".into())));
        assert_eq!(set.pin_count(), 0);
        assert_eq!(set.widget().alerts, vec!["nothing here"]);
        assert_eq!(set.phase(), &MarkerPhase::Failed("nothing here".into()));

        let ticket = set.begin_fetch(PlacesRequest::default());
        set.complete(
            &ticket,
            Err(PlacesError::Api {
                message: "connection reset".into(),
            }),
        );
        assert_eq!(set.widget().alerts.len(), 2);
        assert_eq!(set.pin_count(), 0);
    }

    #[test]
    fn recenter_does_not_touch_markers() {
        let mut set = MarkerSet::new(FakeMap::default(), viewport());
        assert_eq!(set.widget().center, Some((55.7, 13.1)));
        let ticket = set.begin_fetch(PlacesRequest::default());
        set.complete(&ticket, Ok(markers(2)));
        set.recenter(1.0, 2.0);
        assert_eq!(set.widget().center, Some((1.0, 2.0)));
        assert_eq!(set.pin_count(), 2);
    }

    #[test]
    fn filter_selection_is_rederived_from_all_boxes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut filter = FilterState::all_checked([a, b]);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(filter.selected(), expected);

        filter.set(a, false);
        assert_eq!(filter.selected(), vec![b]);
        filter.set(b, false);
        assert!(filter.request().placetypes.is_empty());
    }

    struct StaticTransport(usize);

    #[async_trait]
    impl PlacesTransport for StaticTransport {
        async fn fetch(&self, request: &PlacesRequest) -> Result<Envelope<PlaceMarker>> {
            Ok(markers(self.0.min(request.placetypes.len().max(1))))
        }
    }

    #[tokio::test]
    async fn session_refreshes_on_toggle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let config = ClientConfig {
            ajax_url: "http://localhost/ajax/get_places".into(),
            google_maps_latitude: "55.7".into(),
            google_maps_longitude: "13.1".into(),
            google_maps_zoom: "12".into(),
        };
        let mut session = MapSession::new(FakeMap::default(), &config, vec![a, b], StaticTransport(5));
        assert_eq!(session.refresh().await, Completion::Applied);
        assert_eq!(session.markers().pin_count(), 2);

        session.toggle(a, false).await;
        assert_eq!(session.markers().pin_count(), 1);

        session.click(0).unwrap();
        assert_eq!(session.markers().open_windows(), 1);
        assert!(session.click(1).is_err());

        session.on_position(10.0, 20.0);
        assert_eq!(session.markers().widget().center, Some((10.0, 20.0)));
    }
}
