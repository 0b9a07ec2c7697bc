mod common;

use common::*;
use hyper::Server;
use my_places::client::{Completion, HttpTransport, MapSession, MapWidget, MarkerPhase, PinHandle, WindowHandle};
use my_places::protocol::EMPTY_RESULT_MESSAGE;
use my_places::settings::Viewport;
use my_places::storage::{InMemoryStorage, Storage};
use my_places::templates::ClientConfig;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Default)]
struct RecordingMap {
    next: u64,
    pins: Vec<(f64, f64)>,
    alerts: Vec<String>,
}

impl MapWidget for RecordingMap {
    fn set_view(&mut self, _viewport: Viewport) {}
    fn set_center(&mut self, _latitude: f64, _longitude: f64) {}
    fn add_pin(&mut self, latitude: f64, longitude: f64) -> PinHandle {
        self.next += 1;
        self.pins.push((latitude, longitude));
        PinHandle(self.next)
    }
    fn remove_pin(&mut self, _pin: PinHandle) {
        self.pins.pop();
    }
    fn create_info_window(&mut self, _content: &str) -> WindowHandle {
        self.next += 1;
        WindowHandle(self.next)
    }
    fn release_info_window(&mut self, _window: WindowHandle) {}
    fn open_info_window(&mut self, _window: WindowHandle, _anchor: PinHandle) {}
    fn close_info_window(&mut self, _window: WindowHandle) {}
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

async fn spawn(storage: Arc<dyn Storage>) -> SocketAddr {
    let router = app(&test_config(), storage);
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(router.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn session(addr: SocketAddr, categories: Vec<uuid::Uuid>) -> MapSession<RecordingMap, HttpTransport> {
    let ajax_url = format!("http://{addr}/ajax/get_places");
    let config = ClientConfig {
        ajax_url: ajax_url.clone(),
        google_maps_latitude: "55.7".into(),
        google_maps_longitude: "13.1".into(),
        google_maps_zoom: "12".into(),
    };
    MapSession::new(RecordingMap::default(), &config, categories, HttpTransport::new(ajax_url))
}

#[tokio::test]
async fn empty_store_leaves_zero_pins_and_alerts() {
    let addr = spawn(Arc::new(InMemoryStorage::new())).await;
    let mut session = session(addr, vec![]);

    assert_eq!(session.refresh().await, Completion::Applied);
    assert_eq!(session.markers().pin_count(), 0);
    assert_eq!(
        session.markers().phase(),
        &MarkerPhase::Failed(EMPTY_RESULT_MESSAGE.to_string())
    );
    assert_eq!(session.markers().widget().alerts, vec![EMPTY_RESULT_MESSAGE.to_string()]);
}

#[tokio::test]
async fn toggling_a_category_refetches_everything() {
    let storage = Arc::new(InMemoryStorage::new());
    let cafe = category(storage.as_ref(), "Cafe").await;
    let bar = category(storage.as_ref(), "Bar").await;
    published(storage.as_ref(), "Corner Cafe", vec![cafe]).await;
    published(storage.as_ref(), "Night Bar", vec![bar]).await;
    let addr = spawn(storage).await;

    let mut session = session(addr, vec![cafe, bar]);
    session.refresh().await;
    assert_eq!(session.markers().pin_count(), 2);
    assert_eq!(session.markers().phase(), &MarkerPhase::Populated);

    session.toggle(bar, false).await;
    assert_eq!(session.markers().pin_count(), 1);
    assert_eq!(session.markers().widget().pins.len(), 1);

    // Unchecking every box sends no filter at all
    session.toggle(cafe, false).await;
    assert_eq!(session.markers().pin_count(), 2);
}
