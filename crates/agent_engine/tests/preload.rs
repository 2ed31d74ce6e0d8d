use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_engine::{
    decode_data_uri, decode_image, DecodedImage, EngineEvent, EventSink, ImagePreloader,
    PreloadError,
};
use base64::Engine as _;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl TestSink {
    fn outcomes(&self) -> Vec<(u64, Result<DecodedImage, PreloadError>)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::PreloadFinished { id, result } => Some((*id, result.clone())),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn png_data_uri(width: u32, height: u32) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height));
    format!("data:image/png;base64,{encoded}")
}

fn preloader(sink: Arc<TestSink>) -> ImagePreloader {
    ImagePreloader::new(reqwest::Client::new(), sink)
}

async fn wait_for(sink: &TestSink, count: usize) {
    for _ in 0..200 {
        if sink.outcomes().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} preload outcomes, got {:?}", sink.outcomes());
}

fn decoded(width: u32, height: u32) -> DecodedImage {
    DecodedImage {
        format: "png".to_string(),
        width,
        height,
    }
}

#[test]
fn decodes_png_data_uri() {
    let bytes = decode_data_uri(&png_data_uri(4, 3)).unwrap();
    assert_eq!(decode_image(&bytes).unwrap(), decoded(4, 3));
}

#[test]
fn truncated_image_is_rejected() {
    let bytes = png_bytes(16, 16);
    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(
        decode_image(truncated),
        Err(PreloadError::Decode(_))
    ));
}

#[test]
fn malformed_data_uris_are_rejected() {
    assert_eq!(
        decode_data_uri("data:image/png,plain"),
        Err(PreloadError::MalformedDataUri)
    );
    assert_eq!(
        decode_data_uri("image/png;base64,AAAA"),
        Err(PreloadError::MalformedDataUri)
    );
    assert!(matches!(
        decode_data_uri("data:image/png;base64,@@@"),
        Err(PreloadError::Base64(_))
    ));
}

#[tokio::test]
async fn data_uri_preload_reports_dimensions() {
    let sink = Arc::new(TestSink::default());
    let preloader = preloader(sink.clone());
    preloader.preload(1, png_data_uri(8, 6));

    wait_for(&sink, 1).await;
    assert_eq!(sink.outcomes(), vec![(1, Ok(decoded(8, 6)))]);
    assert_eq!(preloader.in_flight(), 0);
}

#[tokio::test]
async fn broken_payload_reports_failure() {
    let sink = Arc::new(TestSink::default());
    let preloader = preloader(sink.clone());
    preloader.preload(7, "data:image/jpeg;base64,AAAA".to_string());
    preloader.preload(8, "ftp://example.com/shot.png".to_string());

    wait_for(&sink, 2).await;
    let outcomes = sink.outcomes();
    assert!(outcomes
        .iter()
        .any(|(id, result)| *id == 7 && matches!(result, Err(PreloadError::Decode(_)))));
    assert!(outcomes
        .iter()
        .any(|(id, result)| *id == 8 && *result == Err(PreloadError::UnsupportedUrl)));
}

#[tokio::test]
async fn same_url_is_downloaded_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shot.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(png_bytes(5, 5), "image/png")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(TestSink::default());
    let preloader = preloader(sink.clone());
    let url = format!("{}/shot.png", server.uri());
    preloader.preload(1, url.clone());
    preloader.preload(2, url);
    assert_eq!(preloader.in_flight(), 1);

    wait_for(&sink, 2).await;
    let mut outcomes = sink.outcomes();
    outcomes.sort_by_key(|(id, _)| *id);
    assert_eq!(outcomes, vec![(1, Ok(decoded(5, 5))), (2, Ok(decoded(5, 5)))]);
}

#[tokio::test]
async fn missing_remote_image_is_a_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sink = Arc::new(TestSink::default());
    let preloader = preloader(sink.clone());
    preloader.preload(3, format!("{}/gone.png", server.uri()));

    wait_for(&sink, 1).await;
    assert!(matches!(
        sink.outcomes().as_slice(),
        [(3, Err(PreloadError::Download(_)))]
    ));
}

#[tokio::test]
async fn cancel_all_suppresses_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(png_bytes(2, 2), "image/png")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let sink = Arc::new(TestSink::default());
    let preloader = preloader(sink.clone());
    preloader.preload(1, format!("{}/slow.png", server.uri()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    preloader.cancel_all();
    assert_eq!(preloader.in_flight(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(sink.outcomes().is_empty());
}
