//! Image server fixtures backed by wiremock

use fetch_pipeline::SourceItem;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes served for image `id`
pub fn image_bytes(id: u32) -> Vec<u8> {
    format!("JFIF-test-image-{id}").into_bytes()
}

/// Route of image `id`, shaped like picsum.photos
pub fn image_route(id: u32) -> String {
    format!("/id/{id}/200/300")
}

/// Serve image `id` after `delay`
pub async fn mount_image(server: &MockServer, id: u32, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(image_route(id)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(image_bytes(id))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Answer image `id` with `status` and no body
pub async fn mount_status(server: &MockServer, id: u32, status: u16) {
    Mock::given(method("GET"))
        .and(path(image_route(id)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Source pointing at image `id` on `server`
pub fn image_source(server: &MockServer, id: u32) -> SourceItem {
    SourceItem::parse(&format!("{}{}", server.uri(), image_route(id)))
        .unwrap_or_else(|e| panic!("invalid fixture url: {e}"))
}

/// Server with images 1 and 3, and image 2 answering 404
pub async fn start_mixed_server() -> (MockServer, Vec<SourceItem>) {
    let server = MockServer::start().await;
    mount_image(&server, 1, Duration::ZERO).await;
    mount_status(&server, 2, 404).await;
    mount_image(&server, 3, Duration::ZERO).await;
    let sources = (1..=3).map(|id| image_source(&server, id)).collect();
    (server, sources)
}
