//! Shared fixtures for integration tests: fast clients, payload builders and
//! mock mounting helpers.

#![allow(dead_code)]

pub mod socket_guard;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, RgbImage};
use mangadl_core::api::{ApiClient, ClientConfig, Credentials, RateLimiter, RetryPolicy};
use mangadl_core::download::FetchSettings;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Retry policy with millisecond delays and no jitter.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(5),
        Duration::from_millis(20),
        2.0,
    )
    .with_jitter(Duration::ZERO)
}

/// Client config aimed at a mock server, token endpoint at `/auth/token`.
pub fn client_config(uri: &str, credentials: Credentials) -> ClientConfig {
    ClientConfig {
        api_base_url: uri.to_string(),
        token_url: format!("{uri}/auth/token"),
        credentials,
        retry_policy: fast_retry(4),
        rate_limit_fallback: Duration::from_millis(5),
        ..ClientConfig::default()
    }
}

/// Anonymous client with a disabled limiter and fast retries.
pub fn fast_client(uri: &str) -> Arc<ApiClient> {
    client_with(client_config(uri, Credentials::default()))
}

pub fn client_with(config: ClientConfig) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(config, Arc::new(RateLimiter::disabled())).expect("client builds"))
}

/// Image fetch settings with millisecond waits.
pub fn fast_fetch(prefer_reduced: bool) -> FetchSettings {
    FetchSettings {
        prefer_reduced,
        retry_delay: Duration::from_millis(1),
        rate_limit_fallback: Duration::from_millis(1),
        ..FetchSettings::default()
    }
}

/// A tiny PNG page.
pub fn png_page() -> Vec<u8> {
    let image = RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("png encodes");
    buf
}

/// A tiny JPEG page.
pub fn jpeg_page() -> Vec<u8> {
    let image = RgbImage::from_pixel(4, 4, image::Rgb([30, 30, 200]));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("jpeg encodes");
    buf
}

pub fn manga_json(id: &str, title: &str) -> Value {
    json!({
        "result": "ok",
        "data": {
            "id": id,
            "type": "manga",
            "attributes": {
                "title": {"en": title},
                "description": {"en": "A test series."},
                "status": "ongoing",
                "year": 2020,
                "tags": [{"attributes": {"name": {"en": "Action"}}}]
            },
            "relationships": [
                {"id": "au-1", "type": "author", "attributes": {"name": "Writer One"}},
                {"id": "ar-1", "type": "artist", "attributes": {"name": "Artist One"}}
            ]
        }
    })
}

pub fn chapter_json(id: &str, volume: Option<&str>, number: &str) -> Value {
    json!({
        "id": id,
        "type": "chapter",
        "attributes": {
            "volume": volume,
            "chapter": number,
            "title": null,
            "translatedLanguage": "en",
            "externalUrl": null
        }
    })
}

pub fn chapter_page(chapters: &[Value], total: usize) -> Value {
    json!({"result": "ok", "data": chapters, "limit": chapters.len(), "offset": 0, "total": total})
}

pub fn at_home_json(base_url: &str, hash: &str, data: &[String], data_saver: &[String]) -> Value {
    json!({
        "result": "ok",
        "baseUrl": base_url,
        "chapter": {"hash": hash, "data": data, "dataSaver": data_saver}
    })
}

pub fn page_files(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("p{n}.png")).collect()
}

/// Mounts `/manga/{id}` returning a title record.
pub async fn mount_manga(server: &MockServer, id: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/manga/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(manga_json(id, title)))
        .mount(server)
        .await;
}

/// Mounts an at-home answer for `chapter_id` and `pages` full-quality PNG
/// pages served from the same mock server.
pub async fn mount_chapter_images(server: &MockServer, chapter_id: &str, pages: usize) {
    let hash = format!("hash-{chapter_id}");
    let files = page_files(pages);
    Mock::given(method("GET"))
        .and(path(format!("/at-home/server/{chapter_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(at_home_json(&server.uri(), &hash, &files, &[])),
        )
        .mount(server)
        .await;

    for file in &files {
        Mock::given(method("GET"))
            .and(path(format!("/data/{hash}/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_page()))
            .mount(server)
            .await;
    }
}

/// Entry names of a CBZ archive, in archive order.
pub fn archive_entries(path: &std::path::Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("archive exists");
    let mut archive = zip::ZipArchive::new(file).expect("valid zip");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("entry").name().to_string())
        .collect()
}
