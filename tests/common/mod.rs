//! Helpers shared by the integration tests.

use edison_lib::{BackendClient, Config, ImageUpload};
use wiremock::MockServer;

/// Tiny in-memory PNG.
pub fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 191, 165]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode sample png");
    png
}

pub fn board() -> ImageUpload {
    ImageUpload::from_bytes("board.png", sample_png()).expect("sample png is an image")
}

pub fn client_for(server: &MockServer) -> BackendClient {
    let config = Config {
        api_url: server.uri(),
        ..Config::default()
    };
    BackendClient::new(config).expect("build client")
}
