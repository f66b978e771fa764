//! Intrinsic dimensions of fetched asset bytes.
//!
//! Probes raster formats through their headers without decoding pixels and
//! falls back to parsing SVG, so image layers can report a natural size as
//! soon as their asset has loaded.

use std::io::Cursor;

/// Get the intrinsic dimensions of asset bytes.
///
/// Returns `None` for anything that is neither a supported raster format
/// nor an SVG document (video, HTML, fonts, ...).
pub fn intrinsic_size(bytes: &[u8]) -> Option<(u32, u32)> {
    raster_size(bytes).or_else(|| svg_size(bytes))
}

fn raster_size(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn svg_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if !looks_like_svg(bytes) {
        return None;
    }
    let tree = resvg::usvg::Tree::from_data(bytes, &resvg::usvg::Options::default()).ok()?;
    let size = tree.size();
    Some((size.width() as u32, size.height() as u32))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    String::from_utf8_lossy(head).contains("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(intrinsic_size(&png_bytes(3, 2)), Some((3, 2)));
    }

    #[test]
    fn test_svg_dimensions() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30"></svg>"#;
        assert_eq!(intrinsic_size(svg), Some((40, 30)));
    }

    #[test]
    fn test_unknown_bytes() {
        assert_eq!(intrinsic_size(b"<html></html>"), None);
    }
}
