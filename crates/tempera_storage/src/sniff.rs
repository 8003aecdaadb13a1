//! Content sniffing for payloads that arrive without metadata.

use std::io::Cursor;

/// Guess the MIME type from magic bytes.
///
/// Only image formats are recognized; everything else returns `None`.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    Some(format.to_mime_type())
}

/// Read image dimensions from the header without decoding pixels.
pub fn sniff_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn sniffs_png() {
        let png = tiny_png();
        assert_eq!(sniff_mime(&png), Some("image/png"));
        assert_eq!(sniff_dimensions(&png), Some((3, 2)));
    }

    #[test]
    fn unknown_bytes_sniff_to_none() {
        assert_eq!(sniff_mime(b"plain text"), None);
        assert_eq!(sniff_dimensions(b"plain text"), None);
    }
}
