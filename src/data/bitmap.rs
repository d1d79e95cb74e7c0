use std::sync::Arc;

use image::DynamicImage;

/// Bundled fallback shown before the user provides anything.
pub const DEFAULT_IMAGE: &[u8] = include_bytes!("../../assets/default.png");

// ---------------------------------------------------------------------------
// LoadedImage – encoded bytes plus decoded pixels
// ---------------------------------------------------------------------------

/// An image the dashboard can both classify and display.
///
/// egui's image loaders cache by URI and never evict on their own, so the URI
/// is derived from the encoded bytes: the same content always maps to the
/// same cache entry. The encoded bytes are kept for display.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub uri: String,
    pub bytes: Arc<[u8]>,
    pub image: Arc<DynamicImage>,
}

impl LoadedImage {
    /// Decode `bytes`; `origin` only shapes the URI (e.g. "upload", "remote").
    pub fn decode(origin: &str, bytes: impl Into<Arc<[u8]>>) -> Result<Self, image::ImageError> {
        let bytes: Arc<[u8]> = bytes.into();
        let image = image::load_from_memory(&bytes)?;
        Ok(Self {
            uri: format!("bytes://{origin}/{}", hash_bytes(&bytes)),
            bytes,
            image: Arc::new(image),
        })
    }

    /// Reuse `self` when `bytes` is what it was decoded from.
    pub fn reuse_or_decode(
        &self,
        origin: &str,
        bytes: impl AsRef<[u8]> + Into<Arc<[u8]>>,
    ) -> Result<Self, image::ImageError> {
        if self.bytes[..] == *bytes.as_ref() {
            return Ok(self.clone());
        }
        Self::decode(origin, bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encoding of an in-memory image");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn bundled_default_image_decodes() {
        let loaded = LoadedImage::decode("default", DEFAULT_IMAGE).unwrap();
        assert!(loaded.width() > 0 && loaded.height() > 0);
    }

    fn png(pixel: [u8; 3]) -> Vec<u8> {
        encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb(pixel))))
    }

    #[test]
    fn uri_follows_content() {
        let a = LoadedImage::decode("upload", png([1, 2, 3])).unwrap();
        let b = LoadedImage::decode("upload", png([1, 2, 3])).unwrap();
        let c = LoadedImage::decode("upload", png([9, 2, 3])).unwrap();
        assert_eq!(a.uri, b.uri);
        assert_ne!(a.uri, c.uri);
        assert!(a.uri.starts_with("bytes://upload/"));
        assert_eq!((a.width(), a.height()), (4, 3));
    }

    #[test]
    fn unchanged_bytes_reuse_the_decoded_image() {
        let bytes = png([4, 5, 6]);
        let first = LoadedImage::decode("upload", bytes.clone()).unwrap();
        let again = first.reuse_or_decode("upload", bytes).unwrap();
        assert!(Arc::ptr_eq(&first.image, &again.image));

        let other = first.reuse_or_decode("upload", png([7, 8, 9])).unwrap();
        assert!(!Arc::ptr_eq(&first.image, &other.image));
        assert_ne!(first.uri, other.uri);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(LoadedImage::decode("upload", b"not an image".to_vec()).is_err());
    }
}
