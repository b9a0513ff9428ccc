//! Texture decoding.

use image::RgbaImage;
use ripe_scene::{ColorSpace, MapSlot, Texture};
use tracing::debug;

use crate::error::ResourceResult;

/// Anisotropy applied to every material texture.
pub const MAX_ANISOTROPY: u16 = 16;

/// Decode JPEG or PNG bytes into an RGBA8 image.
pub fn decode_image(bytes: &[u8]) -> ResourceResult<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Decode a texture for a material slot, setting its color space and
/// sampling state.
pub fn decode_texture(
    path: &str,
    bytes: &[u8],
    slot: MapSlot,
    anisotropy: u16,
) -> ResourceResult<Texture> {
    let image = decode_image(bytes)?;
    debug!(path, width = image.width(), height = image.height(), ?slot, "Decoded texture");
    let mut texture = Texture::new(path, image);
    texture.color_space = slot.color_space();
    texture.anisotropy = anisotropy;
    texture.flip_y = false;
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(2, 2, Rgba(color));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_color_maps_are_srgb() {
        let bytes = png_bytes([255, 0, 0, 255]);
        let diffuse = decode_texture("a/map.png", &bytes, MapSlot::Map, MAX_ANISOTROPY).unwrap();
        let normal = decode_texture("a/normal.png", &bytes, MapSlot::NormalMap, MAX_ANISOTROPY).unwrap();

        assert_eq!(diffuse.color_space, ColorSpace::Srgb);
        assert_eq!(normal.color_space, ColorSpace::Linear);
        assert_eq!(diffuse.anisotropy, MAX_ANISOTROPY);
        assert!(!diffuse.flip_y);
        assert_eq!(diffuse.width(), 2);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
