use crate::domain::model::{BoxCoords, DetectedRegion};
use crate::utils::error::{OcrError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;

const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Copies the pixels under `coords`. The box must lie inside the image.
pub fn crop_region(image: &RgbImage, coords: BoxCoords) -> Result<RgbImage> {
    if coords.is_empty() {
        return Err(OcrError::processing(format!(
            "Invalid crop region: ({}, {}) to ({}, {})",
            coords.x1, coords.y1, coords.x2, coords.y2
        )));
    }
    if coords.x2 > image.width() || coords.y2 > image.height() {
        return Err(OcrError::processing(format!(
            "Crop region ({}, {}) to ({}, {}) exceeds image {}x{}",
            coords.x1,
            coords.y1,
            coords.x2,
            coords.y2,
            image.width(),
            image.height()
        )));
    }

    Ok(imageops::crop_imm(image, coords.x1, coords.y1, coords.width(), coords.height()).to_image())
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub fn encode_png_base64(image: &DynamicImage) -> Result<String> {
    Ok(STANDARD.encode(encode_png(image)?))
}

/// Outlines each region with a 2px green rectangle.
pub fn draw_regions(canvas: &mut RgbImage, regions: &[DetectedRegion]) {
    for region in regions {
        let coords = region.coords();
        for inset in 0..2u32 {
            let w = coords.width().saturating_sub(inset * 2);
            let h = coords.height().saturating_sub(inset * 2);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((coords.x1 + inset) as i32, (coords.y1 + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, REGION_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BoundingBox;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    #[test]
    fn test_crop_region_copies_pixels() {
        let img = gradient(50, 40);
        let crop = crop_region(&img, BoxCoords::new(10, 5, 20, 25)).unwrap();
        assert_eq!(crop.dimensions(), (10, 20));
        assert_eq!(*crop.get_pixel(0, 0), Rgb([10, 5, 0]));
        assert_eq!(*crop.get_pixel(9, 19), Rgb([19, 24, 0]));
    }

    #[test]
    fn test_crop_region_rejects_bad_boxes() {
        let img = gradient(50, 40);
        assert!(crop_region(&img, BoxCoords::new(10, 10, 10, 20)).is_err());
        assert!(crop_region(&img, BoxCoords::new(0, 0, 51, 10)).is_err());
    }

    #[test]
    fn test_png_base64_decodes_back() {
        let img = DynamicImage::ImageRgb8(gradient(8, 6));
        let encoded = encode_png_base64(&img).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_draw_regions_marks_border() {
        let mut canvas = RgbImage::from_pixel(30, 30, Rgb([255, 255, 255]));
        let region = DetectedRegion {
            detection_id: 0,
            bounding_box: BoundingBox::from(BoxCoords::new(5, 5, 25, 25)),
            confidence: 0.9,
            class_id: 0,
            class_name: None,
        };
        draw_regions(&mut canvas, &[region]);
        assert_eq!(*canvas.get_pixel(5, 5), REGION_COLOR);
        assert_eq!(*canvas.get_pixel(6, 15), REGION_COLOR);
        assert_eq!(*canvas.get_pixel(15, 15), Rgb([255, 255, 255]));
    }
}
