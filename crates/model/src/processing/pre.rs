use crate::params::{DEFAULT_INPUT_SIZE, OutputLayout};
use common::{span, span_debug};
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{ArrayD, IxDyn};

const LETTERBOX_COLOR: u8 = 114;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Geometry of one letterbox operation, needed to map boxes back onto the
/// original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl LetterboxTransform {
    /// Map a point from network input space back to the original image,
    /// clamped to its bounds.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let y = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (x, y)
    }
}

pub struct PreProcessor {
    pub input_size: (u32, u32),
    layout: OutputLayout,
    letterboxed_buffer: Vec<u8>,
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32), layout: OutputLayout) -> Self {
        Self {
            input_size,
            layout,
            letterboxed_buffer: vec![LETTERBOX_COLOR; (input_size.0 * input_size.1 * 3) as usize],
        }
    }

    /// Letterbox `image` into the network input and return the NCHW tensor
    /// together with the transform that produced it.
    pub fn preprocess(
        &mut self,
        image: &RgbImage,
    ) -> anyhow::Result<(ArrayD<f32>, LetterboxTransform)> {
        let _s = span!("preprocess");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image");

        let (scale, offset_x, offset_y) = self.resize_and_letterbox(image.as_raw(), width, height)?;

        let input = self.normalize()?;

        let transform = LetterboxTransform {
            orig_width: width,
            orig_height: height,
            input_width: self.input_size.0,
            input_height: self.input_size.1,
            scale,
            offset_x,
            offset_y,
        };

        Ok((input, transform))
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32)> {
        let _s = span_debug!("resize_and_letterbox");

        let scale =
            (self.input_size.0 as f32 / width as f32).min(self.input_size.1 as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, self.input_size.0);
        let new_height = ((height as f32 * scale) as u32).clamp(1, self.input_size.1);

        let offset_x = (self.input_size.0 - new_width) / 2;
        let offset_y = (self.input_size.1 - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;

        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = self.input_size.0 * 3;
        let row_len = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        Ok((scale, offset_x as f32, offset_y as f32))
    }

    fn normalize(&self) -> anyhow::Result<ArrayD<f32>> {
        let _s = span_debug!("normalize");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in self.letterboxed_buffer.chunks_exact(3).enumerate() {
            let r = px[0] as f32 / 255.0;
            let g = px[1] as f32 / 255.0;
            let b = px[2] as f32 / 255.0;

            match self.layout {
                OutputLayout::Yolo => {
                    output[i] = r;
                    output[i + spatial] = g;
                    output[i + 2 * spatial] = b;
                }
                OutputLayout::Detr => {
                    output[i] = (r - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
                    output[i + spatial] = (g - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
                    output[i + 2 * spatial] = (b - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
                }
            }
        }

        Ok(ArrayD::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE, OutputLayout::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_preprocessing() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        image.put_pixel(1, 1, Rgb([255, 255, 255]));

        let mut preprocessor = PreProcessor::default();
        let result = preprocessor.preprocess(&image);

        assert!(result.is_ok(), "RGB preprocessing should succeed");
        let (output, transform) = result.unwrap();
        assert_eq!(output.shape(), &[1, 3, 640, 640]);
        assert_eq!(transform.orig_width, 2);
        assert_eq!(transform.scale, 320.0);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let image = RgbImage::new(0, 0);
        let mut preprocessor = PreProcessor::default();

        let err = preprocessor.preprocess(&image).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 (4:3) into 512x512
        let image = RgbImage::from_pixel(800, 600, Rgb([128, 128, 128]));

        let mut preprocessor = PreProcessor::new((512, 512), OutputLayout::Yolo);
        let (output, transform) = preprocessor.preprocess(&image).unwrap();

        // min(512/800, 512/600) = 0.64 -> 512x384, centred vertically
        assert_eq!(transform.scale, 0.64, "Scale should preserve aspect ratio");
        assert_eq!(transform.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(transform.offset_y, 64.0, "Y offset should center vertically");
        assert_eq!(output.shape(), &[1, 3, 512, 512]);

        // Padding rows keep the letterbox colour, image rows the source colour
        let pad = LETTERBOX_COLOR as f32 / 255.0;
        let gray = 128.0 / 255.0;
        assert!((output[[0, 0, 10, 256]] - pad).abs() < 1e-6);
        assert!((output[[0, 0, 256, 256]] - gray).abs() < 1e-6);
    }

    #[test]
    fn test_tall_image_is_centred_horizontally() {
        let image = RgbImage::from_pixel(300, 600, Rgb([10, 20, 30]));

        let mut preprocessor = PreProcessor::new((640, 640), OutputLayout::Yolo);
        let (_, transform) = preprocessor.preprocess(&image).unwrap();

        // scale = 640/600, new width = 320 -> offset (640 - 320) / 2
        assert_eq!(transform.offset_y, 0.0);
        assert_eq!(transform.offset_x, 160.0);
    }

    #[test]
    fn test_yolo_layout_scales_to_unit_range() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 51]));

        let mut preprocessor = PreProcessor::new((4, 4), OutputLayout::Yolo);
        let (output, _) = preprocessor.preprocess(&image).unwrap();

        assert!((output[[0, 0, 1, 1]] - 1.0).abs() < 1e-6);
        assert!(output[[0, 1, 1, 1]].abs() < 1e-6);
        assert!((output[[0, 2, 1, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_detr_layout_applies_imagenet_normalization() {
        // mid gray 128 (0.502) with ImageNet norm:
        //   R: (0.502 - 0.485) / 0.229 ≈ 0.074
        //   G: (0.502 - 0.456) / 0.224 ≈ 0.205
        //   B: (0.502 - 0.406) / 0.225 ≈ 0.427
        let image = RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]));

        let mut preprocessor = PreProcessor::new((8, 8), OutputLayout::Detr);
        let (output, _) = preprocessor.preprocess(&image).unwrap();

        let r = output[[0, 0, 4, 4]];
        let g = output[[0, 1, 4, 4]];
        let b = output[[0, 2, 4, 4]];

        assert!((r - 0.074).abs() < 0.01, "R channel should be ~0.074 (got {})", r);
        assert!((g - 0.205).abs() < 0.01, "G channel should be ~0.205 (got {})", g);
        assert!((b - 0.427).abs() < 0.01, "B channel should be ~0.427 (got {})", b);
    }

    #[test]
    fn test_transform_maps_back_and_clamps() {
        let transform = LetterboxTransform {
            orig_width: 800,
            orig_height: 600,
            input_width: 512,
            input_height: 512,
            scale: 0.64,
            offset_x: 0.0,
            offset_y: 64.0,
        };

        let (x, y) = transform.to_original(204.8, 204.8);
        assert!((x - 320.0).abs() < 0.1);
        assert!((y - 220.0).abs() < 0.1);

        // Inside the top padding -> clamped to 0, beyond the right edge -> width
        assert_eq!(transform.to_original(600.0, 10.0), (800.0, 0.0));
    }
}
