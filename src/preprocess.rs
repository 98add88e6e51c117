use clap::ValueEnum;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TensorLayout {
    /// `[1, height, width, 3]`, as exported from Keras.
    Nhwc,
    /// `[1, 3, height, width]`, as exported from PyTorch.
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Shape and encoding the classifier expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
    pub channel_order: ChannelOrder,
}

impl InputSpec {
    pub fn shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

/// Resize to the model input size and scale into `[0, 1]`, batch of one.
pub fn image_to_tensor(image: &DynamicImage, spec: &InputSpec) -> Array4<f32> {
    let resized = image
        .resize_exact(spec.width, spec.height, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::<f32>::zeros(spec.shape());

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let source = match spec.channel_order {
                ChannelOrder::Rgb => c,
                ChannelOrder::Bgr => 2 - c,
            };
            let value = pixel[source] as f32 / 255.0;
            match spec.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    fn spec(layout: TensorLayout, channel_order: ChannelOrder) -> InputSpec {
        InputSpec {
            width: 16,
            height: 8,
            layout,
            channel_order,
        }
    }

    #[test]
    fn nhwc_tensor_has_batch_of_one() {
        let tensor = image_to_tensor(
            &solid(40, 30, [255, 0, 0]),
            &spec(TensorLayout::Nhwc, ChannelOrder::Rgb),
        );

        assert_eq!(tensor.shape(), &[1, 8, 16, 3]);
        assert_eq!(tensor[[0, 4, 4, 0]], 1.0);
        assert_eq!(tensor[[0, 4, 4, 1]], 0.0);
        assert_eq!(tensor[[0, 4, 4, 2]], 0.0);
    }

    #[test]
    fn nchw_puts_channels_before_pixels() {
        let tensor = image_to_tensor(
            &solid(10, 10, [0, 255, 0]),
            &spec(TensorLayout::Nchw, ChannelOrder::Rgb),
        );

        assert_eq!(tensor.shape(), &[1, 3, 8, 16]);
        assert_eq!(tensor[[0, 0, 7, 15]], 0.0);
        assert_eq!(tensor[[0, 1, 7, 15]], 1.0);
    }

    #[test]
    fn bgr_swaps_red_and_blue() {
        let tensor = image_to_tensor(
            &solid(10, 10, [255, 0, 0]),
            &spec(TensorLayout::Nhwc, ChannelOrder::Bgr),
        );

        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert_eq!(tensor[[0, 0, 0, 2]], 1.0);
    }

    #[test]
    fn values_are_scaled_into_unit_range() {
        let tensor = image_to_tensor(
            &solid(100, 100, [128, 128, 128]),
            &spec(TensorLayout::Nhwc, ChannelOrder::Rgb),
        );

        let expected = 128.0 / 255.0;
        assert!(tensor.iter().all(|v| (v - expected).abs() < 1e-4));
    }

    #[test]
    fn decode_rejects_non_image_bytes() {
        assert!(decode(b"definitely not a png").is_err());
        assert!(decode(&[]).is_err());
    }
}
