use std::path::PathBuf;

use clap::Parser;

use crate::preprocess::{ChannelOrder, InputSpec, TensorLayout};

/// Classifies hand-gesture images and serves the matching animations.
#[derive(Debug, Clone, Parser)]
#[command(name = "signova", version, about)]
pub struct Config {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to serve on
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// ONNX model artifact
    #[arg(long, default_value = "signova_model.onnx")]
    pub model: PathBuf,

    /// JSON object mapping upper-case gesture labels to animation filenames
    #[arg(long, default_value = "gif_map.json")]
    pub gif_map: PathBuf,

    /// Class labels in model output order, one per line.
    /// Defaults to the sorted keys of the gif map.
    #[arg(long)]
    pub classes: Option<PathBuf>,

    #[arg(long, default_value = "static/gifs")]
    pub gif_dir: PathBuf,

    /// Front-end page and assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, default_value_t = 128, value_parser = clap::value_parser!(u32).range(1..))]
    pub input_width: u32,

    #[arg(long, default_value_t = 128, value_parser = clap::value_parser!(u32).range(1..))]
    pub input_height: u32,

    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    pub layout: TensorLayout,

    #[arg(long, value_enum, default_value_t = ChannelOrder::Rgb)]
    pub channel_order: ChannelOrder,

    /// Number of HTTP workers (defaults to the number of CPUs)
    #[arg(long)]
    pub workers: Option<usize>,
}

impl Config {
    pub fn input_spec(&self) -> InputSpec {
        InputSpec {
            width: self.input_width,
            height: self.input_height,
            layout: self.layout,
            channel_order: self.channel_order,
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
