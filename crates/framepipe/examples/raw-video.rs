//! Serve a short synthetic clip as raw video and wait for an encoder.
//!
//! Run with:
//!   cargo run --example raw-video
//!
//! Then start the encoder with the printed arguments, e.g.
//!   ffmpeg <printed arguments> clip.mp4

use framepipe::frame::{Bitmap, RasterFrame, RasterLayout};
use framepipe::pipe::{PipeArgument, RawVideoSource};
use framepipe::transport::PipeConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FRAMES: u32 = 75;

fn gradient(n: u32) -> Result<RasterFrame<Bitmap>, Box<dyn std::error::Error>> {
    let mut bitmap = Bitmap::new(WIDTH, HEIGHT, RasterLayout::Rgb24);
    for y in 0..HEIGHT {
        let row = bitmap.row_mut(y);
        for (x, pixel) in row.chunks_exact_mut(3).take(WIDTH as usize).enumerate() {
            pixel[0] = (x as u32 + n * 4) as u8;
            pixel[1] = (y + n * 2) as u8;
            pixel[2] = (n * 3) as u8;
        }
    }
    Ok(RasterFrame::new(bitmap)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frames = (0..FRAMES).map(gradient).collect::<Result<Vec<_>, _>>()?;
    let source = RawVideoSource::new(frames)?.with_frame_rate(25.0);

    let config = PipeConfig {
        connect_timeout: Some(Duration::from_secs(60)),
        ..PipeConfig::default()
    };
    let mut argument = PipeArgument::input(source).with_config(config);
    let token = CancellationToken::new();

    argument.pre(&token)?;
    eprintln!("Encoder arguments: {}", argument.text().unwrap_or_default());

    argument.during(&token).await?;
    if argument.attached() {
        eprintln!("Clip delivered");
    } else {
        eprintln!("No encoder attached within 60s");
    }
    argument.post();
    Ok(())
}
