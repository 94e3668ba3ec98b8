//! Camera capture for Mimetic.
//!
//! Wraps a V4L2 device in mmap streaming mode and converts every frame to
//! packed RGB8, the layout the landmark model consumes.

pub mod convert;

use std::time::Instant;

use thiserror::Error;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

pub use convert::{mirror_rgb, yuyv_to_rgb};

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open camera {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure camera format: {0}")]
    Format(#[source] std::io::Error),
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
    #[error("frame capture failed: {0}")]
    Capture(#[source] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// A captured frame as packed RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Result<Self, CameraError> {
        match &fourcc.repr {
            b"YUYV" => Ok(PixelFormat::Yuyv),
            b"MJPG" => Ok(PixelFormat::Mjpeg),
            other => Err(CameraError::UnsupportedFormat(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

pub struct Camera {
    stream: Stream<'static>,
    format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    /// Flip frames horizontally so the preview behaves like a mirror.
    pub mirror: bool,
}

impl Camera {
    /// Open a V4L2 device (e.g. `/dev/video0`) and start streaming.
    ///
    /// Requests 640x480 YUYV; the driver may substitute another size or
    /// MJPEG, both of which are handled.
    pub fn open(device: &str) -> Result<Self, CameraError> {
        let dev = Device::with_path(device).map_err(|source| CameraError::Open {
            device: device.to_string(),
            source,
        })?;

        let mut fmt = dev.format().map_err(CameraError::Format)?;
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;
        fmt.fourcc = FourCC::new(b"YUYV");
        let fmt = dev.set_format(&fmt).map_err(CameraError::Format)?;
        let format = PixelFormat::from_fourcc(fmt.fourcc)?;

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(CameraError::Format)?;

        tracing::debug!(
            device,
            width = fmt.width,
            height = fmt.height,
            fourcc = %fmt.fourcc,
            "camera stream started"
        );

        Ok(Self {
            stream,
            format,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
            mirror: true,
        })
    }

    /// Block until the next frame is available and return it as RGB.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self.stream.next().map_err(CameraError::Capture)?;
        let captured_at = Instant::now();
        let used = (meta.bytesused as usize).min(buf.len());
        let raw = &buf[..used];

        let mut data = match self.format {
            PixelFormat::Yuyv => yuyv_to_rgb(raw, self.width, self.height)?,
            PixelFormat::Mjpeg => {
                let img = image::load_from_memory_with_format(raw, image::ImageFormat::Jpeg)
                    .map_err(|e| CameraError::Decode(e.to_string()))?
                    .into_rgb8();
                if img.width() != self.width || img.height() != self.height {
                    return Err(CameraError::Decode(format!(
                        "jpeg is {}x{}, stream is {}x{}",
                        img.width(),
                        img.height(),
                        self.width,
                        self.height
                    )));
                }
                img.into_raw()
            }
        };

        if self.mirror {
            mirror_rgb(&mut data, self.width);
        }

        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            captured_at,
        })
    }

    /// Discard frames while the sensor's auto exposure settles.
    pub fn warm_up(&mut self, frames: usize) -> Result<(), CameraError> {
        for _ in 0..frames {
            self.stream.next().map_err(CameraError::Capture)?;
        }
        Ok(())
    }
}
