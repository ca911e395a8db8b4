//! # View
//!
//! The current input frame: colour, raw depth as delivered by the sensor,
//! and canonical float depth in metres.

use compute::{Image, MemoryDevice, Placement};
use glam::UVec2;

use crate::camera::RgbdCalib;
use crate::error::Result;

/// Encoding of the depth the sensor delivered for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputImageType {
    /// Depth in metres, already in [`View::depth`].
    #[default]
    FloatDepth,
    /// Depth in millimetres in [`View::raw_depth`].
    ShortDepth,
    /// Kinect disparity in [`View::raw_depth`].
    Disparity,
}

#[derive(Debug)]
pub struct View {
    pub calib: RgbdCalib,
    pub rgb: Image<[u8; 4]>,
    /// Depth in metres. Non-positive values mark missing measurements.
    pub depth: Image<f32>,
    pub raw_depth: Image<u16>,
    pub input_image_type: InputImageType,
}

impl View {
    /// Allocates input images shared between the host and `device`.
    #[must_use]
    pub fn new(calib: RgbdCalib, rgb_dims: UVec2, depth_dims: UVec2, device: MemoryDevice) -> Self {
        let placement = Placement::shared_with(device);
        Self {
            calib,
            rgb: Image::new(rgb_dims, [0, 0, 0, 255], placement),
            depth: Image::new(depth_dims, -1.0, placement),
            raw_depth: Image::new(depth_dims, 0, placement),
            input_image_type: InputImageType::FloatDepth,
        }
    }

    /// Copies a row-major RGBA frame into the host copy.
    ///
    /// # Errors
    ///
    /// Fails if `pixels` does not match the colour resolution.
    pub fn set_rgb(&mut self, pixels: &[[u8; 4]]) -> Result<()> {
        self.rgb.copy_from_slice(MemoryDevice::Host, pixels)?;
        Ok(())
    }

    /// Copies a depth frame in metres into the host copy.
    ///
    /// # Errors
    ///
    /// Fails if `depth` does not match the depth resolution.
    pub fn set_float_depth(&mut self, depth: &[f32]) -> Result<()> {
        self.depth.copy_from_slice(MemoryDevice::Host, depth)?;
        self.input_image_type = InputImageType::FloatDepth;
        Ok(())
    }

    /// Copies a depth frame in millimetres into the host copy.
    ///
    /// # Errors
    ///
    /// Fails if `depth_mm` does not match the depth resolution.
    pub fn set_short_depth(&mut self, depth_mm: &[u16]) -> Result<()> {
        self.raw_depth.copy_from_slice(MemoryDevice::Host, depth_mm)?;
        self.input_image_type = InputImageType::ShortDepth;
        Ok(())
    }

    /// Copies a disparity frame into the host copy.
    ///
    /// # Errors
    ///
    /// Fails if `disparity` does not match the depth resolution.
    pub fn set_disparity(&mut self, disparity: &[u16]) -> Result<()> {
        self.raw_depth.copy_from_slice(MemoryDevice::Host, disparity)?;
        self.input_image_type = InputImageType::Disparity;
        Ok(())
    }

    /// Uploads the images the current frame was delivered in.
    pub fn update_device_from_host(&mut self) {
        self.rgb.update_device_from_host();
        match self.input_image_type {
            InputImageType::FloatDepth => self.depth.update_device_from_host(),
            InputImageType::ShortDepth | InputImageType::Disparity => {
                self.raw_depth.update_device_from_host();
            }
        }
    }

    #[must_use]
    pub fn rgb_dims(&self) -> UVec2 {
        self.rgb.dims()
    }

    #[must_use]
    pub fn depth_dims(&self) -> UVec2 {
        self.depth.dims()
    }
}
