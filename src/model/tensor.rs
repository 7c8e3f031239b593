// 该文件是 Shanan-SSD 项目的一部分。
// src/model/tensor.rs - 帧到网络输入张量的预处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Frame, RGB_CHANNELS};

// MobileNet-SSD (Caffe) 的输入归一化参数
pub const SSD_INPUT_W: u32 = 300;
pub const SSD_INPUT_H: u32 = 300;
pub const SSD_SCALE_FACTOR: f32 = 0.007843;
pub const SSD_MEAN_VALUE: f32 = 127.5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
  #[error("目标尺寸无效: {width}x{height}")]
  InvalidTarget { width: u32, height: u32 },
  #[error("输入帧为空: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
}

/// 张量内存布局，由推理后端决定，不随帧变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  #[default]
  Nchw,
  Nhwc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  layout: TensorLayout,
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 批大小恒为 1
  pub fn shape(&self) -> [usize; 4] {
    match self.layout {
      TensorLayout::Nchw => [1, RGB_CHANNELS, self.height, self.width],
      TensorLayout::Nhwc => [1, self.height, self.width, RGB_CHANNELS],
    }
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }

  /// 按 (通道, 行, 列) 读取，与布局无关
  pub fn get(&self, channel: usize, y: usize, x: usize) -> Option<f32> {
    if channel >= RGB_CHANNELS || y >= self.height || x >= self.width {
      return None;
    }
    self.data.get(self.index(channel, y, x)).copied()
  }

  fn index(&self, channel: usize, y: usize, x: usize) -> usize {
    match self.layout {
      TensorLayout::Nchw => channel * self.height * self.width + y * self.width + x,
      TensorLayout::Nhwc => (y * self.width + x) * RGB_CHANNELS + channel,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorConfig {
  pub target_width: u32,
  pub target_height: u32,
  pub scale_factor: f32,
  pub mean_value: f32,
}

impl Default for TensorConfig {
  fn default() -> Self {
    Self {
      target_width: SSD_INPUT_W,
      target_height: SSD_INPUT_H,
      scale_factor: SSD_SCALE_FACTOR,
      mean_value: SSD_MEAN_VALUE,
    }
  }
}

/// 把一帧转换为网络输入张量：去 alpha、双线性缩放、(v - mean) * scale
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTensorBuilder {
  config: TensorConfig,
  layout: TensorLayout,
}

impl FrameTensorBuilder {
  pub fn new(config: TensorConfig) -> Self {
    Self {
      config,
      layout: TensorLayout::default(),
    }
  }

  pub fn with_layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn build(&self, frame: &Frame) -> Result<Tensor, TensorError> {
    let TensorConfig {
      target_width,
      target_height,
      scale_factor,
      mean_value,
    } = self.config;

    if target_width == 0 || target_height == 0 {
      return Err(TensorError::InvalidTarget {
        width: target_width,
        height: target_height,
      });
    }
    let (frame_width, frame_height) = frame.dimensions();
    if frame_width == 0 || frame_height == 0 {
      return Err(TensorError::EmptyFrame {
        width: frame_width,
        height: frame_height,
      });
    }

    let rgb = frame.to_rgb();
    let resized = imageops::resize(&*rgb, target_width, target_height, FilterType::Triangle);

    let width = target_width as usize;
    let height = target_height as usize;
    let mut tensor = Tensor {
      layout: self.layout,
      width,
      height,
      data: vec![0f32; RGB_CHANNELS * width * height].into_boxed_slice(),
    };

    for (x, y, pixel) in resized.enumerate_pixels() {
      for (c, &value) in pixel.0.iter().enumerate() {
        let index = tensor.index(c, y as usize, x as usize);
        tensor.data[index] = (f32::from(value) - mean_value) * scale_factor;
      }
    }

    debug!(
      "预处理完成: {}x{} -> {:?} {:?}",
      frame_width,
      frame_height,
      tensor.layout,
      tensor.shape()
    );

    Ok(tensor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage, Rgba, RgbaImage};

  fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
  }

  #[test]
  fn default_config_matches_mobilenet_ssd() {
    let config = TensorConfig::default();
    assert_eq!(config.target_width, 300);
    assert_eq!(config.target_height, 300);
    assert!(close(config.scale_factor, 0.007843));
    assert!(close(config.mean_value, 127.5));
  }

  #[test]
  fn uniform_frame_is_resized_and_normalized() {
    let frame = Frame::from(RgbImage::from_pixel(640, 480, Rgb([255, 127, 0])));
    let tensor = FrameTensorBuilder::default().build(&frame).unwrap();

    assert_eq!(tensor.shape(), [1, 3, 300, 300]);
    assert_eq!(tensor.as_slice().len(), 3 * 300 * 300);

    let tolerance = SSD_SCALE_FACTOR;
    for (x, y) in [(0, 0), (150, 150), (299, 299)] {
      let r = tensor.get(0, y, x).unwrap();
      let g = tensor.get(1, y, x).unwrap();
      let b = tensor.get(2, y, x).unwrap();
      assert!((r - (255.0 - 127.5) * SSD_SCALE_FACTOR).abs() <= tolerance);
      assert!((g - (127.0 - 127.5) * SSD_SCALE_FACTOR).abs() <= tolerance);
      assert!((b - (0.0 - 127.5) * SSD_SCALE_FACTOR).abs() <= tolerance);
    }
  }

  #[test]
  fn nchw_places_channels_in_planes() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([10, 20, 30]));
    image.put_pixel(1, 0, Rgb([40, 50, 60]));
    let config = TensorConfig {
      target_width: 2,
      target_height: 1,
      scale_factor: 1.0,
      mean_value: 0.0,
    };

    let nchw = FrameTensorBuilder::new(config)
      .build(&Frame::from(image.clone()))
      .unwrap();
    assert_eq!(nchw.as_slice(), &[10.0, 40.0, 20.0, 50.0, 30.0, 60.0]);

    let nhwc = FrameTensorBuilder::new(config)
      .with_layout(TensorLayout::Nhwc)
      .build(&Frame::from(image))
      .unwrap();
    assert_eq!(nhwc.shape(), [1, 1, 2, 3]);
    assert_eq!(nhwc.as_slice(), &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
  }

  #[test]
  fn alpha_channel_is_ignored() {
    let config = TensorConfig {
      target_width: 1,
      target_height: 1,
      scale_factor: 1.0,
      mean_value: 0.0,
    };
    let frame = Frame::from(RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 0])));
    let tensor = FrameTensorBuilder::new(config).build(&frame).unwrap();
    assert_eq!(tensor.as_slice(), &[1.0, 2.0, 3.0]);
  }

  #[test]
  fn input_frame_is_not_modified() {
    let frame = Frame::from(RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])));
    let before = frame.clone();
    FrameTensorBuilder::default().build(&frame).unwrap();
    assert_eq!(frame, before);
  }

  #[test]
  fn degenerate_sizes_fail() {
    let frame = Frame::from(RgbImage::new(0, 4));
    assert_eq!(
      FrameTensorBuilder::default().build(&frame),
      Err(TensorError::EmptyFrame {
        width: 0,
        height: 4
      })
    );

    let config = TensorConfig {
      target_width: 0,
      ..TensorConfig::default()
    };
    let frame = Frame::from(RgbImage::new(4, 4));
    assert!(matches!(
      FrameTensorBuilder::new(config).build(&frame),
      Err(TensorError::InvalidTarget { .. })
    ));
  }
}
