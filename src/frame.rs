// 该文件是 Shanan-SSD 项目的一部分。
// src/frame.rs - 交错通道帧定义
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

use std::borrow::Cow;

use image::{DynamicImage, Pixel, RgbImage, RgbaImage};
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;
pub const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(usize),
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 一帧交错通道图像（RGB 或 RGBA），由调用方持有，流水线只在其上叠加绘制
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
  Rgb(RgbImage),
  Rgba(RgbaImage),
}

impl Frame {
  /// 从相机给出的交错字节缓冲构造帧
  pub fn from_raw(
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = channels * width as usize * height as usize;
    if channels != RGB_CHANNELS && channels != RGBA_CHANNELS {
      return Err(FrameError::UnsupportedChannels(channels));
    }
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    let mismatch = |actual| FrameError::LengthMismatch { expected, actual };
    if channels == RGB_CHANNELS {
      let len = data.len();
      RgbImage::from_raw(width, height, data)
        .map(Frame::Rgb)
        .ok_or_else(|| mismatch(len))
    } else {
      let len = data.len();
      RgbaImage::from_raw(width, height, data)
        .map(Frame::Rgba)
        .ok_or_else(|| mismatch(len))
    }
  }

  pub fn width(&self) -> u32 {
    match self {
      Frame::Rgb(image) => image.width(),
      Frame::Rgba(image) => image.width(),
    }
  }

  pub fn height(&self) -> u32 {
    match self {
      Frame::Rgb(image) => image.height(),
      Frame::Rgba(image) => image.height(),
    }
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width(), self.height())
  }

  pub fn channels(&self) -> usize {
    match self {
      Frame::Rgb(_) => RGB_CHANNELS,
      Frame::Rgba(_) => RGBA_CHANNELS,
    }
  }

  pub fn as_raw(&self) -> &[u8] {
    match self {
      Frame::Rgb(image) => image.as_raw(),
      Frame::Rgba(image) => image.as_raw(),
    }
  }

  /// 三通道视图：RGBA 直接丢弃 alpha，不交换 R/B
  pub fn to_rgb(&self) -> Cow<'_, RgbImage> {
    match self {
      Frame::Rgb(image) => Cow::Borrowed(image),
      Frame::Rgba(image) => Cow::Owned(RgbImage::from_fn(image.width(), image.height(), |x, y| {
        image.get_pixel(x, y).to_rgb()
      })),
    }
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::Rgb(image)
  }
}

impl From<RgbaImage> for Frame {
  fn from(image: RgbaImage) -> Self {
    Frame::Rgba(image)
  }
}

/// 带 alpha 的图像保留为 RGBA，其余一律转换为 RGB
impl From<DynamicImage> for Frame {
  fn from(image: DynamicImage) -> Self {
    if image.color().has_alpha() {
      Frame::Rgba(image.into_rgba8())
    } else {
      Frame::Rgb(image.into_rgb8())
    }
  }
}
