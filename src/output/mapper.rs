// 该文件是 Shanan-SSD 项目的一部分。
// src/output/mapper.rs - 归一化坐标到像素坐标的映射
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

use std::str::FromStr;

use thiserror::Error;

use crate::model::NormalizedBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelBox {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl PixelBox {
  pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  /// 把四条边限制在像素网格 `[0, W-1] x [0, H-1]` 内
  pub fn clamped(&self, width: u32, height: u32) -> PixelBox {
    let max_x = (width as i64 - 1).clamp(0, i32::MAX as i64) as i32;
    let max_y = (height as i64 - 1).clamp(0, i32::MAX as i64) as i32;
    PixelBox {
      left: self.left.clamp(0, max_x),
      top: self.top.clamp(0, max_y),
      right: self.right.clamp(0, max_x),
      bottom: self.bottom.clamp(0, max_y),
    }
  }

  /// 四条边都在像素网格内，即 `clamped` 不改变该框。
  /// 归一化坐标 1.0 映射到 W（或 H），落在网格外。
  pub fn is_inside(&self, width: u32, height: u32) -> bool {
    width > 0 && height > 0 && self.clamped(width, height) == *self
  }
}

/// 按帧尺寸缩放并四舍五入，不做裁剪
pub fn to_pixel_box(bbox: &NormalizedBox, width: u32, height: u32) -> PixelBox {
  PixelBox {
    left: scale(bbox.left, width),
    top: scale(bbox.top, height),
    right: scale(bbox.right, width),
    bottom: scale(bbox.bottom, height),
  }
}

// `as` 对越界与 NaN 做饱和转换
fn scale(value: f32, extent: u32) -> i32 {
  (value * extent as f32).round() as i32
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的边框策略: {0} (可选 unclamped, clamp, skip)")]
pub struct ParseBoxPolicyError(String);

/// 越界检测框的处理方式，默认不做裁剪。
///
/// `Clamp` 与 `Skip` 共用像素网格 `[0, W-1] x [0, H-1]` 作为帧边界：
/// `Skip` 保留的正好是 `Clamp` 不会改变的框。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxPolicy {
  #[default]
  Unclamped,
  Clamp,
  Skip,
}

impl BoxPolicy {
  /// 返回 None 表示该框应被跳过
  pub fn apply(self, pixel_box: PixelBox, width: u32, height: u32) -> Option<PixelBox> {
    match self {
      BoxPolicy::Unclamped => Some(pixel_box),
      BoxPolicy::Clamp => Some(pixel_box.clamped(width, height)),
      BoxPolicy::Skip => pixel_box.is_inside(width, height).then_some(pixel_box),
    }
  }
}

impl FromStr for BoxPolicy {
  type Err = ParseBoxPolicyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "unclamped" => Ok(BoxPolicy::Unclamped),
      "clamp" => Ok(BoxPolicy::Clamp),
      "skip" => Ok(BoxPolicy::Skip),
      _ => Err(ParseBoxPolicyError(s.to_string())),
    }
  }
}
