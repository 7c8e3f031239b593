// 该文件是 Shanan-SSD 项目的一部分。
// src/model.rs - 模型
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

/// 归一化坐标框，各分量为帧宽高的比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl NormalizedBox {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: NormalizedBox,
}

/// 推理引擎输出的扁平检测缓冲，每 7 个值为一条记录：
/// [batch_index, class_id, confidence, x1, y1, x2, y2]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetectionBuffer {
  data: Vec<f32>,
}

impl RawDetectionBuffer {
  pub fn new(data: Vec<f32>) -> Self {
    Self { data }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data
  }
}

impl From<Vec<f32>> for RawDetectionBuffer {
  fn from(data: Vec<f32>) -> Self {
    Self::new(data)
  }
}

impl From<&[f32]> for RawDetectionBuffer {
  fn from(data: &[f32]) -> Self {
    Self::new(data.to_vec())
  }
}

mod engine;
mod replay;
mod ssd;
mod tensor;

pub use self::engine::InferenceEngine;
pub use self::replay::{ReplayEngine, ReplayEngineError};
pub use self::ssd::{
  Detections, MalformedOutputError, SSD_CONFIDENCE_THRESHOLD, SSD_RECORD_STRIDE, decode,
};
pub use self::tensor::{
  FrameTensorBuilder, SSD_INPUT_H, SSD_INPUT_W, SSD_MEAN_VALUE, SSD_SCALE_FACTOR, Tensor,
  TensorConfig, TensorError, TensorLayout,
};
