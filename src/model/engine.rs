// 该文件是 Shanan-SSD 项目的一部分。
// src/model/engine.rs - 推理引擎边界
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

use crate::model::{RawDetectionBuffer, Tensor, TensorLayout};

/// 不透明的推理后端：先 `set_input` 再 `forward`。
///
/// 方法取 `&mut self`，同一个句柄同一时刻只会有一次前向推理。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 后端期望的输入布局，在构造流水线时读取一次
  fn input_layout(&self) -> TensorLayout {
    TensorLayout::Nchw
  }

  fn set_input(&mut self, tensor: Tensor) -> Result<(), Self::Error>;

  fn forward(&mut self) -> Result<RawDetectionBuffer, Self::Error>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
  type Error = E::Error;

  fn input_layout(&self) -> TensorLayout {
    (**self).input_layout()
  }

  fn set_input(&mut self, tensor: Tensor) -> Result<(), Self::Error> {
    (**self).set_input(tensor)
  }

  fn forward(&mut self) -> Result<RawDetectionBuffer, Self::Error> {
    (**self).forward()
  }
}
