// 该文件是 Shanan-SSD 项目的一部分。
// src/model/replay.rs - 回放录制的检测输出
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{InferenceEngine, RawDetectionBuffer, Tensor, TensorLayout},
};

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("回放文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("未知的张量布局: {0}")]
  InvalidLayout(String),
  #[error("未设置输入即执行推理")]
  MissingInput,
}

/// 回放文件格式: `{"frames": [[0, 15, 0.9, 0.1, 0.1, 0.5, 0.5], ...]}`
#[derive(Deserialize, Debug)]
struct ReplayFile {
  frames: Vec<Vec<f32>>,
}

/// 按顺序回放录制好的原始检测缓冲，每次前向推理给出一帧。
///
/// 录制用尽后返回空缓冲；带 `loop` 时从头循环。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  frames: Vec<RawDetectionBuffer>,
  cursor: usize,
  looping: bool,
  layout: TensorLayout,
  input_shape: Option<[usize; 4]>,
}

impl ReplayEngine {
  pub fn from_frames<I, F>(frames: I) -> Self
  where
    I: IntoIterator<Item = F>,
    F: Into<RawDetectionBuffer>,
  {
    Self {
      frames: frames.into_iter().map(Into::into).collect(),
      cursor: 0,
      looping: false,
      layout: TensorLayout::default(),
      input_shape: None,
    }
  }

  pub fn with_looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn with_layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  /// 最近一次 `set_input` 的张量形状
  pub fn last_input_shape(&self) -> Option<[usize; 4]> {
    self.input_shape
  }
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayEngineError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut looping = false;
    let mut layout = TensorLayout::default();
    for (k, v) in url.query_pairs() {
      match &*k {
        "loop" => looping = v != "false",
        "layout" => {
          layout = match &*v {
            "nchw" => TensorLayout::Nchw,
            "nhwc" => TensorLayout::Nhwc,
            other => return Err(ReplayEngineError::InvalidLayout(other.to_string())),
          }
        }
        _ => warn!("忽略未知参数: {}={}", k, v),
      }
    }

    info!("加载回放文件: {}", url.path());
    let content = std::fs::read_to_string(url.path())?;
    let file: ReplayFile = serde_json::from_str(&content)?;
    info!("回放文件包含 {} 帧检测输出", file.frames.len());

    Ok(
      ReplayEngine::from_frames(file.frames)
        .with_looping(looping)
        .with_layout(layout),
    )
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayEngineError;

  fn input_layout(&self) -> TensorLayout {
    self.layout
  }

  fn set_input(&mut self, tensor: Tensor) -> Result<(), Self::Error> {
    debug!("设置回放输入: {:?}", tensor.shape());
    self.input_shape = Some(tensor.shape());
    Ok(())
  }

  fn forward(&mut self) -> Result<RawDetectionBuffer, Self::Error> {
    if self.input_shape.take().is_none() {
      return Err(ReplayEngineError::MissingInput);
    }

    if self.cursor >= self.frames.len() {
      if !self.looping || self.frames.is_empty() {
        debug!("回放已结束，返回空输出");
        return Ok(RawDetectionBuffer::default());
      }
      self.cursor = 0;
    }

    let output = self.frames[self.cursor].clone();
    self.cursor += 1;
    Ok(output)
  }
}
