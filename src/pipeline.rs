// 该文件是 Shanan-SSD 项目的一部分。
// src/pipeline.rs - 单帧检测与标注流水线
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

use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  label::{LabelTable, UnknownClassError},
  model::{
    Detection, FrameTensorBuilder, InferenceEngine, MalformedOutputError,
    SSD_CONFIDENCE_THRESHOLD, TensorConfig, TensorError, decode,
  },
  output::{
    draw::AnnotationRenderer,
    mapper::{BoxPolicy, PixelBox, to_pixel_box},
  },
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("预处理失败: {0}")]
  Preprocess(#[from] TensorError),
  #[error("推理引擎错误: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("{0}")]
  MalformedOutput(#[from] MalformedOutputError),
  #[error("{0}")]
  UnknownClass(#[from] UnknownClassError),
}

impl PipelineError {
  /// 预处理失败的帧应被丢弃，其余错误的帧原样透传
  pub fn passes_frame_through(&self) -> bool {
    !matches!(self, PipelineError::Preprocess(_))
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
  pub tensor: TensorConfig,
  pub confidence_threshold: f32,
  pub box_policy: BoxPolicy,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      tensor: TensorConfig::default(),
      confidence_threshold: SSD_CONFIDENCE_THRESHOLD,
      box_policy: BoxPolicy::default(),
    }
  }
}

impl PipelineConfig {
  pub fn with_confidence(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_box_policy(mut self, policy: BoxPolicy) -> Self {
    self.box_policy = policy;
    self
  }
}

/// 一个待绘制的检测：原始检测、像素框和已解析的类别名
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  pub detection: Detection,
  pub pixel_box: PixelBox,
  pub label: &'static str,
}

/// 一帧的检测结果：待绘制的检测以及解码、跳过的计数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameResult {
  annotations: Vec<Annotation>,
  decoded: usize,
  skipped: usize,
}

impl FrameResult {
  pub fn annotations(&self) -> &[Annotation] {
    &self.annotations
  }

  /// 置信度高于阈值的检测数，等于绘制数加跳过数
  pub fn decoded(&self) -> usize {
    self.decoded
  }

  /// 被边框策略跳过的检测数
  pub fn skipped(&self) -> usize {
    self.skipped
  }

  pub fn len(&self) -> usize {
    self.annotations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.annotations.is_empty()
  }
}

/// 预处理 -> 推理 -> 解码 -> 坐标映射 -> 绘制。
///
/// 每帧独立，除标签表和推理引擎句柄外不保存跨帧状态。
pub struct FramePipeline<E> {
  engine: E,
  builder: FrameTensorBuilder,
  config: PipelineConfig,
  renderer: AnnotationRenderer,
}

impl<E: InferenceEngine> FramePipeline<E> {
  pub fn new(engine: E) -> Self {
    Self::with_config(engine, PipelineConfig::default())
  }

  pub fn with_config(engine: E, config: PipelineConfig) -> Self {
    let builder = FrameTensorBuilder::new(config.tensor).with_layout(engine.input_layout());
    debug!(
      "创建流水线: 输入 {}x{} {:?}, 阈值 {}, 边框策略 {:?}",
      config.tensor.target_width,
      config.tensor.target_height,
      builder.layout(),
      config.confidence_threshold,
      config.box_policy
    );
    Self {
      engine,
      builder,
      config,
      renderer: AnnotationRenderer::new(LabelTable::voc()),
    }
  }

  pub fn renderer(&self) -> &AnnotationRenderer {
    &self.renderer
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// 运行检测但不绘制。类别在这里全部解析，任何越界都会让整帧失败。
  pub fn detect(&mut self, frame: &Frame) -> Result<FrameResult, PipelineError> {
    let tensor = self.builder.build(frame)?;

    self
      .engine
      .set_input(tensor)
      .map_err(|e| PipelineError::Engine(Box::new(e)))?;
    let raw = self
      .engine
      .forward()
      .map_err(|e| PipelineError::Engine(Box::new(e)))?;

    let (width, height) = frame.dimensions();
    let labels = self.renderer.labels();
    let mut result = FrameResult::default();
    for detection in decode(raw, self.config.confidence_threshold)? {
      result.decoded += 1;
      let label = labels.get(detection.class_id)?;
      let mapped = to_pixel_box(&detection.bbox, width, height);
      match self.config.box_policy.apply(mapped, width, height) {
        Some(pixel_box) => result.annotations.push(Annotation {
          detection,
          pixel_box,
          label,
        }),
        None => result.skipped += 1,
      }
    }

    debug!(
      "解码 {} 个物体, 绘制 {} 个, 跳过 {} 个",
      result.decoded,
      result.annotations.len(),
      result.skipped
    );
    Ok(result)
  }

  /// 处理一帧并在原地绘制标注，返回同一帧。
  ///
  /// 类别在绘制前全部解析，出错时帧保持不变。
  pub fn process<'f>(&mut self, frame: &'f mut Frame) -> Result<&'f mut Frame, PipelineError> {
    self.process_with_result(frame).map(|(frame, _)| frame)
  }

  pub fn process_with_result<'f>(
    &mut self,
    frame: &'f mut Frame,
  ) -> Result<(&'f mut Frame, FrameResult), PipelineError> {
    let result = self.detect(frame)?;
    self.renderer.annotate(frame, &result)?;
    Ok((frame, result))
  }
}
