// 该文件是 Shanan-SSD 项目的一部分。
// src/bin/ssd_continuous.rs - 连续帧检测标注
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_ssd::{
  FromUrl,
  input::InputWrapper,
  model::{ReplayEngine, SSD_CONFIDENCE_THRESHOLD},
  output::{OutputWrapper, mapper::BoxPolicy},
  pipeline::{FramePipeline, PipelineConfig},
  task::{ContinuousTask, Task},
};

/// Shanan-SSD 连续帧参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎地址，例如 replay:///path/to/output.json?loop
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 置信度阈值（严格大于才保留）
  #[arg(long, value_name = "THRESHOLD", default_value_t = SSD_CONFIDENCE_THRESHOLD)]
  pub confidence: f32,
  /// 越界边框策略: unclamped, clamp, skip
  #[arg(long, value_name = "POLICY", default_value = "unclamped")]
  pub box_policy: BoxPolicy,
  /// 处理指定帧数后退出，缺省时处理到输入结束
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let engine = ReplayEngine::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let config = PipelineConfig::default()
    .with_confidence(args.confidence)
    .with_box_policy(args.box_policy);

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, FramePipeline::with_config(engine, config), output)?;

  Ok(())
}
