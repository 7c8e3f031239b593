// 该文件是 Shanan-SSD 项目的一部分。
// src/task.rs - 任务驱动
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

use std::{
  sync::mpsc::Receiver,
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{
  frame::Frame,
  model::InferenceEngine,
  output::Render,
  pipeline::{FramePipeline, FrameResult, PipelineError},
};

pub trait Task<I, E, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: FramePipeline<E>, output: O) -> Result<(), Self::Error>;
}

// 输出需要原始帧时只做检测，否则在帧上原地绘制
fn run_pipeline<E: InferenceEngine, O: Render>(
  pipeline: &mut FramePipeline<E>,
  output: &O,
  frame: &mut Frame,
) -> Result<FrameResult, PipelineError> {
  if output.needs_raw_frame() {
    pipeline.detect(frame)
  } else {
    pipeline
      .process_with_result(frame)
      .map(|(_, result)| result)
  }
}

pub struct OneShotTask;

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  E: InferenceEngine,
  O: Render<Error = RE>,
> Task<I, E, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut pipeline: FramePipeline<E>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = run_pipeline(&mut pipeline, &output, &mut frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 个物体，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 使用外部的停止信号代替 Ctrl-C 处理器
  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn install_ctrlc() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  E: InferenceEngine,
  O: Render<Error = RE>,
> Task<I, E, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut pipeline: FramePipeline<E>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = match self.interrupt {
      Some(rx) => rx,
      None => Self::install_ctrlc()?,
    };

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for mut frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      match run_pipeline(&mut pipeline, &output, &mut frame) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &result)?;
          let elapsed_b = now.elapsed();
          info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        Err(e) if e.passes_frame_through() => {
          warn!("第 {} 帧处理失败，原样输出: {}", frame_index, e);
          output.render_result(&frame, &FrameResult::default())?;
        }
        Err(e) => warn!("第 {} 帧处理失败，已丢弃: {}", frame_index, e),
      }
      now = Instant::now();

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ReplayEngine;
  use image::{Rgb, RgbImage};
  use std::cell::RefCell;

  const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

  #[derive(Default)]
  struct Collect {
    raw: bool,
    seen: RefCell<Vec<usize>>,
    green: RefCell<Vec<bool>>,
  }

  impl Render for &Collect {
    type Error = std::convert::Infallible;

    fn needs_raw_frame(&self) -> bool {
      self.raw
    }

    fn render_result(&self, frame: &Frame, result: &FrameResult) -> Result<(), Self::Error> {
      self.seen.borrow_mut().push(result.len());
      let green = frame.to_rgb().pixels().any(|p| *p == GREEN);
      self.green.borrow_mut().push(green);
      Ok(())
    }
  }

  fn frames(n: usize) -> impl Iterator<Item = Frame> {
    (0..n).map(|_| Frame::from(RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]))))
  }

  #[test]
  fn continuous_passes_failed_frames_through() {
    let engine = ReplayEngine::from_frames(vec![
      vec![0.0, 15.0, 0.9, 0.1, 0.1, 0.5, 0.5],
      vec![0.0, 15.0, 0.9, 0.1],
      vec![0.0, 99.0, 0.9, 0.1, 0.1, 0.5, 0.5],
    ]);
    let output = Collect::default();
    let (_tx, rx) = std::sync::mpsc::channel();

    ContinuousTask::default()
      .with_interrupt(rx)
      .run_task(frames(4), FramePipeline::new(engine), &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![1, 0, 0, 0]);
    assert_eq!(*output.green.borrow(), vec![true, false, false, false]);
  }

  #[test]
  fn raw_frame_outputs_get_undrawn_frames() {
    let engine = ReplayEngine::from_frames(vec![vec![0.0, 15.0, 0.9, 0.1, 0.1, 0.5, 0.5]]);
    let output = Collect {
      raw: true,
      ..Collect::default()
    };

    OneShotTask
      .run_task(frames(1), FramePipeline::new(engine), &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![1]);
    assert_eq!(*output.green.borrow(), vec![false]);
  }

  #[test]
  fn one_shot_draws_in_place() {
    let engine = ReplayEngine::from_frames(vec![vec![0.0, 15.0, 0.9, 0.1, 0.1, 0.5, 0.5]]);
    let output = Collect::default();

    OneShotTask
      .run_task(frames(1), FramePipeline::new(engine), &output)
      .unwrap();
    assert_eq!(*output.green.borrow(), vec![true]);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let engine = ReplayEngine::from_frames(vec![Vec::<f32>::new()]).with_looping(true);
    let output = Collect::default();
    let (_tx, rx) = std::sync::mpsc::channel();

    ContinuousTask::default()
      .with_frame_number(Some(2))
      .with_interrupt(rx)
      .run_task(frames(5), FramePipeline::new(engine), &output)
      .unwrap();
    assert_eq!(output.seen.borrow().len(), 2);
  }

  #[test]
  fn continuous_stops_on_interrupt() {
    let engine = ReplayEngine::from_frames(vec![Vec::<f32>::new()]).with_looping(true);
    let output = Collect::default();
    let (tx, rx) = std::sync::mpsc::channel();
    tx.send(()).unwrap();

    ContinuousTask::default()
      .with_interrupt(rx)
      .run_task(frames(5), FramePipeline::new(engine), &output)
      .unwrap();
    assert_eq!(output.seen.borrow().len(), 1);
  }

  #[test]
  fn one_shot_requires_a_frame() {
    let engine = ReplayEngine::from_frames(vec![Vec::<f32>::new()]);
    let output = Collect::default();
    let err = OneShotTask
      .run_task(frames(0), FramePipeline::new(engine), &output)
      .unwrap_err();
    assert_eq!(err.to_string(), "没有输入帧");
  }
}
