// 该文件是 Shanan-SSD 项目的一部分。
// tests/outputs.rs - 输入输出端测试
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

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use shanan_ssd::{
  FromUrl,
  frame::Frame,
  input::InputWrapper,
  model::ReplayEngine,
  output::{OutputWrapper, Render},
  pipeline::{FramePipeline, FrameResult},
  task::{OneShotTask, Task},
};
use url::Url;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const GRAY: Rgb<u8> = Rgb([40, 40, 40]);

fn gray_frame() -> Frame {
  Frame::from(RgbImage::from_pixel(640, 480, GRAY))
}

fn person_pipeline() -> FramePipeline<ReplayEngine> {
  FramePipeline::new(ReplayEngine::from_frames(vec![vec![
    0.0, 15.0, 0.9, 0.1, 0.1, 0.5, 0.5,
  ]]))
}

/// 已原地标注的帧及其结果
fn annotated_person() -> (Frame, FrameResult) {
  let mut frame = gray_frame();
  let (_, result) = person_pipeline().process_with_result(&mut frame).unwrap();
  (frame, result)
}

fn url(scheme: &str, path: &Path, query: &str) -> Url {
  Url::parse(&format!("{}://{}{}", scheme, path.display(), query)).unwrap()
}

fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
  let mut found = Vec::new();
  let mut stack = vec![root.to_path_buf()];
  while let Some(dir) = stack.pop() {
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        stack.push(path);
      } else if path.extension().is_some_and(|e| e == ext) {
        found.push(path);
      }
    }
  }
  found.sort();
  found
}

#[test]
fn image_output_saves_annotated_frame() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nested").join("out.png");
  let output = OutputWrapper::from_url(&url("image", &path, "")).unwrap();
  assert!(!output.needs_raw_frame());

  let (frame, result) = annotated_person();
  output.render_result(&frame, &result).unwrap();

  let saved = image::open(&path).unwrap().into_rgb8();
  assert_eq!(saved.dimensions(), (640, 480));
  assert_eq!(*saved.get_pixel(64, 200), GREEN);
  assert_eq!(*saved.get_pixel(200, 200), GRAY);
}

#[test]
fn folder_output_draws_only_frames_with_detections() {
  let dir = tempfile::tempdir().unwrap();
  let output = OutputWrapper::from_url(&url("folder", dir.path(), "")).unwrap();
  assert!(!output.needs_raw_frame());

  output.render_result(&gray_frame(), &FrameResult::default()).unwrap();
  assert!(files_with_extension(dir.path(), "png").is_empty());

  let (frame, result) = annotated_person();
  output.render_result(&frame, &result).unwrap();
  let pngs = files_with_extension(dir.path(), "png");
  assert_eq!(pngs.len(), 1);
  let saved = image::open(&pngs[0]).unwrap().into_rgb8();
  assert_eq!(*saved.get_pixel(320, 200), GREEN);
  assert!(files_with_extension(dir.path(), "txt").is_empty());
}

#[test]
fn folder_record_keeps_raw_frame_and_writes_detections() {
  let dir = tempfile::tempdir().unwrap();
  let output = OutputWrapper::from_url(&url("folder", dir.path(), "?record=name&always")).unwrap();
  assert!(output.needs_raw_frame());

  let frame = gray_frame();
  let result = person_pipeline().detect(&frame).unwrap();
  assert_eq!(result.decoded(), 1);
  output.render_result(&frame, &result).unwrap();
  output.render_result(&gray_frame(), &FrameResult::default()).unwrap();

  let pngs = files_with_extension(dir.path(), "png");
  assert_eq!(pngs.len(), 2);
  for png in &pngs {
    let saved = image::open(png).unwrap().into_rgb8();
    assert_eq!(*saved.get_pixel(64, 200), GRAY);
  }

  let records: Vec<String> = files_with_extension(dir.path(), "txt")
    .iter()
    .map(|p| std::fs::read_to_string(p).unwrap())
    .collect();
  assert_eq!(records.len(), 2);
  assert!(records.contains(&"person, 0.9000, 0.1000, 0.1000, 0.5000, 0.5000".to_string()));
  assert!(records.contains(&String::new()));
}

#[test]
fn unknown_schemes_are_rejected() {
  let bad = Url::parse("rtsp://camera/stream").unwrap();
  assert!(OutputWrapper::from_url(&bad).is_err());
  assert!(InputWrapper::from_url(&bad).is_err());
}

#[test]
fn one_shot_runs_image_through_replay_to_file() {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("in.png");
  RgbImage::from_pixel(640, 480, GRAY).save(&input_path).unwrap();
  let replay_path = dir.path().join("replay.json");
  std::fs::write(&replay_path, r#"{"frames": [[0, 15, 0.9, 0.1, 0.1, 0.5, 0.5]]}"#).unwrap();
  let output_path = dir.path().join("out.png");

  let input = InputWrapper::from_url(&url("image", &input_path, "")).unwrap();
  let engine = ReplayEngine::from_url(&url("replay", &replay_path, "")).unwrap();
  let output = OutputWrapper::from_url(&url("image", &output_path, "")).unwrap();

  OneShotTask
    .run_task(input, FramePipeline::new(engine), output)
    .unwrap();

  let saved = image::open(&output_path).unwrap().into_rgb8();
  assert_eq!(saved.dimensions(), (640, 480));
  assert_eq!(*saved.get_pixel(200, 240), GREEN);
}
