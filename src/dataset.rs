use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use log::warn;

use crate::bbox::Rect;
use crate::image::Image;

/// Frame sequence described by `data.jsonl`. Every line holds a `time` and
/// either a `frame` image path relative to the folder or a `groundTruth`
/// box `[x, y, w, h]` for the frames that follow.
pub struct Dataset {
    folder: PathBuf,
    reader: BufReader<File>,
    line: String,
    ground_truth: Option<Rect>,
    /// Number of frame lines in the index
    pub length: u64,
}

pub struct InputFrame {
    pub time: f64,
    pub image: Image,
    /// Latest annotation seen before this frame
    pub ground_truth: Option<Rect>,
}

impl Dataset {
    pub fn new(path: &Path) -> Result<Dataset> {
        let index = path.join("data.jsonl");
        let file = File::open(&index).with_context(|| format!("cannot open {}", index.display()))?;
        let length = BufReader::new(file)
            .lines()
            .filter(|line| line.as_ref().map_or(false, |l| l.contains("\"frame\"")))
            .count() as u64;
        let file = File::open(&index)?;
        Ok(Dataset {
            folder: path.to_path_buf(),
            reader: BufReader::new(file),
            line: String::new(),
            ground_truth: None,
            length,
        })
    }

    pub fn next(&mut self) -> Result<Option<InputFrame>> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return Ok(None),
                Err(err) => bail!("Failed to read line {}", err),
                _ => {}
            }
            if self.line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = serde_json::from_str(&self.line)
                .with_context(|| format!("JSON deserialization failed for line: {}", self.line))?;
            let value = value.as_object().ok_or(anyhow!("JSON line is not a map"))?;

            if let Some(truth) = value.get("groundTruth") {
                self.ground_truth = Some(parse_rect(truth)?);
            } else if let Some(frame) = value.get("frame") {
                let time = value
                    .get("time")
                    .and_then(|t| t.as_f64())
                    .ok_or(anyhow!("Time is not a number"))?;
                let relative = frame.as_str().ok_or(anyhow!("Frame path is not a string"))?;
                let image = load_gray(&self.folder.join(relative))?;
                return Ok(Some(InputFrame {
                    time,
                    image,
                    ground_truth: self.ground_truth,
                }));
            } else {
                warn!("Unrecognised data format {}", self.line.trim_end());
            }
        }
    }
}

fn parse_rect(value: &serde_json::Value) -> Result<Rect> {
    let v = value
        .as_array()
        .ok_or(anyhow!("Ground truth is not an array"))?
        .iter()
        .map(|x| x.as_f64().ok_or(anyhow!("Ground truth value is not a number")))
        .collect::<Result<Vec<f64>>>()?;
    if v.len() != 4 {
        bail!("Ground truth needs 4 values, got {}", v.len());
    }
    Ok(Rect::new(
        v[0].round() as i32,
        v[1].round() as i32,
        v[2].round() as i32,
        v[3].round() as i32,
    ))
}

/// Decode any supported image file into an 8-bit gray image
pub fn load_gray(path: &Path) -> Result<Image> {
    let gray = ::image::open(path)
        .with_context(|| format!("cannot decode {}", path.display()))?
        .to_luma8();
    let (width, height) = gray.dimensions();
    Ok(Image::from_gray(width as usize, height as usize, gray.into_raw()))
}
