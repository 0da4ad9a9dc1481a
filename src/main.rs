use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use serde::Serialize;
use tracing::{info, info_span, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use tld_rust::bbox::Rect;
use tld_rust::config::TldParams;
use tld_rust::dataset::*;
use tld_rust::tld::Tld;

#[derive(Parser)]
pub struct Args {
    #[clap(short, default_value = "./data/sequence")]
    pub input_folder: String,
    /// Initial box as x,y,w,h, defaults to the first ground truth
    #[clap(long = "box")]
    pub initial_box: Option<Rect>,
    /// JSON file with tracker parameters, replaces the command line values
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(flatten)]
    pub params: TldParams,
}

/// One output line per frame
#[derive(Serialize)]
struct FrameRecord {
    frame: usize,
    time: f64,
    rect: Rect,
    lost: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlap: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // setup logging
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stderr_writer())
                .with_filter(LevelFilter::INFO),
        )
        .with(indicatif_layer)
        .init();

    let params = match &args.config {
        Some(path) => TldParams::from_json_file(path)?,
        None => {
            args.params.validate()?;
            args.params.clone()
        }
    };

    let dataset_folder_path = Path::new(&args.input_folder);
    let mut dataset = Dataset::new(dataset_folder_path)?;

    let header_span = info_span!("header");
    header_span.pb_set_style(&ProgressStyle::default_bar());
    header_span.pb_set_length(dataset.length);
    let header_span_enter = header_span.enter();

    let first = dataset
        .next()?
        .ok_or(anyhow!("{} holds no frames", args.input_folder))?;
    let rect = args
        .initial_box
        .or(first.ground_truth)
        .ok_or(anyhow!("no --box given and no ground truth before the first frame"))?;
    let mut tld = Tld::new(&first.image.view(), rect, params)?;
    emit(0, first.time, rect, first.ground_truth)?;
    header_span.pb_inc(1);

    let mut prev = first.image;
    let mut index = 1;
    let mut lost_frames = 0;
    while let Some(frame) = dataset.next()? {
        if (frame.image.width, frame.image.height) != (prev.width, prev.height) {
            bail!(
                "frame {} is {} x {}, the sequence started at {} x {}",
                index,
                frame.image.width,
                frame.image.height,
                prev.width,
                prev.height
            );
        }

        let result = tld.track(&prev.view(), &frame.image.view());
        if result.is_empty() {
            lost_frames += 1;
            warn!("lost the target at frame {}", index);
        } else {
            tld.set_box(result);
        }
        emit(index, frame.time, result, frame.ground_truth)?;

        prev = frame.image;
        index += 1;
        header_span.pb_inc(1);
    }

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    info!("tracked {} frames, lost the target in {}", index, lost_frames);
    Ok(())
}

fn emit(frame: usize, time: f64, rect: Rect, ground_truth: Option<Rect>) -> Result<()> {
    let record = FrameRecord {
        frame,
        time,
        rect,
        lost: rect.is_empty(),
        overlap: ground_truth.map(|truth| rect.overlap(&truth)),
    };
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}
