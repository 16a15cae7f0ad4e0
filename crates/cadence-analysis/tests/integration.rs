//! Integration tests for cadence-analysis processors.
//!
//! Runs each analyzer and both graphers through a real scheduler with
//! a synthetic tone-then-silence source and checks the resulting containers.

use std::f32::consts::TAU;

use cadence_analysis::{
    ColorScheme, LevelMeter, SilenceSegmenter, SpectralCentroid, SpectrogramConfig,
    SpectrogramGrapher, WaveformConfig, WaveformGrapher,
};
use cadence_core::{
    ContainerStatus, DecodeError, Decoder, ExecutionMode, Frame, NodeStatus, PipelineGraph,
    ResultValue, RunContext, RunOutcome, Scheduler, SourceInfo, StreamFormat,
};

const SAMPLE_RATE: u32 = 16000;

/// One second of a sine tone followed by one second of silence.
struct ToneThenSilence {
    freq: f32,
    pos: u64,
    announce_length: bool,
}

impl ToneThenSilence {
    const TOTAL: u64 = 2 * SAMPLE_RATE as u64;
    const BLOCK: usize = 1000;

    fn new(freq: f32) -> Self {
        Self {
            freq,
            pos: 0,
            announce_length: true,
        }
    }
}

impl Decoder for ToneThenSilence {
    fn open(&mut self) -> Result<SourceInfo, DecodeError> {
        Ok(SourceInfo {
            format: StreamFormat::mono(SAMPLE_RATE),
            total_frames: self.announce_length.then_some(Self::TOTAL),
            block_size: Self::BLOCK,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.pos >= Self::TOTAL {
            return Ok(None);
        }
        let len = (Self::TOTAL - self.pos).min(Self::BLOCK as u64) as usize;
        let samples: Vec<f32> = (self.pos..self.pos + len as u64)
            .map(|i| {
                if i < u64::from(SAMPLE_RATE) {
                    0.5 * (TAU * self.freq * i as f32 / SAMPLE_RATE as f32).sin()
                } else {
                    0.0
                }
            })
            .collect();
        let frame = Frame::new(
            samples,
            StreamFormat::mono(SAMPLE_RATE),
            self.pos,
            len,
            self.pos + len as u64 == Self::TOTAL,
        )?;
        self.pos += len as u64;
        Ok(Some(frame))
    }
}

fn vectors(report: &cadence_core::RunReport, id: &str) -> Vec<(u64, Vec<f64>)> {
    report
        .results()
        .get(id)
        .unwrap()
        .records()
        .iter()
        .map(|r| match &r.value {
            ResultValue::Vector(v) => (r.offset, v.clone()),
            other => panic!("unexpected value {other:?}"),
        })
        .collect()
}

#[test]
fn level_meter_tracks_tone_and_silence() {
    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(ToneThenSilence::new(440.0))).unwrap();
    graph
        .add_branch("level", Box::new(LevelMeter::new(1600)))
        .unwrap();
    let report = Scheduler::new(RunContext::new("level")).run(graph).unwrap();

    let levels = vectors(&report, "level");
    assert_eq!(levels.len(), 20);
    let (_, first) = &levels[0];
    assert!((first[0] - 0.5 * std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01);
    assert!((first[1] - 0.5).abs() < 0.01);
    let (offset, last) = &levels[19];
    assert_eq!(*offset, 30_400);
    assert_eq!(last, &vec![0.0, 0.0]);

    let container = report.results().get("level").unwrap();
    assert_eq!(container.metadata().get("param.block_size").map(String::as_str), Some("1600"));
    assert_eq!(container.metadata().get("unit").map(String::as_str), Some("linear"));
}

#[test]
fn centroid_follows_tone_frequency() {
    let centroid_of = |freq: f32| {
        let mut graph = PipelineGraph::new();
        graph.add_source(Box::new(ToneThenSilence::new(freq))).unwrap();
        graph
            .add_branch("centroid", Box::new(SpectralCentroid::new(1024)))
            .unwrap();
        let report = Scheduler::new(RunContext::new("centroid")).run(graph).unwrap();
        vectors(&report, "centroid")
    };

    let low = centroid_of(500.0);
    let high = centroid_of(4000.0);
    assert_eq!(low.len(), 32);
    assert!(low[2].1[0] < high[2].1[0]);
    assert!(low[2].1[1] < high[2].1[1]);
    assert!((high[2].1[0] - 4000.0).abs() < 300.0);
    // Second half is silent.
    assert_eq!(low[31].1, vec![0.0, 0.0]);
}

#[test]
fn segmenter_finds_tone_then_silence() {
    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(ToneThenSilence::new(440.0))).unwrap();
    graph
        .add_branch("segments", Box::new(SilenceSegmenter::new(-50.0, 400)))
        .unwrap();
    let report = Scheduler::new(RunContext::new("seg")).run(graph).unwrap();

    let records = report.results().get("segments").unwrap().records().to_vec();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].offset, 0);
    assert_eq!(
        records[0].value,
        ResultValue::Segment {
            duration: 16_000,
            label: "sound".into()
        }
    );
    assert_eq!(records[1].offset, 16_000);
    assert_eq!(
        records[1].value,
        ResultValue::Segment {
            duration: 16_000,
            label: "silence".into()
        }
    );
}

#[test]
fn waveform_grapher_writes_image_alongside_analyzers() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("wave.ppm");

    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(ToneThenSilence::new(440.0))).unwrap();
    graph
        .add_branch(
            "waveform",
            Box::new(WaveformGrapher::new(WaveformConfig {
                width: 64,
                height: 33,
                fft_size: 256,
                scheme: ColorScheme::Iso,
                output: Some(image.clone()),
            })),
        )
        .unwrap();
    graph
        .add_branch("level", Box::new(LevelMeter::default()))
        .unwrap();

    let ctx = RunContext::new("wave").with_mode(ExecutionMode::parallel(2));
    let report = Scheduler::new(ctx).run(graph).unwrap();
    assert_eq!(report.outcome(), RunOutcome::Complete);

    let columns = vectors(&report, "waveform");
    assert_eq!(columns.len(), 64);
    assert_eq!(columns[1].0, 500);
    // Tone columns have peaks, silent ones are flat.
    assert!(columns[0].1[0].abs() > 0.4 || columns[0].1[1].abs() > 0.4);
    assert_eq!(&columns[63].1[..2], &[0.0, 0.0]);

    let bytes = std::fs::read(&image).unwrap();
    assert!(bytes.starts_with(b"P6\n64 33\n255\n"));
}

#[test]
fn spectrogram_shows_tone_then_goes_dark() {
    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(ToneThenSilence::new(440.0))).unwrap();
    graph
        .add_branch(
            "spectrogram",
            Box::new(SpectrogramGrapher::new(SpectrogramConfig {
                width: 32,
                height: 64,
                fft_size: 512,
                ..SpectrogramConfig::default()
            })),
        )
        .unwrap();

    let report = Scheduler::new(RunContext::new("spec")).run(graph).unwrap();
    assert_eq!(report.outcome(), RunOutcome::Complete);

    let columns = vectors(&report, "spectrogram");
    assert_eq!(columns.len(), 32);
    assert_eq!(columns[5].0, 5000);
    let loudest = columns[0]
        .1
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(row, _)| row);
    assert!(loudest.is_some_and(|row| (18..=24).contains(&row)), "got {loudest:?}");
    assert!(columns[20].1.iter().all(|&v| v == 0.0));

    let container = report.results().get("spectrogram").unwrap();
    assert_eq!(container.metadata().get("samples_per_pixel").map(String::as_str), Some("1000"));
}

#[test]
fn waveform_grapher_rejects_unknown_length() {
    let mut source = ToneThenSilence::new(440.0);
    source.announce_length = false;

    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(source)).unwrap();
    graph
        .add_branch("waveform", Box::new(WaveformGrapher::default()))
        .unwrap();
    graph
        .add_branch("level", Box::new(LevelMeter::default()))
        .unwrap();

    let report = Scheduler::new(RunContext::new("wave")).run(graph).unwrap();
    assert!(matches!(
        report.status("waveform"),
        Some(NodeStatus::NegotiationFailed { .. })
    ));
    assert!(matches!(
        report.results().get("waveform").unwrap().status(),
        ContainerStatus::Failed { .. }
    ));
    assert!(report.status("level").unwrap().is_complete());
    assert_eq!(report.outcome(), RunOutcome::Partial);
}
