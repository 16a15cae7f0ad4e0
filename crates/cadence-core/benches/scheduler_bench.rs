//! Criterion benchmarks for the scheduler (`cadence-core::scheduler`).
//!
//! Measures engine overhead independently of analysis cost using a trivial
//! `Peak` analyzer. Three axes:
//!
//! - **Compile**: validation and Kahn sort for wide fan-outs
//! - **Run**: one second of audio through N branches, sequential vs parallel
//! - **Reblock**: per-edge re-slicing at varying consumer block sizes
//!
//! Run with: `cargo bench -p cadence-core -- scheduler/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use cadence_core::{
    DecodeError, Decoder, Emitter, ExecutionMode, FinalizeReason, Frame, NegotiationError,
    PipelineGraph, Processor, ProcessorError, Reblocker, ResultValue, Role, RunContext, Scheduler,
    SetupParams, SourceInfo, StreamFormat,
};

const FORMAT: StreamFormat = StreamFormat::mono(48000);
const NATIVE_BLOCK: usize = 4096;
const BRANCH_COUNTS: &[usize] = &[1, 4, 16];
const BLOCK_SIZES: &[usize] = &[64, 256, 1024, 4096];

// ---------------------------------------------------------------------------
// Trivial source and analyzer to isolate scheduling overhead
// ---------------------------------------------------------------------------

/// Decoder producing `total` frames of a constant signal.
struct Constant {
    total: u64,
    pos: u64,
}

impl Constant {
    fn seconds(secs: u64) -> Self {
        Self {
            total: secs * u64::from(FORMAT.sample_rate),
            pos: 0,
        }
    }
}

impl Decoder for Constant {
    fn open(&mut self) -> Result<SourceInfo, DecodeError> {
        Ok(SourceInfo {
            format: FORMAT,
            total_frames: Some(self.total),
            block_size: NATIVE_BLOCK,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.pos >= self.total {
            return Ok(None);
        }
        let len = (self.total - self.pos).min(NATIVE_BLOCK as u64) as usize;
        let is_last = self.pos + len as u64 == self.total;
        let frame = Frame::new(vec![0.25; len], FORMAT, self.pos, len, is_last)?;
        self.pos += len as u64;
        Ok(Some(frame))
    }
}

/// Analyzer emitting the absolute peak of each block.
struct Peak(Option<usize>);

impl Processor for Peak {
    fn kind(&self) -> &'static str {
        "peak"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        self.0
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        let peak = frame.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        out.emit(ResultValue::Scalar(f64::from(peak)));
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, _out: &mut Emitter) -> Result<(), ProcessorError> {
        Ok(())
    }
}

fn make_fan_out(branches: usize, block: Option<usize>) -> PipelineGraph {
    let mut graph = PipelineGraph::new();
    graph.add_source(Box::new(Constant::seconds(1))).unwrap();
    for i in 0..branches {
        graph
            .add_branch(format!("peak{i}"), Box::new(Peak(block)))
            .unwrap();
    }
    graph
}

// ---------------------------------------------------------------------------
// Compile benchmarks
// ---------------------------------------------------------------------------

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/compile");

    for &branches in &[4usize, 64] {
        group.bench_with_input(
            BenchmarkId::new("fan_out", branches),
            &branches,
            |b, &branches| {
                let graph = make_fan_out(branches, Some(1024));
                b.iter(|| black_box(graph.compile().unwrap()));
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Run benchmarks
// ---------------------------------------------------------------------------

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/run");

    for &branches in BRANCH_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("sequential", branches),
            &branches,
            |b, &branches| {
                b.iter(|| {
                    let scheduler = Scheduler::new(RunContext::new("bench"));
                    black_box(scheduler.run(make_fan_out(branches, Some(1024))).unwrap());
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("parallel", branches),
            &branches,
            |b, &branches| {
                b.iter(|| {
                    let ctx = RunContext::new("bench").with_mode(ExecutionMode::parallel(8));
                    black_box(Scheduler::new(ctx).run(make_fan_out(branches, Some(1024))).unwrap());
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Reblock benchmarks
// ---------------------------------------------------------------------------

fn bench_reblock(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/reblock");
    let input: Vec<Frame> = (0..12)
        .map(|i| {
            Frame::new(
                vec![0.5; NATIVE_BLOCK],
                FORMAT,
                (i * NATIVE_BLOCK) as u64,
                NATIVE_BLOCK,
                i == 11,
            )
            .unwrap()
        })
        .collect();

    for &block in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &block| {
            b.iter(|| {
                let mut reblocker = Reblocker::new(block);
                let mut count = 0;
                for frame in &input {
                    count += reblocker.push(frame).unwrap().len();
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_run, bench_reblock);
criterion_main!(benches);
