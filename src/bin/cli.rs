//! Binary entry point for the gstream command line.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/programs.rs"]
mod programs;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use graphstream::engine::{
    CounterMetrics, DeliveryOrder, EngineOptions, FileChannel, MetricsSnapshot, PendingOrder,
    RunSummary, SchedulePolicy, VertexIndexReader, VertexProgram, Worker,
};
use graphstream::primitives::io::StdFileIo;
use graphstream::storage::{EdgeListGraph, GraphHeader, GraphWriter, VertexIndex};
use graphstream::types::FileId;
use graphstream::VertexId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gstream",
    version,
    about = "Run vertex programs over graph images on storage",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for reports"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "GSTREAM_LOG",
        help = "Log filter (overrides RUST_LOG), e.g. graphstream=debug"
    )]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Write a random graph image")]
    Generate(GenerateCmd),

    #[command(about = "Print the header and degree statistics of a graph image")]
    Inspect {
        #[arg(value_name = "GRAPH")]
        path: PathBuf,
    },

    #[command(about = "Run a bundled vertex program over every vertex")]
    Run(RunCmd),
}

#[derive(Args, Debug)]
struct GenerateCmd {
    #[arg(value_name = "GRAPH")]
    path: PathBuf,

    #[arg(long, default_value_t = 1000, help = "Number of vertices")]
    vertices: u32,

    #[arg(long, default_value_t = 5000, help = "Number of edges")]
    edges: usize,

    #[arg(long, help = "Store in-edges and out-edges separately")]
    directed: bool,

    #[arg(long, default_value_t = 0x5eed, help = "Random seed")]
    seed: u64,
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(value_name = "GRAPH")]
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = ProgramArg::Degree, help = "Vertex program")]
    program: ProgramArg,

    #[arg(long, value_name = "FILE", help = "Engine options (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 10, help = "Number of top vertices to report")]
    top: usize,

    #[command(flatten)]
    overrides: OptionOverrides,
}

#[derive(Args, Debug)]
struct OptionOverrides {
    #[arg(long, help = "Override io_depth")]
    io_depth: Option<usize>,

    #[arg(long, help = "Override pull_batch")]
    pull_batch: Option<usize>,

    #[arg(long, help = "Override max_active_vertices")]
    max_active: Option<usize>,

    #[arg(long, help = "Override gc_interval")]
    gc_interval: Option<u32>,

    #[arg(long, value_enum, help = "Override pending_order")]
    pending_order: Option<PendingOrderArg>,

    #[arg(long, value_enum, help = "Override schedule_policy")]
    schedule_policy: Option<SchedulePolicyArg>,

    #[arg(long, value_enum, help = "Override delivery_order")]
    delivery_order: Option<DeliveryOrderArg>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ProgramArg {
    Degree,
    NeighborDegree,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PendingOrderArg {
    AscendingOffset,
    Fifo,
}

impl From<PendingOrderArg> for PendingOrder {
    fn from(order: PendingOrderArg) -> Self {
        match order {
            PendingOrderArg::AscendingOffset => PendingOrder::AscendingOffset,
            PendingOrderArg::Fifo => PendingOrder::Fifo,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SchedulePolicyArg {
    RoundRobin,
    FifoDrain,
}

impl From<SchedulePolicyArg> for SchedulePolicy {
    fn from(policy: SchedulePolicyArg) -> Self {
        match policy {
            SchedulePolicyArg::RoundRobin => SchedulePolicy::RoundRobin,
            SchedulePolicyArg::FifoDrain => SchedulePolicy::FifoDrain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum DeliveryOrderArg {
    Fifo,
    Reverse,
}

impl From<DeliveryOrderArg> for DeliveryOrder {
    fn from(order: DeliveryOrderArg) -> Self {
        match order {
            DeliveryOrderArg::Fifo => DeliveryOrder::Fifo,
            DeliveryOrderArg::Reverse => DeliveryOrder::Reverse,
        }
    }
}

#[derive(Serialize)]
struct GenerateReport {
    path: PathBuf,
    directed: bool,
    vertices: u32,
    edges: u64,
    bytes: u64,
}

#[derive(Serialize)]
struct InspectReport {
    path: PathBuf,
    directed: bool,
    vertices: u32,
    edges: u64,
    in_part_end: u64,
    data_end: u64,
    max_degree: u64,
    mean_degree: f64,
}

#[derive(Serialize)]
struct RunReport {
    program: &'static str,
    config: Option<PathBuf>,
    options: EngineOptions,
    elapsed_ms: u128,
    summary: RunSummary,
    metrics: MetricsSnapshot,
    top: Vec<(u32, u64)>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Generate(cmd) => {
            let report = cmd_generate(&cmd)?;
            emit(cli.format, &report, || {
                println!(
                    "wrote {} ({} vertices, {} edges, {}, {} bytes)",
                    report.path.display(),
                    report.vertices,
                    report.edges,
                    if report.directed { "directed" } else { "undirected" },
                    report.bytes
                );
            })?;
        }
        Command::Inspect { path } => {
            let report = cmd_inspect(path)?;
            emit(cli.format, &report, || print_inspect_text(&report))?;
        }
        Command::Run(cmd) => {
            let report = cmd_run(&cmd)?;
            emit(cli.format, &report, || print_run_text(&report))?;
        }
    }
    Ok(())
}

fn cmd_generate(cmd: &GenerateCmd) -> Result<GenerateReport, Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(cmd.seed);
    let graph = EdgeListGraph::random(cmd.vertices, cmd.edges, cmd.directed, &mut rng);
    let io = StdFileIo::create(&cmd.path)?;
    let (header, _) = GraphWriter::write(&io, &graph)?;
    Ok(GenerateReport {
        path: cmd.path.clone(),
        directed: header.directed,
        vertices: header.num_vertices,
        edges: header.num_edges,
        bytes: header.data_end,
    })
}

fn open_graph(path: &Path) -> Result<(StdFileIo, GraphHeader, VertexIndex), Box<dyn Error>> {
    let io = StdFileIo::open_read(path)?;
    let header = GraphHeader::read_from(&io)?;
    let index = VertexIndex::scan(&io, &header)?;
    Ok((io, header, index))
}

fn cmd_inspect(path: PathBuf) -> Result<InspectReport, Box<dyn Error>> {
    let (_, header, index) = open_graph(&path)?;
    let degree = |v: u32| -> u64 {
        let id = VertexId(v);
        let size = |info: Option<graphstream::storage::VertexInfo>| {
            info.map_or(0, |i| u64::from(graphstream::storage::layout::num_edges(i.size)))
        };
        if header.directed {
            size(index.in_half(id)) + size(index.out_half(id))
        } else {
            size(index.vertex(id))
        }
    };
    let degrees: Vec<u64> = (0..header.num_vertices).map(degree).collect();
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let mean_degree = if degrees.is_empty() {
        0.0
    } else {
        degrees.iter().sum::<u64>() as f64 / degrees.len() as f64
    };
    Ok(InspectReport {
        path,
        directed: header.directed,
        vertices: header.num_vertices,
        edges: header.num_edges,
        in_part_end: header.in_part_end,
        data_end: header.data_end,
        max_degree,
        mean_degree,
    })
}

fn build_options(cmd: &RunCmd) -> Result<(EngineOptions, Option<PathBuf>), Box<dyn Error>> {
    let (mut options, source) = config::load_options(cmd.config.as_deref())?;
    let o = &cmd.overrides;
    if let Some(depth) = o.io_depth {
        options = options.io_depth(depth);
    }
    if let Some(batch) = o.pull_batch {
        options = options.pull_batch(batch);
    }
    if let Some(max) = o.max_active {
        options = options.max_active_vertices(max);
    }
    if let Some(rounds) = o.gc_interval {
        options = options.gc_interval(rounds);
    }
    if let Some(order) = o.pending_order {
        options = options.pending_order(order.into());
    }
    if let Some(policy) = o.schedule_policy {
        options = options.schedule_policy(policy.into());
    }
    if let Some(order) = o.delivery_order {
        options = options.delivery_order(order.into());
    }
    options.validate()?;
    Ok((options, source))
}

fn cmd_run(cmd: &RunCmd) -> Result<RunReport, Box<dyn Error>> {
    let (options, config) = build_options(cmd)?;
    let (io, header, index) = open_graph(&cmd.path)?;
    let vertices = header.num_vertices;
    let channel = FileChannel::new(io, FileId(0), options.io_depth, options.delivery_order);
    let reader = VertexIndexReader::new(Arc::new(index));
    let metrics = Arc::new(CounterMetrics::default());

    let started = Instant::now();
    let (name, summary, values) = match cmd.program {
        ProgramArg::Degree => {
            let (summary, program) = drive(
                header,
                channel,
                reader,
                programs::Degree::default(),
                options.clone(),
                metrics.clone(),
                vertices,
            )?;
            ("degree", summary, program.values)
        }
        ProgramArg::NeighborDegree => {
            let (summary, program) = drive(
                header,
                channel,
                reader,
                programs::NeighborDegree::default(),
                options.clone(),
                metrics.clone(),
                vertices,
            )?;
            ("neighbor-degree", summary, program.values)
        }
    };
    let elapsed_ms = started.elapsed().as_millis();

    Ok(RunReport {
        program: name,
        config,
        options,
        elapsed_ms,
        summary,
        metrics: metrics.snapshot(),
        top: top_k(values, cmd.top),
    })
}

fn drive<P: VertexProgram>(
    header: GraphHeader,
    channel: FileChannel<StdFileIo>,
    reader: VertexIndexReader,
    program: P,
    options: EngineOptions,
    metrics: Arc<CounterMetrics>,
    vertices: u32,
) -> Result<(RunSummary, P), Box<dyn Error>> {
    let mut worker = Worker::new(header, channel, reader, program, options)?.with_metrics(metrics);
    let summary = worker.run((0..vertices).map(VertexId))?;
    Ok((summary, worker.into_program()))
}

fn top_k(values: FxHashMap<VertexId, u64>, k: usize) -> Vec<(u32, u64)> {
    let mut ranked: Vec<(u32, u64)> = values.into_iter().map(|(v, n)| (v.0, n)).collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_inspect_text(report: &InspectReport) {
    println!("Graph {}:", report.path.display());
    println!(
        "  kind={} vertices={} edges={}",
        if report.directed { "directed" } else { "undirected" },
        report.vertices,
        report.edges
    );
    println!(
        "  in_part_end={} data_end={}",
        report.in_part_end, report.data_end
    );
    println!(
        "  max_degree={} mean_degree={:.2}",
        report.max_degree, report.mean_degree
    );
}

fn print_run_text(report: &RunReport) {
    println!(
        "Ran {} over {} vertices in {} ms ({} rounds)",
        report.program, report.summary.vertices, report.elapsed_ms, report.summary.rounds
    );
    if let Some(path) = &report.config {
        println!("  config={}", path.display());
    }
    let m = &report.metrics;
    println!(
        "  invocations={} submitted={} queued={} failed={} halves_buffered={}",
        m.invocations_started,
        m.requests_submitted,
        m.requests_queued,
        m.requests_failed,
        m.halves_buffered
    );
    println!(
        "  scheduler: registered={} pulled={} reclaimed={}",
        report.summary.scheduler.registered,
        report.summary.scheduler.pulled,
        report.summary.scheduler.reclaimed
    );
    println!("Top vertices:");
    for (vertex, value) in &report.top {
        println!("  v{vertex:<10} {value}");
    }
}
