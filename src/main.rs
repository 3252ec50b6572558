//! ClassPulse CLI
//!
//! Usage:
//!   classpulse session.json                      # Colored terminal report
//!   classpulse session.json --json               # Full JSON report
//!   classpulse session.json --verbose            # Episode/timeline detail
//!   classpulse session.json --coach-report c.json
//!   classpulse session.json --cache-db cache.sqlite

use std::path::PathBuf;
use std::process;

use clap::Parser;
use colored::Colorize;
use serde_json::json;

use classpulse::core::{ComputeCache, MetricsComposer};
use classpulse::types::{CoachReport, EpisodeStatus, MetricsReport, RawUtterance};
use classpulse::{DEFAULT_WINDOW_SECS, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "classpulse",
    version = VERSION,
    about = "Classroom discourse analytics - OHCR episodes, cognitive timeline and participation metrics",
    long_about = "ClassPulse turns a labeled classroom transcript into structured\n\
                  pedagogical metrics.\n\n\
                  Input is a JSON array of utterance records as produced by the\n\
                  upstream transcription/diarization/labeling pipeline:\n  \
                  {start, end, speaker, role, text, ohcr, discourse_act,\n   \
                  confidence, iam_level}\n\n\
                  The engine segments O->H->C->R reasoning arcs, samples a\n\
                  cognitive-level timeline and reports participation balance,\n\
                  challenge resolution and aggregate quality scores."
)]
struct Args {
    /// Path to the labeled utterance list (JSON array)
    input: PathBuf,

    /// Optional coach report JSON supplying the topics list
    #[arg(long)]
    coach_report: Option<PathBuf>,

    /// Timeline window width in seconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    window: f64,

    /// SQLite file memoizing computed reports (caching disabled if omitted)
    #[arg(long)]
    cache_db: Option<PathBuf>,

    /// Output the full report as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show per-episode and timeline detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let utterances = read_utterances(&args.input);
    let coach_report = args.coach_report.as_deref().map(|path| {
        match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|text| {
            serde_json::from_str::<CoachReport>(&text).map_err(|e| e.to_string())
        }) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("error: cannot read coach report {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    });

    let cache = match &args.cache_db {
        Some(path) => match ComputeCache::open(path) {
            Ok(cache) => cache,
            Err(e) => {
                eprintln!("error: cannot open cache {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => ComputeCache::disabled(),
    };

    let composer = MetricsComposer::with_window(args.window);
    let report = compute_report(&composer, &cache, &utterances, coach_report.as_ref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        print_report(&report, args.verbose);
    }
}

/// Read and decode the utterance list, exiting with a message on failure
fn read_utterances(path: &std::path::Path) -> Vec<RawUtterance> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(utterances) => utterances,
        Err(e) => {
            eprintln!("error: {} is not a valid utterance list: {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Run the engine through the cache, keyed on the engine version, window
/// width and full input. A cached value that no longer decodes as a report
/// falls back to a fresh computation.
fn compute_report(
    composer: &MetricsComposer,
    cache: &ComputeCache,
    utterances: &[RawUtterance],
    coach_report: Option<&CoachReport>,
) -> MetricsReport {
    let payload = json!({
        "engine": "classpulse",
        "version": VERSION,
        "window_secs": composer.window_secs(),
        "utterances": utterances,
        "coach_report": coach_report,
    });

    let produce = || {
        let report = composer.compute_all(utterances, coach_report);
        let value = serde_json::to_value(&report).unwrap_or_default();
        let meta = json!({"utterance_count": utterances.len()});
        (value, meta)
    };

    match cache.get_or_compute(&payload, produce) {
        Ok((value, _meta)) => match serde_json::from_value::<MetricsReport>(value) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("cached report failed validation, recomputing: {}", e);
                composer.compute_all(utterances, coach_report)
            }
        },
        Err(e) => {
            tracing::warn!("cache unavailable, computing directly: {}", e);
            composer.compute_all(utterances, coach_report)
        }
    }
}

/// Print the human-readable report
fn print_report(report: &MetricsReport, verbose: bool) {
    println!();
    println!("{}", format!("ClassPulse v{} - Session Report", VERSION).bold());
    println!("{}", "=".repeat(48));

    println!(
        "Class time   {}   Interactions {}",
        report.class_duration_formatted.clone().cyan(),
        report.interaction_count.to_string().cyan()
    );
    println!(
        "OHCR moves   O:{} H:{} C:{} R:{}   unlabeled {}",
        report.observe_count.to_string().green(),
        report.hypothesis_count.to_string().green(),
        report.challenge_count.to_string().green(),
        report.resolution_count.to_string().green(),
        report.ohcr_counts.none
    );
    println!();

    println!("{}", "Participation".bold());
    println!(
        "  teacher {:>5.1}%  (avg turn {:.1}s, {} questions)",
        report.teacher_talk_pct * 100.0,
        report.avg_teacher_turn,
        report.teacher_question_count
    );
    println!(
        "  student {:>5.1}%  (avg turn {:.1}s, {} questions)",
        report.student_talk_pct * 100.0,
        report.avg_student_turn,
        report.student_question_count
    );
    println!();

    println!("{}", "Quality".bold());
    println!("  kcs score               {:.3}", report.kcs_score);
    println!(
        "  beneficial time         {:.1}%",
        report.beneficial_duration_pct * 100.0
    );
    println!(
        "  challenge resolve rate  {:.3}",
        report.challenge_resolve_rate
    );
    println!(
        "  resolutions per minute  {:.3}",
        report.resolution_density_per_min
    );
    println!();

    let summary = &report.discourse_analysis.summary;
    println!("{}", "Episodes".bold());
    println!(
        "  {} total ({} complete, {} partial)   avg quality {:.3}   avg coverage {:.3}",
        summary.total_acts,
        summary.complete_acts.to_string().green(),
        summary.partial_acts.to_string().yellow(),
        summary.avg_quality_score,
        summary.avg_coverage
    );

    if !report.topics.is_empty() {
        println!();
        println!("{} {}", "Topics".bold(), report.topics.join(", "));
    }

    if verbose {
        print_verbose(report);
    }
    println!();
}

/// Per-episode, general-segment, stage-context and timeline detail
fn print_verbose(report: &MetricsReport) {
    println!();
    for ep in &report.discourse_analysis.episodes {
        let status = match ep.status {
            EpisodeStatus::Complete => "complete".green(),
            EpisodeStatus::Partial => "partial".yellow(),
            EpisodeStatus::Active => "active".normal(),
        };
        let sequence: Vec<String> = ep.sequence.iter().map(|s| s.to_string()).collect();
        println!(
            "  #{:<3} {:>7.1}s-{:<7.1}s [{}] {}  quality {:.3}  flow {:.3}",
            ep.id,
            ep.start,
            ep.end,
            status,
            sequence.join(">"),
            ep.quality_score,
            ep.flow_score
        );
    }
    for seg in &report.discourse_analysis.general_segments {
        println!(
            "  gen  {:>7.1}s-{:<7.1}s {} utterances",
            seg.start, seg.end, seg.utterance_count
        );
    }

    println!();
    println!("  {}", report.observe_context.dimmed());
    println!("  {}", report.hypothesis_context.dimmed());
    println!("  {}", report.challenge_context.dimmed());
    println!("  {}", report.resolution_context.dimmed());

    if !report.timeline.is_empty() {
        println!();
        let strip: String = report
            .timeline
            .iter()
            .map(|p| char::from_digit(p.level as u32, 10).unwrap_or('?'))
            .collect();
        println!("  timeline levels: {}", strip);
    }
}
