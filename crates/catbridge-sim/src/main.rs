//! Cat-Bridge headless simulator
//!
//! Loads a level, replays one scripted stroke, and runs the fixed-step loop
//! until the attempt resolves or the frame cap is hit.

use std::path::PathBuf;

use anyhow::{Context, bail};
use catbridge_core::{
    GameEvent, GameSession, LevelCatalog, Outcome, Point, RuleEvent, WorldBounds,
};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "catbridge-sim")]
#[command(about = "Replay a drawn stroke against a cat-bridge level")]
struct Args {
    /// Level id to load
    #[arg(short, long, default_value = "1")]
    level: u32,

    /// Level catalog JSON file (defaults to the built-in levels)
    #[arg(long)]
    levels: Option<PathBuf>,

    /// Stroke points as `x,y`, in drag order
    #[arg(long, num_args = 1.., value_parser = parse_point)]
    stroke: Vec<Point>,

    /// Give up after this many frames
    #[arg(long, default_value = "1800")]
    max_frames: u32,

    /// Simulate an attempt refused by the lives check
    #[arg(long)]
    deny_start: bool,
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
    Ok(Point::new(x, y))
}

fn default_stroke() -> Vec<Point> {
    vec![
        Point::new(300.0, 620.0),
        Point::new(360.0, 640.0),
        Point::new(420.0, 640.0),
    ]
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let catalog = match &args.levels {
        Some(path) => LevelCatalog::from_path(path)
            .with_context(|| format!("loading levels from {}", path.display()))?,
        None => LevelCatalog::builtin(),
    };
    if !catalog.contains(args.level) {
        warn!(level = args.level, "level not in catalog, the default level will be used");
    }

    let mut session = GameSession::new(catalog, WorldBounds::default(), args.level, !args.deny_start);
    if session.drain_events().contains(&RuleEvent::AttemptRefused) {
        println!("attempt refused: no lives left");
        return Ok(());
    }

    let stroke = if args.stroke.is_empty() {
        default_stroke()
    } else {
        args.stroke.clone()
    };
    let Some((first, rest)) = stroke.split_first() else {
        bail!("stroke needs at least one point");
    };
    session.push(GameEvent::PointerDown(*first));
    for p in rest {
        session.push(GameEvent::PointerMove(*p));
    }
    session.push(GameEvent::PointerUp);

    info!(level = session.level_id(), points = stroke.len(), "simulation started");

    for frame in 1..=args.max_frames {
        session.tick();
        for event in session.drain_events() {
            match event {
                RuleEvent::Outcome(outcome) => {
                    report(frame, &outcome);
                    return Ok(());
                }
                RuleEvent::PhaseChanged(phase) => info!(frame, ?phase, "phase changed"),
                RuleEvent::InkChanged(ink) => debug!(frame, ink, "ink changed"),
                RuleEvent::AttemptRefused => {}
            }
        }
    }

    let pos = session.engine().runner().position(session.context());
    println!(
        "no outcome after {} frames (phase {:?}, runner at {:.1},{:.1})",
        args.max_frames,
        session.engine().phase(),
        pos.x,
        pos.y
    );
    Ok(())
}

fn report(frame: u32, outcome: &Outcome) {
    match outcome {
        Outcome::Win(report) => println!(
            "WIN at frame {frame}: {} stars, efficiency {:.2} ({:.0}/{:.0} ink), {:.2}s",
            report.stars,
            report.efficiency,
            report.ink_used,
            report.ink_budget,
            report.elapsed.as_secs_f32()
        ),
        Outcome::Lose(reason) => println!("LOSE at frame {frame}: {reason:?}"),
    }
}
