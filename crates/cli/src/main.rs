#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::Result;
use tracelens_core::{EventCategory, Notification, TraceSession};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: tracelens <trace.json>");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let mut session = TraceSession::new();
    session.subscribe(|notification| {
        if let Notification::Error(message) = notification {
            eprintln!("error: {message}");
        }
    });
    session.load(&path)?;

    report(&session);
    Ok(())
}

fn report(session: &TraceSession) {
    println!(
        "{} occurrence(s), {} event kind(s), trace duration {}",
        session.count(),
        session.descriptions().len(),
        format_time(session.trace_duration()),
    );

    for category in EventCategory::ALL {
        let kinds = session.unique_events_of_type(category);
        if kinds > 0 {
            println!("  {}: {kinds} kind(s)", category.label());
        }
    }

    if !session.descriptions().is_empty() {
        println!();
        println!(
            "{:<28} {:>7} {:>10} {:>7} {:>10} {:>10}",
            "event", "calls", "total", "%", "mean", "median"
        );
        let mut ranked: Vec<_> = session.descriptions().iter().collect();
        ranked.sort_by(|a, b| {
            b.stats
                .cumulative_duration
                .cmp(&a.stats.cumulative_duration)
        });
        for description in ranked {
            let stats = &description.stats;
            println!(
                "{:<28} {:>7} {:>10} {:>6.1}% {:>10} {:>10}",
                clip(&description.display_name, 28),
                stats.calls,
                format_time(stats.cumulative_duration),
                stats.percent_of_time,
                format_time(stats.time_per_call as i64),
                format_time(stats.median_duration),
            );
        }
    }

    if !session.call_nodes().is_empty() {
        println!();
        println!(
            "{:<28} {:>10} {:>7} {:>10} {:>7}",
            "function", "total ms", "%", "self ms", "%"
        );
        let mut ranked: Vec<_> = session.call_nodes().iter().collect();
        ranked.sort_by(|a, b| b.total_time.total_cmp(&a.total_time));
        for node in ranked {
            println!(
                "{:<28} {:>10.2} {:>6.1}% {:>10.2} {:>6.1}%",
                clip(&node.function_name, 28),
                node.total_time,
                node.total_percent,
                node.self_time,
                node.self_percent,
            );
        }
    }
}

fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((pos, _)) => &s[..pos],
        None => s,
    }
}

fn format_time(ticks: i64) -> String {
    if ticks >= 1_000_000_000 {
        format!("{:.2}s", ticks as f64 / 1_000_000_000.0)
    } else if ticks >= 1_000_000 {
        format!("{:.1}ms", ticks as f64 / 1_000_000.0)
    } else if ticks >= 1_000 {
        format!("{:.1}µs", ticks as f64 / 1_000.0)
    } else {
        format!("{ticks}ns")
    }
}
