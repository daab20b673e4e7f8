use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

mod problems;
mod utils;

use crate::problems::{Problem, ALL_PROBLEMS};
use crate::utils::{invalid_input, Settings, Solved, Summary};

fn main() -> Result<()> {
    let settings = Settings::parse();

    if settings.verbose > 0 {
        tracing_subscriber::fmt::fmt()
            .with_writer(std::io::stderr)
            .init();
        log::set_max_level(if settings.verbose > 1 {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }

    if settings.list {
        for problem in ALL_PROBLEMS {
            println!("{:<12} {}", problem.name, problem.description);
        }
        return Ok(());
    }

    let config = settings.config()?;

    let selected = if settings.all || settings.problems.is_empty() {
        ALL_PROBLEMS.iter().collect::<Vec<_>>()
    } else {
        settings
            .problems
            .iter()
            .map(|name| {
                problems::find(name).ok_or_else(|| {
                    Error::new(ErrorKind::NotFound, format!("Unknown problem {name}"))
                })
            })
            .collect::<Result<Vec<&'static Problem>>>()?
    };

    let num_threads = if let Some(jobs) = settings.jobs {
        jobs
    } else {
        num_cpus::get()
    }
    .clamp(1, selected.len().max(1));

    let spinner_style = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap();
    let spinner_style_no_progress =
        ProgressStyle::with_template("[{elapsed_precise}] {spinner} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mb = Arc::new(MultiProgress::new());
    let pb = if settings.verbose == 0 && !settings.json {
        mb.add(ProgressBar::new(selected.len() as u64))
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(spinner_style);
    pb.set_message("Finding roots");

    let pool = threadpool::ThreadPool::new(num_threads);
    let (tx, rx) = std::sync::mpsc::channel();

    for (i, &problem) in selected.iter().enumerate() {
        let tx = tx.clone();
        let config = config.clone();
        let spinner_style = spinner_style_no_progress.clone();
        let settings = settings.clone();
        let mb = mb.clone();
        pool.execute(move || {
            let pb = if settings.verbose == 0 && !settings.json {
                mb.add(ProgressBar::new_spinner())
            } else {
                ProgressBar::hidden()
            };
            pb.set_style(spinner_style);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message(problem.name);

            let mut config = config;
            if settings.max_roots_per_leaf.is_none() {
                if let Some(max_roots_per_leaf) = problem.max_roots_per_leaf {
                    config.max_roots_per_leaf = max_roots_per_leaf;
                }
            }

            let start = Instant::now();
            let result = (problem.region)().and_then(|region| {
                let function = problem.function(!settings.no_derivative);
                cxroots::find_roots(&region, &function, &config)
            });
            let solved = result.map(|roots| Solved {
                name: problem.name,
                description: problem.description,
                roots,
                elapsed: start.elapsed(),
            });
            pb.finish_and_clear();
            tx.send(solved.map(|solved| (i, solved))).unwrap();
        });
    }

    let mut solved = rx
        .into_iter()
        .take(selected.len())
        .map(|r| {
            pb.inc(1);
            r
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(invalid_input)?;
    pool.join();
    pb.finish_and_clear();

    solved.sort_by_key(|&(n, _)| n);

    let mut summary = Summary::default();
    for (_, solved) in solved {
        summary.add(solved);
    }

    if settings.json {
        println!("{}", summary.to_json()?);
    } else {
        summary.print();
    }

    Ok(())
}
