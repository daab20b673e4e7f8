use std::io::{Error, ErrorKind, Result};
use std::time::Duration;

use clap::Parser;
use cxroots::{Config, RootSet};

#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Problems to solve, by name
    pub problems: Vec<String>,
    /// Solve every problem in the catalogue
    #[arg(short, long)]
    pub all: bool,
    /// List the catalogue and exit
    #[arg(short, long)]
    pub list: bool,
    /// Hide the derivatives and use finite differences
    #[arg(short, long)]
    pub no_derivative: bool,
    #[arg(short, long)]
    pub max_roots_per_leaf: Option<usize>,
    /// Configuration file, RON or JSON
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(long)]
    pub json: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl Settings {
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Config::from_str_any(&text).map_err(invalid_input)?
            }
            None => Config::default(),
        };
        if let Some(max_roots_per_leaf) = self.max_roots_per_leaf {
            config.max_roots_per_leaf = max_roots_per_leaf;
        }
        config.validate().map_err(invalid_input)?;
        Ok(config)
    }
}

pub fn invalid_input(err: cxroots::Error) -> Error {
    Error::new(ErrorKind::InvalidInput, err)
}

pub struct Solved {
    pub name: &'static str,
    pub description: &'static str,
    pub roots: RootSet,
    pub elapsed: Duration,
}

#[derive(Default)]
pub struct Summary {
    solved: Vec<Solved>,
}

impl Summary {
    pub fn add(&mut self, solved: Solved) {
        self.solved.push(solved);
    }

    pub fn to_json(&self) -> Result<String> {
        let reports = self
            .solved
            .iter()
            .map(|solved| {
                Ok(serde_json::json!({
                    "name": solved.name,
                    "description": solved.description,
                    "seconds": solved.elapsed.as_secs_f64(),
                    "roots": serde_json::to_value(&solved.roots)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string_pretty(&reports)?)
    }

    pub fn print(&self) {
        for solved in &self.solved {
            let diagnostics = &solved.roots.diagnostics;
            println!("{}: {}", solved.name, solved.description);
            print!("{}", solved.roots);
            println!(
                "{} roots (expected {}), {} integrations, {:.2?}{}",
                diagnostics.total,
                diagnostics
                    .expected
                    .map_or("unknown".to_owned(), |n| n.to_string()),
                diagnostics.integrations,
                solved.elapsed,
                if diagnostics.count_mismatch {
                    ", COUNT MISMATCH"
                } else {
                    ""
                }
            );
            println!();
        }
    }
}
