use std::io::{self, Write};

use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record};

/// stderr logger for the command line tools. Errors and warnings are
/// colored, everything else gets a blue level tag.
#[derive(Clone, Copy)]
pub struct ColorLogger {
    max_level: LevelFilter,
}

impl ColorLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let max_level = if quiet {
            LevelFilter::Off
        } else if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        };
        Self { max_level }
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl log::Log for ColorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error => eprintln!(
                "{} {}",
                "[ERROR]".red().bold(),
                format!("{}", record.args()).red().bold()
            ),
            Level::Warn => eprintln!(
                "{} {}",
                "[WARN]".yellow().bold(),
                format!("{}", record.args()).yellow()
            ),
            Level::Debug | Level::Trace => eprintln!(
                "[{}] {} {}",
                record.level().to_string().blue(),
                record.target().dimmed(),
                record.args()
            ),
            Level::Info => eprintln!(
                "[{}] {}",
                record.level().to_string().blue(),
                record.args()
            ),
        }
        self.flush();
    }

    fn flush(&self) {
        // Nothing useful to do if stderr is gone
        let _ = io::stderr().flush();
    }
}
