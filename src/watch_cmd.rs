use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use anyhow::{Context, Result, bail};

use crate::{
    cli::WatchArgs,
    io_utils::is_dash,
    progress::{
        JobRunId, ProgressHandler, ProgressMonitor, ProgressSnapshot, ReaderConnector, RunStatus,
        StreamState,
    },
};

/// Prints run progress to stdout, one line per event.
struct ConsoleReporter {
    run_id: JobRunId,
    quiet: bool,
}

impl ProgressHandler for ConsoleReporter {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        if !self.quiet {
            println!("[run {}] {snapshot}", self.run_id);
        }
    }

    fn on_complete(&mut self, snapshot: &ProgressSnapshot) {
        println!("[run {}] {snapshot}", self.run_id);
    }

    fn on_failed(&mut self, snapshot: &ProgressSnapshot) {
        println!("[run {}] {snapshot}", self.run_id);
    }
}

pub fn execute(args: &WatchArgs) -> Result<()> {
    let reader: Box<dyn BufRead> = if is_dash(&args.input) {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Opening event stream {:?}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let reporter = ConsoleReporter {
        run_id: args.run_id,
        quiet: args.quiet,
    };
    let mut monitor = ProgressMonitor::new(ReaderConnector::new(reader), reporter);
    monitor.watch(args.run_id);
    let state = monitor.run();
    monitor.disconnect();

    match state {
        StreamState::Completed => Ok(()),
        StreamState::Failed => {
            let reason = monitor
                .latest()
                .and_then(|snapshot| snapshot.message.clone())
                .unwrap_or_else(|| "no reason given".to_string());
            bail!("Job run {} failed: {reason}", args.run_id)
        }
        _ if monitor
            .latest()
            .is_some_and(|snapshot| snapshot.status == RunStatus::Cancelled) =>
        {
            bail!("Job run {} was cancelled", args.run_id)
        }
        _ => bail!(
            "Stopped following job run {}: {}",
            args.run_id,
            monitor.error().unwrap_or("stream closed")
        ),
    }
}
