use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use clap::{Args, ValueEnum};
use eyre::{eyre, Context};
use log::LevelFilter;
use multilog::{
    CachedSink, ConsoleSink, Emitter, ErrorInfo, FileSink, LogBridge, RolloverPolicy, Severity,
};

use crate::{
    config::ConfigManager,
    utils::{numbered_log_file, parse_human_duration},
};

const FILE_PREFIX: &str = "simulate";

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Rollover {
    Never,
    Daily,
    Hourly,
    Lines,
}

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(long, help = "Directory for the numbered log files. Defaults to the data dir.")]
    pub dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Rollover::Lines, help = "When to move on to the next log file.")]
    pub rollover: Rollover,

    #[arg(long, default_value_t = 25, help = "Events per file with --rollover lines.")]
    pub max_lines: usize,

    #[arg(short, long, default_value_t = 3, help = "Number of worker threads to spawn.")]
    pub workers: usize,

    #[arg(short, long, default_value_t = 4, help = "Iterations logged by each worker.")]
    pub iterations: usize,

    #[arg(
        long,
        value_parser = parse_human_duration,
        default_value = "50ms",
        help = "Pause between worker iterations, e.g. 10ms or 1s."
    )]
    pub delay: Duration,

    #[arg(short, long, help = "Don't echo events to stdout.")]
    pub quiet: bool,
}

impl Display for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--rollover {:?} --workers {}", self.rollover, self.workers)
    }
}

impl Cmd {
    fn policy(&self) -> RolloverPolicy {
        match self.rollover {
            Rollover::Never => RolloverPolicy::Never,
            Rollover::Daily => RolloverPolicy::Daily,
            Rollover::Hourly => RolloverPolicy::Hourly,
            Rollover::Lines => RolloverPolicy::AfterLines(self.max_lines),
        }
    }

    pub fn run(&self, config: &impl ConfigManager) -> eyre::Result<()> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => config.get_log_dir()?,
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed creating log directory {}", dir.display()))?;

        let emitter = Arc::new(Emitter::new());
        let file = Arc::new(self.open_file_sink(&dir)?);
        emitter.subscribe(file.clone());
        if !self.quiet {
            emitter.subscribe(Arc::new(ConsoleSink::new()));
        }

        LogBridge::new(Arc::clone(&emitter), LevelFilter::Trace).init()?;
        log::info!("simulation starting in {}", dir.display());

        let mut workers = Vec::with_capacity(self.workers);
        let mut severities = Severity::ALL.into_iter().cycle();
        for spawn in 1..=self.workers {
            if let Some(severity) = severities.next() {
                log_tick(&emitter, severity, spawn);
            }
            workers.push(self.spawn_worker(&emitter, spawn)?);
        }

        for worker in workers {
            worker
                .join()
                .map_err(|_| eyre!("Worker thread panicked"))?;
        }

        log::info!("simulation done");
        println!("Files:          {}", dir.display());
        println!("Current file:   {}", file.path().map(|p| p.display().to_string()).unwrap_or_default());
        println!("Last line:      {}", emitter.last_line().unwrap_or_default());

        emitter.flush();
        emitter.dispose();
        file.close();
        Ok(())
    }

    fn open_file_sink(&self, dir: &Path) -> eyre::Result<FileSink> {
        let sink = FileSink::new(numbered_log_file(dir, FILE_PREFIX, 1), self.policy())?;

        let next = AtomicUsize::new(1);
        let dir = dir.to_path_buf();
        sink.on_rollover(move |sink| {
            let number = next.fetch_add(1, Ordering::Relaxed) + 1;
            let path = numbered_log_file(&dir, FILE_PREFIX, number);
            if let Err(err) = sink.set_path(&path) {
                tracing::error!("log file rollover failed, staying on the old file: {:#}", err);
            }
        });

        Ok(sink)
    }

    /// The first worker keeps its own narrative in a thread-bound cache and replays
    /// it through the emitter once done.
    fn spawn_worker(
        &self,
        emitter: &Arc<Emitter>,
        spawn: usize,
    ) -> eyre::Result<thread::JoinHandle<()>> {
        let emitter = Arc::clone(emitter);
        let iterations = self.iterations;
        let delay = self.delay;

        thread::Builder::new()
            .name(format!("Spawn # {}", spawn))
            .spawn(move || {
                let cache = (spawn == 1).then(|| Arc::new(CachedSink::for_current_thread()));
                if let Some(cache) = &cache {
                    emitter.subscribe(cache.clone());
                }

                for i in 1..=iterations {
                    multilog::debug!(emitter, "Iteration number {} of {}", i, iterations);
                    thread::sleep(delay);
                }
                multilog::info!(emitter, "Iterative Thread Done");

                if let Some(cache) = cache {
                    cache.pause();
                    for line in cache.messages() {
                        emitter.info(line, None);
                    }
                    cache.resume();
                    emitter.unsubscribe(&cache);
                }
            })
            .context("Failed spawning worker thread")
    }
}

fn log_tick(emitter: &Emitter, severity: Severity, spawn: usize) {
    match severity {
        Severity::Exception => multilog::exception!(
            emitter,
            ErrorInfo::new("OUTER")
                .with_stack(multilog::stack_trace!())
                .caused_by(ErrorInfo::new("Inner1").caused_by(ErrorInfo::new("Inner2"))),
            "tick {} failed",
            spawn
        ),
        severity => multilog::emit!(emitter, severity, "tick {}", spawn),
    }
}
