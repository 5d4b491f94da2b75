use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stackspy_common::LabelSet;

#[derive(Debug, Parser)]
#[command(name = "stackspy", about = "Sample call stacks of a running process")]
pub struct Opt {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the profilers compiled into this build
    Profilers {},
    /// Attach to a process and stream its stacks to stdout
    Sample {
        /// Config file, defaults to ./StackSpy.toml when present
        #[clap(long)]
        config: Option<PathBuf>,
        /// Profiler to attach with
        #[clap(long)]
        profiler: Option<String>,
        /// Pid to attach to
        #[clap(short, long, conflicts_with = "command")]
        pid: Option<i32>,
        /// launch child process with the command and attach to its pid
        #[clap(short, long)]
        command: Option<String>,
        /// Pause the target while its stack is captured
        #[clap(long)]
        blocking: bool,
        /// Snapshots per second
        #[clap(long)]
        rate: Option<u32>,
        /// Exit after this many snapshots
        #[clap(long)]
        count: Option<u64>,
        /// Output format
        #[clap(long, value_enum, default_value_t = Format::Folded)]
        format: Format,
        /// Extra label attached to samples, as key=value (repeatable)
        #[clap(short, long = "label", value_parser = LabelSet::parse_pair)]
        labels: Vec<(String, String)>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// `frame;frame;frame weight` lines
    Folded,
    /// one JSON object per line
    Json,
}
