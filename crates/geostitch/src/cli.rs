use clap::Parser;
use std::path::PathBuf;

/// Rebuild coastlines, roads, water bodies and other map features from way fragments
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Settings {
    /// Input document (JSON) with fragments, relation members and an optional boundary
    #[clap(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the output document; stdout when omitted
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-category thresholds and run options (JSON)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Clip everything to the closed outer rings of this relation
    ///
    /// Takes precedence over a boundary embedded in the input document. The relation's
    /// own member rows are not assembled as features.
    #[clap(long, value_name = "ID")]
    pub boundary_relation: Option<u64>,

    /// Re-divide the output features with these ids after the run
    #[clap(long, value_name = "ID", num_args = 1.., value_delimiter = ',')]
    pub divide: Vec<u64>,

    /// Number of merge workers (defaults to the configuration, then to the CPU count)
    #[clap(short, long)]
    pub workers: Option<usize>,

    /// Pretty-print the output document
    #[clap(long)]
    pub pretty: bool,

    /// More logging: -v for debug, -vv for trace. RUST_LOG overrides this.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Settings {
    pub fn from_cli() -> Self {
        Self::parse()
    }
}
