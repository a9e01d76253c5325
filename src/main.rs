use clap::Parser;
use log::{error, info};
use maaf_search::config::{DEFAULT_MAX_K, SearchConfig};
use maaf_search::io::{read_tree, read_tree_pair, taxon_ordering, write_maafs};
use maaf_search::search::hybridization_number;
use phylotree::tree::Tree;
use std::path::PathBuf;
use std::time::Instant;

/// Compute the hybridization number of two rooted binary trees and write
/// the maximum acyclic agreement forests that realize it.
#[derive(Parser, Debug)]
#[command(name = "maaf-search", version, about = "Maximum acyclic agreement forests of two trees")]
struct Args {
    /// Newick/NEXUS file holding the first tree
    #[arg(short = 'a', long = "tree1", requires = "tree2", conflicts_with = "input")]
    tree1: Option<PathBuf>,

    /// Newick/NEXUS file holding the second tree
    #[arg(short = 'b', long = "tree2", requires = "tree1")]
    tree2: Option<PathBuf>,

    /// File holding both trees (the first two trees are used)
    #[arg(short = 'i', long = "input", required_unless_present = "tree1")]
    input: Option<PathBuf>,

    /// Give up above this many cuts
    #[arg(long = "max-k", default_value_t = DEFAULT_MAX_K)]
    max_k: usize,

    /// Report every forest of the minimum size, not just the first
    #[arg(long = "all", default_value_t = false)]
    all: bool,

    /// Memory budget of the state memo in MiB
    #[arg(long = "memo-mb", default_value_t = 256)]
    memo_mb: usize,

    /// Taxon that may never be isolated (repeatable)
    #[arg(long = "protect")]
    protect: Vec<String>,

    /// Output path for the report (`-` for stdout, `.gz` for gzip)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Quiet mode: only warnings and errors on stderr
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Verbose mode: per-level search progress on stderr
    #[arg(short = 'v', long = "verbose", default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let t0 = Instant::now();
    let (tree1, tree2) = match load_trees(&args) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to read trees: {e}");
            std::process::exit(2);
        }
    };
    let taxa = taxon_ordering(&tree1, &tree2);
    info!("Read {} taxa in {:.3}s", taxa.len(), t0.elapsed().as_secs_f64());

    let config = SearchConfig::default()
        .with_stop_at_first(!args.all)
        .with_max_k(args.max_k)
        .with_memo_capacity_bytes(args.memo_mb.saturating_mul(1024 * 1024))
        .with_protected_taxa(args.protect.clone());

    let t1 = Instant::now();
    let (h, maafs) = match hybridization_number(&tree1, &tree2, &taxa, &config) {
        Ok(Some(found)) => found,
        Ok(None) => {
            error!("No acyclic agreement forest with at most {} cuts", args.max_k);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Search failed: {e}");
            std::process::exit(3);
        }
    };
    info!("Searching forests {:.3}s", t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    if let Err(e) = write_maafs(&args.output, h, &maafs) {
        error!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    let target = if args.output.as_os_str() == "-" { "stdout" } else { "output" };
    info!("Writing to {target} {:.3}s", t2.elapsed().as_secs_f64());
}

fn init_logging(args: &Args) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn load_trees(args: &Args) -> maaf_search::Result<(Tree, Tree)> {
    match (&args.input, &args.tree1, &args.tree2) {
        (Some(input), _, _) => read_tree_pair(input),
        (None, Some(first), Some(second)) => Ok((read_tree(first)?, read_tree(second)?)),
        _ => Err(maaf_search::MaafError::EmptyTree),
    }
}
