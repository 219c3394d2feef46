//! podcopy - move a directory between Kubernetes pods
//!
//! Stages the source directory as a local gzip-compressed tar archive, then
//! unpacks it into the destination container, preserving ownership and
//! permissions. Supports full migration, download-only (backup) and
//! upload-only (restore) runs.

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Instant;

use podcopy::input::{Endpoint, InputModel};
use podcopy::kube::Kubectl;
use podcopy::logger::{Logger, NoopLogger, TextLogger};
use podcopy::prompt::TermPrompt;
use podcopy::transfer;
use podcopy::validate::{Outcome, Validator};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Copy a directory between pods through a local staging archive, preserving ownership and permissions"
)]
struct Args {
    /// Source cluster context (default: the currently active one)
    #[arg(long, default_value = "")]
    src_context: String,

    /// Source namespace (default: the context's configured namespace)
    #[arg(long, default_value = "")]
    src_namespace: String,

    /// Source pod (required unless --upload-only)
    #[arg(long, default_value = "")]
    src_pod: String,

    /// Source container (only needed when the pod has several)
    #[arg(long, default_value = "")]
    src_container: String,

    /// Directory to copy out of the source container
    #[arg(long, default_value = "")]
    src_dir: String,

    /// Destination cluster context (default: the currently active one)
    #[arg(long, default_value = "")]
    dst_context: String,

    /// Destination namespace (default: the context's configured namespace)
    #[arg(long, default_value = "")]
    dst_namespace: String,

    /// Destination pod (required unless --download-only)
    #[arg(long, default_value = "")]
    dst_pod: String,

    /// Destination container (only needed when the pod has several)
    #[arg(long, default_value = "")]
    dst_container: String,

    /// Directory to unpack into inside the destination container
    #[arg(long, default_value = "")]
    dst_dir: String,

    /// Ask before selecting containers, overwriting and transferring
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = true, action = ArgAction::Set)]
    interactive: bool,

    /// Replace the destination directory's contents when it is not empty
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    overwrite_dst: Option<bool>,

    /// Keep the local staging archive after the transfer
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    keep_local: Option<bool>,

    /// Only download the archive (backup)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = false, action = ArgAction::Set)]
    download_only: bool,

    /// Only upload an existing archive (restore)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = false, action = ArgAction::Set)]
    upload_only: bool,

    /// Validate and confirm, but move no data
    #[arg(long, num_args = 0..=1, default_missing_value = "true", default_value_t = false, action = ArgAction::Set)]
    dry_run: bool,

    /// Local staging archive path
    #[arg(long, default_value = "archive.tar.gz")]
    local_file: PathBuf,

    /// Append transfer events to this log file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_input(self) -> InputModel {
        InputModel {
            src: Endpoint {
                context: self.src_context,
                namespace: self.src_namespace,
                pod: self.src_pod,
                container: self.src_container,
                dir: self.src_dir,
            },
            dst: Endpoint {
                context: self.dst_context,
                namespace: self.dst_namespace,
                pod: self.dst_pod,
                container: self.dst_container,
                dir: self.dst_dir,
            },
            interactive: self.interactive,
            overwrite_dst: self.overwrite_dst,
            keep_local: self.keep_local,
            download_only: self.download_only,
            upload_only: self.upload_only,
            dry_run: self.dry_run,
            local_file: self.local_file,
        }
    }
}

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    let logger: Box<dyn Logger> = match &args.log_file {
        Some(p) => match TextLogger::new(p) {
            Ok(l) => Box::new(l),
            Err(_) => Box::new(NoopLogger),
        },
        None => Box::new(NoopLogger),
    };

    let mut input = args.into_input();
    let client = Kubectl::new();
    let mut prompt = TermPrompt::new(BufReader::new(io::stdin()), io::stdout());

    match Validator::new(&client, &mut prompt).validate(&mut input)? {
        Outcome::Stop(msg) => {
            println!("{}", msg);
            return Ok(());
        }
        Outcome::Proceed => {}
    }

    let mode = if input.download_only {
        "download-only"
    } else if input.upload_only {
        "upload-only"
    } else {
        "migrate"
    };
    logger.run_start(mode, &input.local_file);

    let start = Instant::now();
    match transfer::run(&input, &client, &mut prompt, logger.as_ref())? {
        Outcome::Stop(msg) => {
            println!("{}", msg);
            return Ok(());
        }
        Outcome::Proceed => {}
    }

    if input.dry_run {
        println!("Dry run complete; no data moved.");
    } else {
        println!("Done in {:.1}s", start.elapsed().as_secs_f64());
    }
    Ok(())
}
