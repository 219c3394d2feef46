//! Ordered execution of the resolved transfer plan
//!
//! Linear sequence, no branching back: download the compressed archive from
//! the source container, copy it into the destination container's /tmp,
//! extract, remove the remote copy, then delete the local staging file when
//! it isn't being kept. Confirmation summaries gate each phase in
//! interactive mode; dry-run stops short of every mutating remote call.

use anyhow::{Context, Result};
use std::fs::File;
use std::time::Instant;

use crate::input::InputModel;
use crate::kube::KubeClient;
use crate::logger::Logger;
use crate::progress::{human_bytes, Reporter, SizeProbe};
use crate::prompt::Prompt;
use crate::validate::Outcome;

/// Well-known scratch location inside the destination container.
pub const REMOTE_STAGING_DIR: &str = "/tmp";

pub fn run(
    input: &InputModel,
    client: &dyn KubeClient,
    prompt: &mut dyn Prompt,
    logger: &dyn Logger,
) -> Result<Outcome> {
    if !input.upload_only {
        if input.interactive {
            print_download_summary(input);
            if !prompt.confirm("continue?", true)? {
                return Ok(Outcome::Stop("download cancelled".to_string()));
            }
        }
        if !input.dry_run {
            download(input, client, logger)?;
        }
    }

    if !input.download_only {
        if input.interactive {
            print_upload_summary(input);
            if !prompt.confirm("continue?", true)? {
                return Ok(Outcome::Stop("upload cancelled".to_string()));
            }
        }
        if !input.dry_run {
            upload(input, client, logger)?;
        }
    }

    if !input.keeps_local() && !input.dry_run {
        std::fs::remove_file(&input.local_file).with_context(|| {
            format!(
                "removing local staging archive '{}'",
                input.local_file.display()
            )
        })?;
        logger.cleanup(&input.local_file);
        println!(
            "Removed local staging archive '{}'",
            input.local_file.display()
        );
    }

    Ok(Outcome::Proceed)
}

fn download(input: &InputModel, client: &dyn KubeClient, logger: &dyn Logger) -> Result<()> {
    let ep = &input.src;
    let mut file = File::create(&input.local_file).with_context(|| {
        format!(
            "creating local staging archive '{}'",
            input.local_file.display()
        )
    })?;

    let probe_path = input.local_file.clone();
    let probe: SizeProbe =
        Box::new(move || std::fs::metadata(&probe_path).map(|m| m.len()).unwrap_or(0));
    let reporter = Reporter::start(
        &format!("Downloading '{}' from pod '{}'", ep.dir, ep.pod),
        Some(probe),
    );
    let start = Instant::now();
    let result = client.exec_stream(
        ep.target(),
        &["tar", "czf", "-", "-C", &ep.dir, "."],
        &mut file,
    );
    // The reporter owns the status line until it acknowledges the stop;
    // only then is it safe to print the phase result.
    reporter.stop();
    if let Err(e) = result {
        logger.error("download", &format!("{e:#}"));
        return Err(e);
    }

    let seconds = start.elapsed().as_secs_f64();
    let bytes = std::fs::metadata(&input.local_file)
        .map(|m| m.len())
        .unwrap_or(0);
    println!("Downloaded {} in {:.1}s", human_bytes(bytes), seconds);
    logger.download_done(&ep.pod, &ep.dir, bytes, seconds);
    Ok(())
}

fn upload(input: &InputModel, client: &dyn KubeClient, logger: &dyn Logger) -> Result<()> {
    let ep = &input.dst;
    let file_name = input
        .local_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::input::DEFAULT_LOCAL_FILE.to_string());
    let remote_tmp = format!("{}/{}", REMOTE_STAGING_DIR, file_name);

    let reporter = Reporter::start(&format!("Copying archive to pod '{}'", ep.pod), None);
    let start = Instant::now();
    let result = client.copy_in(ep.target(), &input.local_file, &remote_tmp);
    reporter.stop();
    if let Err(e) = result {
        logger.error("upload", &format!("{e:#}"));
        return Err(e);
    }
    let seconds = start.elapsed().as_secs_f64();
    println!("Copied archive in {:.1}s", seconds);
    logger.upload_done(&ep.pod, &remote_tmp, seconds);

    let reporter = Reporter::start(
        &format!("Extracting into '{}' on pod '{}'", ep.dir, ep.pod),
        None,
    );
    let start = Instant::now();
    let result = client.exec(ep.target(), &["tar", "xzpf", &remote_tmp, "-C", &ep.dir]);
    reporter.stop();
    if let Err(e) = result {
        logger.error("extract", &format!("{e:#}"));
        return Err(e);
    }
    let seconds = start.elapsed().as_secs_f64();
    println!("Extracted archive in {:.1}s", seconds);
    logger.extract_done(&ep.pod, &ep.dir, seconds);

    client.exec(ep.target(), &["rm", &remote_tmp])?;
    Ok(())
}

fn print_download_summary(input: &InputModel) {
    let ep = &input.src;
    println!("About to download:");
    println!("  context:   {}", ep.context);
    println!("  namespace: {}", ep.namespace);
    println!("  pod:       {}", ep.pod);
    println!("  container: {}", ep.container);
    println!("  directory: {}", ep.dir);
    println!("  into:      {}", input.local_file.display());
    if input.dry_run {
        println!("  (dry run: no data will move)");
    }
}

fn print_upload_summary(input: &InputModel) {
    let ep = &input.dst;
    println!("About to upload:");
    println!("  archive:   {}", input.local_file.display());
    println!("  context:   {}", ep.context);
    println!("  namespace: {}", ep.namespace);
    println!("  pod:       {}", ep.pod);
    println!("  container: {}", ep.container);
    println!("  directory: {}", ep.dir);
    if input.dry_run {
        println!("  (dry run: no data will move)");
    }
}
