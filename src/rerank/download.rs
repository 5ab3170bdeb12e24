/// Reranker model download from HuggingFace.
///
/// Fetches the ONNX export and tokenizer of the configured repository into
/// the model directory, skipping files that are already present.
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Local filename and path inside the HuggingFace repository.
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

fn file_url(repo: &str, remote_path: &str) -> String {
    format!("https://huggingface.co/{repo}/resolve/main/{remote_path}")
}

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Download any missing model files of `repo` into `model_dir`.
pub fn ensure_model_files(model_dir: &Path, repo: &str) -> Result<()> {
    info!("Checking reranker files in {}", model_dir.display());

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    if all_files_present(model_dir) {
        info!("All reranker files found, skipping download");
        return Ok(());
    }

    info!("Downloading reranker {repo} from HuggingFace (one-time)");

    for &(filename, remote_path) in MODEL_FILES {
        let dest = model_dir.join(filename);

        if dest.exists() {
            info!("File already exists: {filename}");
            continue;
        }

        let url = file_url(repo, remote_path);
        info!("Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
    }

    info!("Reranker download complete");
    Ok(())
}

/// Download a single file with a progress bar.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let mut resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let total = resp.content_length().unwrap_or(0);

    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                .expect("valid template")
                .progress_chars("█▓░"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    // Write to a temp name first so an interrupted download is retried
    let partial = dest.with_extension("part");
    let file = fs::File::create(&partial)
        .with_context(|| format!("failed to create file: {}", partial.display()))?;
    let mut writer = pb.wrap_write(file);
    resp.copy_to(&mut writer)
        .context("failed to stream response body")?;
    writer.flush().context("failed to flush file")?;
    pb.finish_and_clear();

    fs::rename(&partial, dest)
        .with_context(|| format!("failed to move {} into place", partial.display()))?;

    Ok(())
}
