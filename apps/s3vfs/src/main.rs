//! s3vfs - browse and edit an S3 bucket as a filesystem.
//!
//! # Usage
//!
//! ```text
//! s3vfs --bucket media ls photos
//! s3vfs --bucket media put ./cat.jpg photos/cat.jpg --multipart --part-size 8388608
//! s3vfs --bucket media --root photos cat cat.jpg > cat.jpg
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3VFS_BUCKET` | *(unset)* | Bucket to operate on (`--bucket`) |
//! | `S3VFS_ROOT` | *(empty)* | Root prefix (`--root`) |
//! | `S3_ENDPOINT_URL` | *(unset)* | Custom S3 endpoint (`--endpoint-url`) |
//! | `S3VFS_*` | | Remaining filesystem settings, see `FsConfig::from_env` |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use s3vfs_core::{Basic, Dir, FsConfig, O_WRMULTIPART, ObjectInfo, S3Fs};
use s3vfs_store::AwsS3Store;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Default multipart part size (8 MiB); S3 requires at least 5 MiB for all
/// parts but the last.
const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Size of the reads used to stream a file to stdout.
const COPY_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Parser)]
#[command(name = "s3vfs", version, about = "Browse and edit an S3 bucket as a filesystem")]
struct Cli {
    /// Bucket to operate on.
    #[arg(long, env = "S3VFS_BUCKET", global = true)]
    bucket: Option<String>,

    /// Key prefix every path is resolved against.
    #[arg(long, env = "S3VFS_ROOT", global = true)]
    root: Option<String>,

    /// Custom S3 endpoint, e.g. `http://localhost:4566`.
    #[arg(long, env = "S3_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List a directory.
    Ls {
        /// Directory to list; the root when omitted.
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a file to stdout.
    Cat {
        /// File to print.
        path: String,
    },
    /// Upload a local file.
    Put {
        /// Local file to upload.
        local: PathBuf,
        /// Destination path.
        path: String,
        /// Upload through a multipart session, one part per chunk.
        #[arg(long)]
        multipart: bool,
        /// Chunk size for multipart uploads, in bytes.
        #[arg(long, default_value_t = DEFAULT_PART_SIZE)]
        part_size: usize,
    },
    /// Move a file.
    Mv {
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
    },
    /// Delete a file.
    Rm {
        /// File to delete.
        path: String,
    },
    /// Show metadata of a file or directory.
    Stat {
        /// Path to describe.
        path: String,
    },
    /// Create a directory.
    Mkdir {
        /// Directory to create.
        path: String,
    },
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config
/// value. Logs go to stderr so they never mix with file content on stdout.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Merge command line overrides into the environment configuration.
fn build_config(cli: &Cli) -> FsConfig {
    let mut config = FsConfig::from_env();
    if let Some(bucket) = &cli.bucket {
        config.bucket.clone_from(bucket);
    }
    if let Some(root) = &cli.root {
        config.root.clone_from(root);
    }
    config
}

fn format_entry(entry: &ObjectInfo, separator: &str) -> String {
    let modified = entry
        .modified
        .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    let mut name = entry.base_name(separator).to_owned();
    if entry.is_dir() {
        name.push_str(separator);
    }
    format!("{} {:>12} {:>19} {}", entry.mode, entry.size, modified, name)
}

/// Fill `buf` from `file`, returning fewer bytes only at end of file.
async fn read_chunk(file: &mut tokio::fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn cat(fs: &S3Fs, path: &str) -> Result<()> {
    let mut file = fs.open(path).await?;
    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).await?;
    }
    stdout.flush().await?;
    file.close().await?;
    Ok(())
}

async fn put(
    fs: &S3Fs,
    local: &Path,
    path: &str,
    multipart: bool,
    part_size: usize,
) -> Result<()> {
    anyhow::ensure!(part_size > 0, "part size must be positive");
    let mut source = tokio::fs::File::open(local)
        .await
        .with_context(|| format!("failed to open {}", local.display()))?;

    let mut file = if multipart {
        fs.open_file(path, O_WRMULTIPART, 0o666).await?
    } else {
        fs.create(path).await?
    };

    let mut buf = vec![0u8; part_size];
    let copied: Result<usize> = async {
        let mut total = 0usize;
        loop {
            let n = read_chunk(&mut source, &mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            file.write(&buf[..n]).await?;
            total += n;
        }
    }
    .await;

    let total = match copied {
        Ok(total) => total,
        Err(e) => {
            if let Err(discard_err) = file.discard().await {
                warn!(path, error = %discard_err, "failed to discard handle after upload error");
            }
            return Err(e);
        }
    };
    file.close().await?;

    info!(local = %local.display(), path, bytes = total, multipart, "uploaded");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli);
    init_tracing(&config.log_level)?;

    let store = AwsS3Store::from_env(cli.endpoint_url.clone()).await;
    let fs = S3Fs::new(Arc::new(store), config).context("invalid filesystem configuration")?;

    match cli.command {
        Command::Ls { path } => {
            for entry in fs.read_dir(&path).await? {
                println!("{}", format_entry(&entry, fs.separator()));
            }
        }
        Command::Cat { path } => cat(&fs, &path).await?,
        Command::Put {
            local,
            path,
            multipart,
            part_size,
        } => put(&fs, &local, &path, multipart, part_size).await?,
        Command::Mv { from, to } => fs
            .rename(&from, &to)
            .await
            .with_context(|| format!("failed to move {from} to {to}"))?,
        Command::Rm { path } => fs
            .remove(&path)
            .await
            .with_context(|| format!("failed to remove {path}"))?,
        Command::Stat { path } => {
            let entry = fs.stat(&path).await?;
            println!("{}", format_entry(&entry, fs.separator()));
        }
        Command::Mkdir { path } => fs.mkdir_all(&path, 0o755).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}
