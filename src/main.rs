//! Mounts the remote workspace filesystem and drives its FUSE session,
//! per §6's "Exit codes" (nonzero on mount failure, zero on clean unmount)
//! and §5's shutdown flush.

use clap::Parser;
use fuser::MountOption;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use workspacefs::cache::disk::DiskCache;
use workspacefs::cache::metadata::MetadataCache;
use workspacefs::config;
use workspacefs::fs::FsWrapper;
use workspacefs::node::NodeEngine;
use workspacefs::remote::RemoteClient;

#[derive(Parser, Debug)]
#[command(name = "workspacefs", about = "Mounts a remote workspace as a local FUSE filesystem")]
struct Cli {
    /// Local directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Detach into the background after mounting.
    #[arg(long)]
    daemonize: bool,

    /// Name reported to the kernel for this mount (shown in `mount`/`df`).
    #[arg(long, default_value = "workspacefs")]
    fs_name: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.daemonize {
        if let Err(e) = daemonize::Daemonize::new().start() {
            tracing::error!(error = %e, "failed to daemonize");
            return ExitCode::FAILURE;
        }
    }

    let metadata_cache = MetadataCache::with_config(
        Duration::from_secs(cfg.file.metadata_cache_ttl_seconds),
        cfg.file.metadata_cache_capacity,
    );
    let remote = RemoteClient::new(cfg.remote_host.clone(), cfg.remote_token.clone(), metadata_cache);

    let disk_cache = if cfg.file.disk_cache_disabled {
        DiskCache::disabled()
    } else {
        match DiskCache::new(
            cfg.disk_cache_dir(),
            cfg.file.disk_cache_capacity_bytes,
            Duration::from_secs(cfg.file.disk_cache_ttl_seconds),
        ) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to open disk cache, continuing disabled");
                DiskCache::disabled()
            }
        }
    };

    let engine = Arc::new(NodeEngine::new(remote, disk_cache, cfg.owner_uid(), cfg.file.restrict_access));

    let attr_ttl = Duration::from_secs(cfg.file.kernel_attr_timeout_seconds);
    let entry_ttl = Duration::from_secs(cfg.file.kernel_entry_timeout_seconds);
    let adapter = match FsWrapper::new(engine.clone(), attr_ttl, entry_ttl) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let options = vec![MountOption::AutoUnmount, MountOption::FSName(cli.fs_name)];
    tracing::info!(mountpoint = %cli.mountpoint.display(), "mounting");
    let mount_result = fuser::mount2(adapter, &cli.mountpoint, &options);

    let flush_runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start shutdown-flush runtime");
            return ExitCode::FAILURE;
        }
    };
    let unflushed = flush_runtime.block_on(engine.flush_all_dirty());
    if !unflushed.is_empty() {
        tracing::warn!(count = unflushed.len(), inodes = ?unflushed, "nodes remained dirty at shutdown");
    }

    match mount_result {
        Ok(()) => {
            tracing::info!("unmounted cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "mount failed");
            ExitCode::FAILURE
        }
    }
}
