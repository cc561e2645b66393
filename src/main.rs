use std::path::PathBuf;

use clap::Parser;
use log::info;

use splinterfs::fuse::mount::mount_split_fs_unprivileged;
use splinterfs::split::table::{DEFAULT_SPLIT_SIZE, SplitLayout};
use splinterfs::vfs::fs::{MountConfig, SplitFs};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Expose one large file as a directory of read-only, bounded-size splits"
)]
struct Args {
    /// Backing file to expose as splits
    source: PathBuf,
    /// Directory to mount the virtual split directory on (created if missing)
    mountpoint: PathBuf,
    /// Maximum size of a single split in bytes
    #[arg(long, default_value_t = DEFAULT_SPLIT_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    split_size: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    // The backing file must exist at startup; anything else is fatal here.
    match std::fs::metadata(&args.source) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            eprintln!("source is not a regular file: {}", args.source.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("cannot stat source {}: {e}", args.source.display());
            std::process::exit(1);
        }
    }

    let config = match MountConfig::new(&args.source, SplitLayout::new(args.split_size)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid source path: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&args.mountpoint) {
        eprintln!("create mount point failed: {e}");
        std::process::exit(1);
    }

    info!(
        "mounting {} at {} (split size {} bytes)",
        args.source.display(),
        args.mountpoint.display(),
        args.split_size
    );
    println!(
        "Mounting {} at {} (split size {} bytes)...",
        args.source.display(),
        args.mountpoint.display(),
        args.split_size
    );
    println!("Press Ctrl+C to unmount and exit.");

    let fs = SplitFs::new(config);
    let mut mount_handle = match mount_split_fs_unprivileged(fs, &args.mountpoint).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("mount failed: {e}");
            std::process::exit(1);
        }
    };

    let handle = &mut mount_handle;
    tokio::select! {
        res = handle => {
            if let Err(e) = res {
                eprintln!("fuse session ended with error: {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("unmounting");
            if let Err(e) = mount_handle.unmount().await {
                eprintln!("unmount error: {e}");
                std::process::exit(1);
            }
        }
    }
}
