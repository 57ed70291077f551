use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use library::{Library, LocalDir, MusicDir, S3Dir};
use metadata::LoftyReader;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let source = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path or s3://bucket argument")?;
    let index_path = args
        .next()
        .or_else(|| env::var("INDEX_PATH").ok())
        .unwrap_or_else(|| "data/catalog.redb".to_string());

    let dir: Arc<dyn MusicDir> = match source.strip_prefix("s3://") {
        Some(bucket) => {
            let endpoint =
                env::var("S3_ENDPOINT").unwrap_or_else(|_| "https://s3.amazonaws.com".to_string());
            Arc::new(S3Dir::new(&endpoint, bucket.trim_end_matches('/'))?)
        }
        None => Arc::new(LocalDir::new(PathBuf::from(&source))),
    };

    let library = Library::open(&PathBuf::from(&index_path))?;
    let summary = library.scanner(dir, Arc::new(LoftyReader)).start()?;
    let stats = library.stats()?;

    println!(
        "Scanned in {:.1}s: {} new or updated, {} errors, {} removed",
        summary.elapsed.as_secs_f64(),
        summary.new_or_updated_tracks,
        summary.errored_tracks,
        summary.deleted_tracks
    );
    println!(
        "Catalog: {} artists, {} albums, {} tracks, {} genres",
        stats.artists, stats.albums, stats.tracks, stats.genres
    );

    Ok(())
}
