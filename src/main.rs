use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use gatefs::clock::SystemClock;
use gatefs::config::{Args, Config};
use gatefs::registry::FileSystemRegistry;
use gatefs::remote::api::{Archive, ContentFetcher, DerivativeFile, Folder, InMemoryArchiveApi, Record};
use gatefs::sftp::engine::ProtocolEngine;
use gatefs::sftp::message::{Request, Response};
use gatefs::spool::registry::TemporaryFileRegistry;
use gatefs::store::InMemoryObjectStore;
use gatefs::vfs::fs::VirtualFileSystem;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "archive-store SFTP gateway core")]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Drive one gateway session end-to-end against in-memory collaborators
    Demo,
    /// Validate configuration and print the derived settings
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Demo) => demo().await,
        Some(Command::Check) => {
            let config = Config::from_args(&cli.args).context("configuration")?;
            println!("remote url : {}", config.remote_url);
            println!("bucket     : {}", config.bucket);
            println!("key prefix : {}", config.key_prefix);
            println!("spool dir  : {}", config.spool_dir.display());
            Ok(())
        }
        None => {
            println!("gatefs: archive-store SFTP gateway core");
            println!("Usage:\n  gatefs demo\n  gatefs check");
            Ok(())
        }
    }
}

/// Periodic idle eviction for both registries; fire-and-forget.
fn spawn_sweepers(
    filesystems: Arc<FileSystemRegistry>,
    spools: Arc<TemporaryFileRegistry>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            filesystems.sweep();
            spools.sweep().await;
        }
    })
}

async fn demo() -> anyhow::Result<()> {
    let api = Arc::new(sample_archive());
    let store = Arc::new(InMemoryObjectStore::new());
    let clock = Arc::new(SystemClock);
    let spool_dir = std::env::temp_dir().join("gatefs-demo-spool");
    tokio::fs::create_dir_all(&spool_dir)
        .await
        .context("spool dir")?;

    let filesystems = Arc::new(FileSystemRegistry::new(clock.clone()));
    let spools = Arc::new(TemporaryFileRegistry::new(
        store.clone(),
        "demo-bucket",
        spool_dir,
        clock,
    ));
    let sweeper = spawn_sweepers(filesystems.clone(), spools.clone());

    let fs = filesystems.for_user("demo", || VirtualFileSystem::new(api.clone()));
    let fetcher: Arc<dyn ContentFetcher> = Arc::new(DemoFetcher);
    let mut engine = ProtocolEngine::new(fs, spools.clone(), fetcher, "uploads");

    // Walk the tree root-down the way a client would.
    for path in ["/", "/archives", "/archives/Annual Reports (42)"] {
        let opened = engine
            .handle(Request::OpenDir {
                id: 1,
                path: path.into(),
            })
            .await;
        let Response::Handle { handle, .. } = opened else {
            anyhow::bail!("opendir {path} failed: {opened:?}");
        };
        let listing = engine.handle(Request::ReadDir { id: 2, handle }).await;
        if let Response::Name { entries, .. } = listing {
            println!("{path}");
            for entry in entries {
                println!("  {}", entry.longname);
            }
        }
        engine.handle(Request::Close { id: 3, handle }).await;
    }

    // Upload one small object through the spool.
    let upload_path = "/archives/Annual Reports (42)/2024/report.pdf";
    let opened = engine
        .handle(Request::Open {
            id: 4,
            path: upload_path.into(),
            write: true,
        })
        .await;
    let Response::Handle { handle, .. } = opened else {
        anyhow::bail!("open for write failed: {opened:?}");
    };
    engine
        .handle(Request::Write {
            id: 5,
            handle,
            offset: 0,
            data: Bytes::from_static(b"%PDF-1.7 demo payload"),
        })
        .await;
    engine.handle(Request::Close { id: 6, handle }).await;

    let stored = store
        .object("uploads/42/2024/report.pdf")
        .context("uploaded object missing")?;
    println!("uploaded {} bytes to uploads/42/2024/report.pdf", stored.len());

    sweeper.abort();
    println!("demo: OK");
    Ok(())
}

struct DemoFetcher;

#[async_trait::async_trait]
impl ContentFetcher for DemoFetcher {
    async fn fetch(&self, _url: &str) -> gatefs::error::Result<Bytes> {
        Ok(Bytes::from_static(b"demo content"))
    }
}

fn sample_archive() -> InMemoryArchiveApi {
    let mut api = InMemoryArchiveApi {
        archives: vec![Archive {
            id: 42,
            name: "Annual Reports".into(),
        }],
        ..Default::default()
    };
    let mut year = Folder {
        id: 1,
        name: "2024".into(),
        folders: vec![],
        records: vec![],
        updated_at: None,
    };
    let record = Record {
        id: 7,
        name: "summary.pdf".into(),
        files: vec![DerivativeFile {
            derivative: "Original".into(),
            size: 12,
            url: "https://content/7".into(),
        }],
        updated_at: None,
    };
    year.records.push(record.clone());
    api.top_folders.insert(42, vec![year.clone()]);
    api.folders.insert(1, year);
    api.records.insert(7, record);
    api
}
