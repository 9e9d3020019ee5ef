use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use webdav_manager::{
    config::Config, LockToken, ServerType, TransferOutcome, WebDAVConnection, WebDAVService,
};

#[derive(Parser, Debug)]
#[command(name = "webdav-manager", about = "Manage resources on a WebDAV server")]
struct Cli {
    /// DAV root, overrides WEBDAV_BASE_URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Overrides WEBDAV_USERNAME
    #[arg(long, short = 'u', global = true)]
    username: Option<String>,

    /// Overrides WEBDAV_PASSWORD
    #[arg(long, short = 'p', global = true)]
    password: Option<String>,

    /// generic, nextcloud or owncloud; overrides WEBDAV_SERVER_TYPE
    #[arg(long, global = true)]
    server_type: Option<ServerType>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the server with OPTIONS
    Check,
    /// Walk through every operation against a scratch tree
    Demo {
        /// Local file uploaded as a/b/c/test.xml
        #[arg(default_value = "test_files/test.xml")]
        file: PathBuf,
    },
    /// List the children of a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Show file details or directory children
    Describe {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Delete a directory with its content
    Rmdir { path: String },
    /// Delete a file
    Rm { path: String },
    /// Upload a local file, creating missing parent directories
    Put { local: PathBuf, remote: String },
    /// Download a file to stdout or to --output
    Get {
        remote: String,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Copy a resource on the server
    Cp {
        source: String,
        destination: String,
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Move a resource on the server
    Mv {
        source: String,
        destination: String,
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Lock a resource and print the token
    Lock { path: String },
    /// Release a lock
    Unlock { path: String, token: String },
    /// Delete every child of a directory ("" for the root)
    Cleanup {
        #[arg(default_value = "")]
        dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.url {
        config.webdav_base_url = url;
    }
    if let Some(username) = cli.username {
        config.webdav_username = username;
    }
    if let Some(password) = cli.password {
        config.webdav_password = password;
    }
    if let Some(server_type) = cli.server_type {
        config.server_type = server_type;
    }

    let connection = WebDAVConnection::new(config.webdav_config())
        .context("Failed to create WebDAV client")?;

    let service = WebDAVService::new(connection);

    match cli.command {
        Commands::Check => {
            let result = service.transport().test_connection().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                bail!("{}", result.message);
            }
        }
        Commands::Demo { file } => run_demo(&service, &file).await?,
        Commands::Ls { path } => {
            for name in service.list_folder(&path).await? {
                println!("{}", name);
            }
        }
        Commands::Describe { path, json } => {
            let description = service.describe(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&description)?);
            } else {
                println!("{}", description);
            }
        }
        Commands::Mkdir { path } => service.create_directory(&path).await?,
        Commands::Rmdir { path } => service.delete_directory(&path).await?,
        Commands::Rm { path } => service.delete_file(&path).await?,
        Commands::Put { local, remote } => {
            let mut file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("Cannot open {}", local.display()))?;
            service.upload_file(&remote, &mut file).await?;
        }
        Commands::Get { remote, output } => {
            let mut content = service.download_stream(&remote).await?;
            match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Cannot create {}", path.display()))?;
                    let copied = tokio::io::copy(&mut content, &mut file).await?;
                    file.flush().await?;
                    info!("⬇️ Wrote {} bytes to {}", copied, path.display());
                }
                None => {
                    // stdout carries the file content, so nothing is logged here
                    let mut stdout = tokio::io::stdout();
                    tokio::io::copy(&mut content, &mut stdout).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Cp {
            source,
            destination,
            no_overwrite,
        } => report_transfer(service.copy(&source, &destination, !no_overwrite).await?),
        Commands::Mv {
            source,
            destination,
            no_overwrite,
        } => report_transfer(service.move_resource(&source, &destination, !no_overwrite).await?),
        Commands::Lock { path } => match service.lock(&path).await? {
            Some(token) => println!("{}", token),
            None => bail!("{} does not exist", path),
        },
        Commands::Unlock { path, token } => service.unlock(&path, &LockToken::new(token)).await?,
        Commands::Cleanup { dir } => {
            let deleted = service.cleanup_directory(&dir).await?;
            println!("Deleted {} resources", deleted);
        }
    }

    Ok(())
}

fn report_transfer(outcome: TransferOutcome) {
    match outcome {
        TransferOutcome::Completed => println!("done"),
        TransferOutcome::SourceMissing => println!("skipped: source does not exist"),
        TransferOutcome::DestinationExists => println!("skipped: destination already exists"),
    }
}

async fn check_exists(service: &WebDAVService, path: &str) {
    if service.exists(path).await {
        info!("'{}' exists", path);
    } else {
        info!("'{}' does not exist", path);
    }
}

/// Replays the full walkthrough: cleanup, mkdir/rmdir, upload, copy,
/// download, move and lock/unlock.
async fn run_demo(service: &WebDAVService, local_file: &Path) -> Result<()> {
    service.cleanup_directory("").await?;
    check_exists(service, "").await;

    service.create_directory("AAA").await?;
    check_exists(service, "AAA").await;

    service.delete_directory("AAA").await?;
    check_exists(service, "AAA").await;

    let xml_file = "a/b/c/test.xml";
    {
        let mut stream = tokio::fs::File::open(local_file)
            .await
            .with_context(|| format!("Cannot open {}", local_file.display()))?;
        service.upload_file(xml_file, &mut stream).await?;
    }
    check_exists(service, xml_file).await;

    let copied_file = "aa/bb/cc/test.xml";
    service.copy(xml_file, copied_file, true).await?;
    check_exists(service, copied_file).await;

    let downloaded = service.get_file_as_string(copied_file).await?;
    info!("Downloaded file from webdav: {}", downloaded);

    let moved_file = "aaa/bbb/ccc/test.xml";
    service.move_resource(xml_file, moved_file, true).await?;
    check_exists(service, xml_file).await;
    check_exists(service, moved_file).await;

    match service.lock(moved_file).await? {
        Some(token) => {
            info!("Lock token for '{}' is: {}", moved_file, token);
            service.unlock(moved_file, &token).await?;
        }
        None => error!("'{}' vanished before it could be locked", moved_file),
    }

    Ok(())
}
