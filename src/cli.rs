use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytscribe",
    about = "YouTube transcript web service",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Config file (default: ~/.config/ytscribe/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
