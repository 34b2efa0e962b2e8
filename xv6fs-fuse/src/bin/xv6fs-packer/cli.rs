use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Host directory copied into the image root
    #[arg(long, short)]
    pub source: PathBuf,

    /// Image file to create
    #[arg(long, short)]
    pub out: PathBuf,

    /// Volume size in blocks
    #[arg(long, default_value_t = 1000)]
    pub size: u16,

    /// Number of inodes
    #[arg(long, default_value_t = 200)]
    pub inodes: u16,
}
