mod cli;

use std::io;

use clap::Parser;
use cli::Cli;
use xv6fs::Geometry;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nout={:?}", cli.source, cli.out);

    let geometry = Geometry {
        size: cli.size,
        ninodes: cli.inodes,
        ..Geometry::default()
    };
    let mut fs = xv6fs_fuse::create_image(&cli.out, geometry)?;

    let copied = xv6fs_fuse::pack(&mut fs, &cli.source, "/")?;
    println!("packed {copied} files, {} blocks free", fs.free_blocks());

    Ok(())
}
