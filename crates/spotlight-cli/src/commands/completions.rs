//! Shell completions command

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, CommandFactory};
use clap_complete::{generate, generate_to, Shell};

use crate::Cli;

#[derive(Args)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script into this directory instead of stdout
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn run(args: &CompletionsArgs) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    match &args.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let path = generate_to(args.shell, &mut cmd, &bin, dir)
                .with_context(|| format!("writing {} completions", args.shell))?;
            println!("{}", path.display());
        }
        None => generate(args.shell, &mut cmd, bin, &mut io::stdout()),
    }
    Ok(())
}
