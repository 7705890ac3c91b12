mod cli;

use chef_facts::cookbook_files::CookbookFiles;
use chef_facts::syntax::{self, Grammar};
use serde::Serialize;
use std::io::Write;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CHEF_FACTS_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Extract(extract_cli) => extract(extract_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn extract(cli: cli::ExtractCommand) -> anyhow::Result<()> {
    let cookbook = chef_facts::extract(&cli.cookbook)?;

    match &cli.out {
        Some(path) => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            output(&cli.output, &cookbook, &mut file)?;
            file.flush()?;
            tracing::info!(path = %path.display(), "fact document written");
        }
        None => output(&cli.output, &cookbook, &mut std::io::stdout())?,
    }

    if cli.summary {
        let mut stdout = std::io::stdout();
        serde_json::to_writer(&mut stdout, cookbook.coverage())?;
        writeln!(stdout)?;
    }

    Ok(())
}

fn output(
    output: &cli::OutputArgs,
    value: &impl Serialize,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(&mut *writer, value)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, value)?;
            writeln!(writer)?;
        }
    };

    Ok(())
}

/// (chef-facts-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    match cli.command {
        Files => {
            let files = CookbookFiles::locate(&std::env::current_dir()?)?;
            println!("{files:#?}");
        }
        Tree { file } => {
            let grammar = match file.extension() {
                Some(extension) if extension == "erb" => Grammar::EmbeddedTemplate,
                _ => Grammar::Ruby,
            };
            let tree = syntax::parse(std::fs::read_to_string(&file)?, grammar)?;
            println!("{}", tree.root().to_sexp());
            if let Err(error) = tree.check() {
                eprintln!("{error}");
            }
        }
    }

    Ok(())
}
