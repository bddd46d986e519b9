use std::io::Write as _;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    corebook::logging::init().context("init logging")?;

    let cli = corebook::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let doi = match cli.doi {
        Some(doi) => doi,
        None => prompt_doi().context("read DOI")?,
    };
    let config = corebook::config::Config::from_env(&doi, cli.out, cli.epub)?;

    let summary = corebook::download::run(&config).await.context("download")?;
    tracing::info!(
        dir = %summary.book_dir.display(),
        chapters = summary.chapters,
        pages = summary.pages,
        epub = summary.epub.is_some(),
        "done"
    );
    println!("{}", summary.merged_pdf.display());

    Ok(())
}

fn prompt_doi() -> anyhow::Result<String> {
    eprint!("DOI: ");
    std::io::stderr().flush().context("flush prompt")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("read stdin")?;
    let doi = line.trim();
    if doi.is_empty() {
        anyhow::bail!("no DOI given");
    }
    Ok(doi.to_owned())
}
