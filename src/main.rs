use std::fs::File;
use std::io::{self, BufWriter};

use log::*;

mod cli;

use cli::Cli;
use digit_mlp::loader::NUM_CLASSES;
use digit_mlp::{Error, Mlp, Result, eval, pipeline};

fn main() {
    let cli = cli::init();
    if let Err(e) = run(&cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let sizes = cli.layer_sizes(NUM_CLASSES)?;
    let train_cfg = cli.train_config()?;
    let prepared = pipeline::prepare(&cli.pipeline_config())?;

    let mlp = match &cli.load_model {
        Some(dir) => Mlp::load_with_sizes(dir, &sizes)?,
        None => {
            let mut mlp = Mlp::new_with_seed(&sizes, cli.seed)?;
            let report = mlp.train(&prepared.train, train_cfg)?;
            info!(
                "finished training after {} epochs (loss {:.6}, converged: {})",
                report.epochs(),
                report.final_loss(),
                report.converged
            );
            mlp
        }
    };

    match &cli.submission {
        Some(path) => {
            let predictions = eval::predict_classes(&mlp, &prepared.test)?;
            if path.as_os_str() == "-" {
                eval::write_submission(io::stdout().lock(), &predictions)?;
            } else {
                let file = File::create(path)
                    .map_err(|e| Error::Io(format!("failed to create {}: {e}", path.display())))?;
                eval::write_submission(BufWriter::new(file), &predictions)?;
            }
        }
        None => {
            let report = eval::evaluate(&mlp, &prepared.holdout)?;
            println!("Result: {:.2}%", 100.0 * report.accuracy());
        }
    }

    if let Some(dir) = &cli.save_model {
        mlp.save(dir)?;
    }
    Ok(())
}
