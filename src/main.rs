use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use stroke_risk::batch::{self, BatchError};
use stroke_risk::config::StrokeConfig;
use stroke_risk::interactive::Prompter;
use stroke_risk::{
    train, ArtifactHandle, Confidence, Prediction, Record, ServeError, StrokeService,
    TrainingOptions, UnseenPolicy,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stroke risk prediction: train and serve", long_about = None)]
#[command(propagate_version = true)]
struct StrokeArgs {
    #[arg(short, long, help = "TOML config file")]
    config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count, help = "Verbose level")]
    verbose: u8,
    #[arg(long, global = true, help = "Model artifact path")]
    artifact: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the pipeline and classifier on a corpus and write the model artifact.
    Train {
        #[arg(long, help = "Training corpus (.csv or .parquet)")]
        corpus: Option<PathBuf>,
        #[arg(long, value_parser = parse_policy, help = "Unseen category policy: remap or reject")]
        unseen_policy: Option<UnseenPolicy>,
        #[arg(long, help = "Also write the encoded training matrix (.csv or .parquet)")]
        export_features: Option<PathBuf>,
    },
    /// Score one record given as name=value pairs.
    Predict {
        #[arg(short, long = "field", value_parser = parse_field, help = "Field as name=value")]
        fields: Vec<(String, String)>,
        #[arg(short, long, help = "Also print the stroke probability")]
        probability: bool,
    },
    /// Score every row of a CSV file.
    Batch {
        #[arg(short, long, help = "Input CSV with one record per row")]
        input: PathBuf,
        #[arg(short, long, help = "Output CSV (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Answer questions about one patient and get a prediction.
    Interactive,
}

fn parse_policy(s: &str) -> Result<UnseenPolicy, String> {
    match s.to_ascii_lowercase().as_str() {
        "remap" => Ok(UnseenPolicy::Remap),
        "reject" => Ok(UnseenPolicy::Reject),
        other => Err(format!("unknown policy '{other}', expected remap or reject")),
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = StrokeArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    let mut config = StrokeConfig::load(cli.config.as_deref())?;
    if let Some(artifact) = cli.artifact {
        config.artifact_path = artifact;
    }

    match cli.command {
        Command::Train {
            corpus,
            unseen_policy,
            export_features,
        } => {
            let options = TrainingOptions {
                corpus_path: corpus.unwrap_or(config.corpus_path),
                artifact_path: config.artifact_path,
                unseen_policy: unseen_policy.unwrap_or(config.unseen_policy),
                export_features,
            };
            let start_time = Instant::now();
            let report = tokio::task::spawn_blocking(move || train(&options)).await??;
            info!(
                "Model trained on {} rows, training accuracy {:.4}",
                report.rows, report.training_accuracy
            );
            println!("Model trained and saved successfully!");
            println!("Time elapsed in training is: {:?}", start_time.elapsed());
        }
        Command::Predict {
            fields,
            probability,
        } => {
            let service = service_for(&config);
            let record: Record = fields.into_iter().collect();
            let confidence = if probability {
                Confidence::WithProbability
            } else {
                Confidence::LabelOnly
            };
            let prediction = service.predict(&record, confidence);
            print_prediction(prediction);
        }
        Command::Batch { input, output } => {
            let service = service_for(&config);
            let result = tokio::task::spawn_blocking(move || {
                let reader = BufReader::new(File::open(&input)?);
                match output {
                    Some(path) => batch::score_csv(&service, reader, File::create(path)?),
                    None => batch::score_csv(&service, reader, io::stdout().lock()),
                }
            })
            .await?;
            match result {
                Ok(summary) => {
                    eprintln!("{} rows scored, {} failed", summary.scored, summary.failed)
                }
                Err(BatchError::NotReady(e)) => report_not_ready(&e.into()),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Interactive => {
            let service = service_for(&config);
            if let Err(e) = service.handle().ensure_loaded() {
                report_not_ready(&e.into());
            }
            let stdin = io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), io::stdout());
            let record = prompter.collect_record()?;
            match service.predict(&record, Confidence::WithProbability) {
                Ok(prediction) => prompter.report(&prediction)?,
                Err(e) => print_prediction(Err(e)),
            }
        }
    }

    Ok(())
}

fn service_for(config: &StrokeConfig) -> StrokeService {
    StrokeService::new(Arc::new(ArtifactHandle::new(&config.artifact_path)))
}

fn report_not_ready(e: &ServeError) -> ! {
    eprintln!("Model not loaded. Please train the model first. ({e})");
    process::exit(2);
}

fn print_prediction(prediction: Result<Prediction, ServeError>) {
    match prediction {
        Ok(p) => {
            println!("{}", p.label);
            if let Some(probability) = p.probability {
                println!("Probability of stroke: {:.4}", probability);
            }
        }
        Err(e @ ServeError::ModelNotReady(_)) => report_not_ready(&e),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
