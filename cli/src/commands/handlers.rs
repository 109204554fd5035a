use loadpilot_core::api::{CliError, Pipeline, Principal};
use serde::Serialize;
use serde_json::json;

use super::cli::{Commands, PromptArgs};

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Command(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

async fn read_prompt(input: &PromptArgs) -> Result<String, CliError> {
    match (&input.prompt, &input.prompt_file) {
        (Some(p), _) => Ok(p.clone()),
        (None, Some(path)) => Ok(tokio::fs::read_to_string(path).await?),
        (None, None) => Err(CliError::Command(
            "either --prompt or --prompt-file is required".into(),
        )),
    }
}

/// Run one non-serve command and print its result as JSON.
pub async fn dispatch(
    cmd: Commands,
    pipeline: &Pipeline,
    principal: &Principal,
) -> Result<i32, CliError> {
    match cmd {
        Commands::Generate(args) => {
            let prompt = read_prompt(&args.input).await?;
            let plan = match args.max_attempts {
                Some(n) => {
                    pipeline
                        .generate_plan_with_attempts(principal, &prompt, n)
                        .await?
                }
                None => pipeline.generate_plan(principal, &prompt).await?,
            };
            print_json(&plan)?;
        }
        Commands::Run(args) => {
            let run = pipeline.run_test(principal, &args.filename).await?;
            print_json(&run)?;
        }
        Commands::Analyze(args) => {
            let report = pipeline.analyze_results(principal, &args.filename).await?;
            print_json(&report)?;
        }
        Commands::List(args) => {
            let files = pipeline.list_artifacts(principal, args.kind.into()).await?;
            print_json(&json!({ "files": files }))?;
        }
        Commands::Url(args) => {
            let url = pipeline.download_url(principal, &args.filename).await?;
            print_json(&json!({ "url": url }))?;
        }
        Commands::Pipeline(args) => {
            let prompt = read_prompt(&args).await?;
            let report = pipeline.run_end_to_end(principal, &prompt).await?;
            print_json(&report)?;
        }
        Commands::Serve(_) => {
            return Err(CliError::Command("serve is handled by the server".into()));
        }
    }
    Ok(0)
}
