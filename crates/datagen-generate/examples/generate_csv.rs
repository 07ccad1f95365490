use std::env;
use std::path::PathBuf;

use datagen_generate::{DataGeneratorService, ExportConfiguration, GenerateOptions};
use datagen_plan::{compile_plan, load_plan};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut plan_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut instances = 10_u64;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--plan" => plan_path = args.next().map(PathBuf::from),
            "--out" => out_path = args.next().map(PathBuf::from),
            "--instances" => {
                instances = args.next().ok_or("missing --instances value")?.parse()?;
            }
            _ => {
                if plan_path.is_none() {
                    plan_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let plan_path = plan_path.ok_or("missing --plan path")?;
    let validated = load_plan(&plan_path)?;
    let compiled = compile_plan(&validated.plan)?;

    let mut options = GenerateOptions::default();
    if let Some(seed) = compiled.seed {
        options.seed = seed;
    }

    let mut config = ExportConfiguration::new(out_path.unwrap_or_else(|| PathBuf::from("out.csv")));
    config.export_feature_names = true;

    let service = DataGeneratorService::from_plan(&compiled, options);
    let report = service.generate_data(instances, &config)?.join()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
