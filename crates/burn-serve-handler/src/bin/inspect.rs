use burn_serve_handler::cli::parse_handler_args;
use burn_serve_handler::{SystemProbe, inspect};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = parse_handler_args();
    let (ctx, config) = args.into_context()?;
    let report = inspect(&ctx, &config, &SystemProbe)?;

    if let Some(acceleration) = &report.acceleration {
        for (key, value) in acceleration.env_vars() {
            log::info!("Runtime should set {key}={value}");
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
