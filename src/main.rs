use clap::Parser;
use objseg::{
    config::JobConfig,
    job::{JobContext, LogReporter},
    pipeline,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = JobConfig::parse();

    log::info!(
        "Starting object segmentation of {:?} at threshold {}",
        config.source_dir,
        config.probability_threshold
    );

    let mut ctx = JobContext::new(LogReporter);
    pipeline::run(
        &mut ctx,
        &config.workflow(),
        &config.data_store(),
        &config.classifier(),
        &config.extractor(),
    )?;

    log::info!("Results saved to {:?}", config.results_dir);
    Ok(())
}
