use clap::Parser;
use correspondence_dataset::config::DumpConfig;
use correspondence_dataset::data_loader::load_split_dir;
use correspondence_dataset::dump::dump_split;
use correspondence_dataset::extract::GridPatchExtractor;
use std::path::Path;
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct CordsCli {
    /// path to the run configuration JSON
    config: String,

    /// override the dump prefix directory
    #[arg(long)]
    dump_prefix: Option<String>,

    /// override the precomputed keypoint source name
    #[arg(long)]
    kp_source: Option<String>,

    /// load images as grayscale
    #[arg(long)]
    grayscale: bool,
}

fn main() -> correspondence_dataset::Result<()> {
    env_logger::init();
    let cli = CordsCli::parse();

    let mut config = DumpConfig::from_json_file(Path::new(&cli.config))?;
    if let Some(prefix) = cli.dump_prefix {
        config.dump_prefix = prefix.into();
    }
    if let Some(source) = cli.kp_source {
        config.precomputed_kp_source = Some(source);
    }

    let extractor = GridPatchExtractor::new(config.num_keypoints);
    let now = Instant::now();
    for split_cfg in &config.splits {
        let data = load_split_dir(
            &split_cfg.data_dir,
            config.crop_center,
            !cli.grayscale,
            config.precomputed_kp_source.as_deref(),
        )?;
        let outcome = dump_split(&config, split_cfg, &data, &extractor)?;
        if outcome.skipped {
            println!(
                "{} ({}): already ready",
                split_cfg.dataset_name,
                split_cfg.split.tag()
            );
        } else {
            println!(
                "{} ({}): {} label tuples -> {}",
                split_cfg.dataset_name,
                split_cfg.split.tag(),
                outcome.pairs_built,
                outcome.output_dir.display()
            );
        }
    }
    println!("dump took {:.6} sec", now.elapsed().as_secs_f64());
    Ok(())
}
