use clap::Parser;
use correspondence_dataset::config::DumpConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one batch-job script (and its run configuration) per dataset
/// name, each invoking `cords` on that dataset.
#[derive(Parser)]
#[command(version, about, author)]
struct JobsCli {
    /// template run configuration JSON
    config: String,

    /// file listing dataset names, one per line
    datasets: String,

    /// root directory containing one sub-directory per dataset
    #[arg(long)]
    data_root: String,

    /// output directory for job scripts
    #[arg(long, default_value = "jobs/todo")]
    output: String,
}

fn main() -> correspondence_dataset::Result<()> {
    env_logger::init();
    let cli = JobsCli::parse();

    let template = DumpConfig::from_json_file(Path::new(&cli.config))?;
    let names: Vec<String> = fs::read_to_string(&cli.datasets)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let output_dir = PathBuf::from(&cli.output);
    fs::create_dir_all(&output_dir)?;

    for name in &names {
        let mut config = template.clone();
        for split_cfg in config.splits.iter_mut() {
            split_cfg.dataset_name = name.clone();
            split_cfg.data_dir = PathBuf::from(&cli.data_root)
                .join(name)
                .join(split_cfg.split.dir_name());
        }

        let config_path = output_dir.join(format!("{}.json", name));
        fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

        let script_path = output_dir.join(format!("{}.sh", name));
        let mut script = String::new();
        script += "#!/bin/bash\n";
        script += "set -e\n";
        script += format!("cords {}\n", config_path.display()).as_str();
        fs::write(&script_path, script)?;
    }

    println!("wrote {} job scripts to {}", names.len(), output_dir.display());
    Ok(())
}
