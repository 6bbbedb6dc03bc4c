use colored::*;
use eyre::Result;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "buildlog Configuration".bold());
            println!();

            println!("{}:", "output".cyan());
            println!("  target: {:?}", config.output.target);
            match &config.output.path {
                Some(path) => println!("  path: {}", path.display()),
                None => println!("  path: {}", "(none)".dimmed()),
            }
            println!("  append: {}", config.output.append);
            println!();

            let charset = match config.charset {
                Some(charset) => charset.to_string(),
                None => format!("{} (default)", buildlog::Charset::platform_default()),
            };
            println!("{}: {}", "charset".cyan(), charset);
            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
            println!("{}: {}", "log_dir".cyan(), Config::log_dir().display());
        }
    }

    Ok(())
}
