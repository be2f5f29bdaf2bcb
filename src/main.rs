use clap::Parser;

fn main() {
  let cli = pawlette::cli::Cli::parse();

  let paths = match pawlette::paths::Paths::from_env() {
    Ok(paths) => paths,
    Err(err) => {
      eprintln!("pawlette: {err}");
      std::process::exit(1);
    }
  };
  let config = pawlette::config::Config::load(&paths.config_file);
  let _log_guard = pawlette::logging::init(&config.logging, &paths.app_state_dir);

  if let Err(err) = pawlette::run(cli, &paths, &config) {
    eprintln!("pawlette: {err}");
    std::process::exit(1);
  }
}
