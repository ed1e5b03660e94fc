use derivation::alternate;
use env_logger::Env;
use log::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let derivation = alternate().inspect_err(|e| error!("derivation failed: {}", e))?;
    println!("{}", derivation);
    Ok(())
}
