// SPDX-License-Identifier: CC0-1.0

use log::{error, info};

configure_me::include_config!();

#[tokio::main]
async fn main() {
    env_logger::init();

    let (config, _) = Config::including_optional_config_files::<&[&str]>(&[]).unwrap_or_exit();

    let cipher = match chacha_stream_cli::build_cipher(
        &config.key,
        &config.nonce,
        config.rounds,
        config.seek,
    ) {
        Ok(cipher) => cipher,
        Err(e) => {
            error!("Invalid parameters: {e}.");
            std::process::exit(1);
        }
    };

    let mut stdout = tokio::io::stdout();
    match chacha_stream_cli::xor_stream(cipher, tokio::io::stdin(), &mut stdout).await {
        Ok(bytes) => info!("Processed {} bytes.", bytes),
        Err(e) => {
            error!("Stream ended with error: {e}.");
            std::process::exit(1);
        }
    }
}
