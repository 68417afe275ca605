pub mod barcode; // Multi-pass barcode decode over a remote recognizer
pub mod config;
pub mod nutrition; // Provider payload → canonical serving nutrition

pub use barcode::{is_valid_upc_ean, upc_format, BarcodeDecoder, DecodeResult};
pub use config::ScanConfig;
pub use nutrition::{assess_health, HealthReport, MacroMode, NormalizedNutrition, NutrientNormalizer};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to [`config::default_log_filter`].
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} tracing initialized", config::APP_NAME, config::APP_VERSION);
    }
}
