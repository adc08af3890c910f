use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "config.json")]
    pub config: String,

    /// Serial port of the sensor, overrides the config
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate, overrides the config
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Maximum nearest-neighbour distance accepted as a match
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Fingerprint library file, overrides the config
    #[arg(short, long)]
    pub store: Option<String>,

    /// Forward identified objects back over the serial link
    #[arg(long, default_value_t = false)]
    pub forward: bool,

    /// Print the per-wavelength values panel for every frame
    #[arg(long, default_value_t = false)]
    pub values: bool,

    /// List available serial ports
    #[arg(long)]
    pub list: bool,
}

impl Args {
    /// Applies command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut crate::config::AppConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(threshold) = self.threshold {
            config.classifier.distance_threshold = threshold;
        }
        if let Some(store) = &self.store {
            config.store.path = store.clone();
        }
        if self.forward {
            config.output.forward_results = true;
        }
        if self.values {
            config.output.show_values = true;
        }
    }
}
