//! Server configuration from flags and environment

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use wetland_cloud::AcquisitionOptions;

/// Command-line interface of the server binary
#[derive(Parser, Debug, Clone)]
#[command(name = "wetland-server")]
#[command(author, version, about = "Wetland erosion and nutrient benefit API", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "WETLAND_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Directory receiving per-job artifacts
    #[arg(long, env = "WETLAND_OUTPUT_DIR", default_value = "data/outputs")]
    pub output_dir: PathBuf,

    /// Elevation export timeout in seconds
    #[arg(long, env = "WETLAND_FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    /// Target working resolution in metres
    #[arg(long, env = "WETLAND_CELL_SIZE", default_value_t = 10.0)]
    pub cell_size: f64,

    /// Largest working grid side in cells
    #[arg(long, env = "WETLAND_MAX_GRID_DIM", default_value_t = 1024)]
    pub max_grid_dim: usize,

    /// Padding around the polygon as a fraction of its larger extent
    #[arg(long, env = "WETLAND_BUFFER_FRACTION", default_value_t = 0.5)]
    pub buffer_fraction: f64,

    /// Force a UTM working zone (EPSG 326xx/327xx)
    #[arg(long, env = "WETLAND_WORKING_EPSG")]
    pub working_epsg: Option<u32>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved settings handed to the job manager
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub output_dir: PathBuf,
    pub acquisition: AcquisitionOptions,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            output_dir: self.output_dir,
            acquisition: AcquisitionOptions {
                cell_size: self.cell_size,
                max_grid_dim: self.max_grid_dim,
                buffer_fraction: self.buffer_fraction,
                working_epsg: self.working_epsg,
                timeout: Duration::from_secs(self.fetch_timeout_secs),
            },
        }
    }
}

impl ServerConfig {
    /// Defaults with artifacts under `output_dir`
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            output_dir: output_dir.into(),
            acquisition: AcquisitionOptions::default(),
        }
    }
}
