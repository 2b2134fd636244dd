use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use core::{num::NonZeroUsize, time::Duration};
use std::path::PathBuf;
use tilecast::{PoolConfig, TileCoord};

/// Runtime configuration for the `tilecast-server` binary.
///
/// Every option can also be supplied through the environment (and therefore
/// through a `.env` file). The pool options apply to both subcommands.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tilecast-server",
    version,
    about = "Serve map tiles from a fixed pool of exclusive renderer contexts"
)]
pub struct CliArgs {
    /// Style file every renderer context is loaded from.
    ///
    /// Environment variable: `TILECAST_STYLE`
    #[arg(long, env = "TILECAST_STYLE")]
    pub style: String,

    /// Number of renderer workers, each owning one renderer context.
    ///
    /// This is also the maximum number of tiles rendered at once; further
    /// requests wait for a free worker. Defaults to the number of CPUs.
    ///
    /// Environment variable: `TILECAST_WORKERS`
    #[arg(long, env = "TILECAST_WORKERS")]
    pub workers: Option<usize>,

    /// Give up on a tile after this many milliseconds (including time spent
    /// waiting for a free worker). Unset means wait indefinitely.
    ///
    /// Environment variable: `TILECAST_RENDER_TIMEOUT_MS`
    #[arg(long, env = "TILECAST_RENDER_TIMEOUT_MS")]
    pub render_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve `/{z}/{x}/{y}.{format}` tiles over HTTP.
    Serve(ServeArgs),
    /// Render a single tile to a file and exit.
    Render(RenderArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `TILECAST_ADDR`
    #[arg(long, env = "TILECAST_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub addr: String,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// The file name to write the output to.
    #[arg(long, default_value = "tile.pbf")]
    pub output_file: PathBuf,

    /// Tile to render, as a `/z/x/y.fmt` path.
    #[arg(default_value = "/0/0/0.pbf")]
    pub tile: String,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Serve { addr: String },
    Render { coord: TileCoord, output_file: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pool: PoolConfig,
    pub render_timeout: Option<Duration>,
    pub mode: Mode,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.style.trim().is_empty() {
            bail!("TILECAST_STYLE must not be empty");
        }

        let render_timeout = match args.render_timeout_ms {
            Some(0) => bail!("TILECAST_RENDER_TIMEOUT_MS must be greater than 0"),
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        let (workers, mode) = match args.command {
            Command::Serve(serve) => (
                args.workers.unwrap_or_else(num_cpus::get),
                Mode::Serve { addr: serve.addr },
            ),
            // A single tile only ever needs one renderer.
            Command::Render(render) => {
                let coord = TileCoord::parse(&render.tile)
                    .with_context(|| format!("invalid tile path {:?}", render.tile))?;
                (
                    1,
                    Mode::Render {
                        coord,
                        output_file: render.output_file,
                    },
                )
            }
        };

        let Some(worker_count) = NonZeroUsize::new(workers) else {
            bail!("TILECAST_WORKERS must be greater than 0");
        };

        Ok(Self {
            pool: PoolConfig::new(args.style, worker_count),
            render_timeout,
            mode,
        })
    }
}
