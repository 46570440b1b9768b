//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use confdl_core::Quality;

/// Bulk download conference session videos, slides and sample code.
///
/// Without options, downloads all available streamed HD videos into the
/// output directory, resuming partial downloads and skipping files already
/// present.
#[derive(Parser, Debug)]
#[command(name = "confdl")]
#[command(author, version, about)]
pub struct Args {
    /// Download 1080p streamed video (segmented; requires ffmpeg to assemble)
    #[arg(long, conflicts_with_all = ["hd720", "sd"])]
    pub hd1080: bool,

    /// Download 720p progressive video files
    #[arg(long, conflicts_with = "sd")]
    pub hd720: bool,

    /// Download SD progressive video files
    #[arg(long)]
    pub sd: bool,

    /// Also download session slide PDFs
    #[arg(long)]
    pub pdf: bool,

    /// Download only slide PDFs (no videos)
    #[arg(long)]
    pub pdf_only: bool,

    /// Also download sample-code archives
    #[arg(long)]
    pub sample: bool,

    /// Download only sample-code archives (no videos)
    #[arg(long)]
    pub sample_only: bool,

    /// Restrict the run to these session numbers
    #[arg(short = 's', long = "sessions", num_args = 1.., value_name = "ID")]
    pub sessions: Vec<String>,

    /// List sessions and titles without downloading anything
    #[arg(short = 'l', long)]
    pub list_only: bool,

    /// Directory downloads land in
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Conference edition slug on the catalog site
    #[arg(long, default_value = "wwdc2018")]
    pub edition: String,

    /// Catalog site base URL
    #[arg(long, default_value = "https://developer.apple.com")]
    pub base_url: String,

    /// Give up on a transfer after this many attempts (0 = retry forever,
    /// the default policy)
    #[arg(short = 'r', long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub max_retries: u32,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// The requested video quality (default: streamed 1080p).
    pub fn quality(&self) -> Quality {
        if self.hd720 {
            Quality::Hd720
        } else if self.sd {
            Quality::Sd
        } else {
            Quality::Hd1080
        }
    }

    /// Whether videos should be fetched at all.
    pub fn want_video(&self) -> bool {
        !self.pdf_only && !self.sample_only && !self.list_only
    }

    /// Whether slide PDFs should be fetched.
    pub fn want_pdf(&self) -> bool {
        self.pdf || self.pdf_only
    }

    /// Whether sample-code archives should be fetched.
    pub fn want_sample(&self) -> bool {
        self.sample || self.sample_only
    }
}
