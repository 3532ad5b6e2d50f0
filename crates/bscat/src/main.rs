use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use bytestream::{ByteCounting, ByteStream, ByteStreamOptions, ScanCounters};
use bytestream_error::{Result, ResultExt};
use bytestream_rt_native::native_dispatch;
use clap::Parser;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[clap(name = "bscat")]
struct Arguments {
    /// Location to read. A local path, `file://` url, or `http(s)://` url.
    location: String,

    /// Offset to start reading from.
    #[clap(long, default_value_t = 0)]
    offset: u64,

    /// Max number of bytes to read. Reads until end of file if omitted.
    #[clap(long)]
    length: Option<u64>,

    /// Number of bytes requested per read.
    #[clap(long, default_value_t = 64 * 1024)]
    chunk_size: usize,

    /// How reads are counted towards the reported byte total.
    #[clap(long, env = "BSCAT_BYTE_COUNTING", default_value_t = ByteCounting::CompletedReads)]
    byte_counting: ByteCounting,

    /// Print read stats to stderr after closing the stream.
    #[clap(long)]
    stats: bool,

    /// Default log level if RUST_LOG isn't set.
    #[clap(long, env = "BSCAT_LOG_LEVEL", default_value_t = Level::WARN)]
    log_level: Level,

    /// Log output format, 'human' or 'json'.
    #[clap(long, env = "BSCAT_LOG_FORMAT", default_value = "human")]
    log_format: logutil::LogFormat,
}

/// Stream a single location to stdout.
fn main() {
    let args = Arguments::parse();
    logutil::configure_global_logger(args.log_level, args.log_format, io::stderr);

    if let Err(err) = run(args) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(args: Arguments) -> Result<()> {
    if args.chunk_size == 0 {
        return Err(bytestream_error::StreamError::with_kind(
            bytestream_error::ErrorKind::InvalidInput,
            "Chunk size must be greater than zero",
        ));
    }

    let dispatch = native_dispatch(ByteStreamOptions {
        byte_counting: args.byte_counting,
    });
    let counters = Arc::new(ScanCounters::new());

    let mut stream = dispatch.open_stream(&args.location, Some(counters.clone()))?;
    if args.offset != 0 {
        stream.seek(args.offset)?;
    }

    let mut stdout = BufWriter::new(io::stdout().lock());
    let delivered = copy_stream(&mut stream, &mut stdout, args.chunk_size, args.length)?;
    stdout.flush().context("Failed to flush stdout")?;

    let eof = stream.eof()?;
    stream.close()?;
    info!(location = %args.location, delivered, "finished reading");

    if args.stats {
        eprintln!("delivered: {delivered}");
        eprintln!("bytes_read: {}", counters.bytes_read());
        eprintln!("eof: {eof}");
    }

    Ok(())
}

/// Copy from the stream into `out` in chunks until either `limit` bytes have
/// been delivered or end of file is reached.
fn copy_stream(
    stream: &mut dyn ByteStream,
    out: &mut impl Write,
    chunk_size: usize,
    limit: Option<u64>,
) -> Result<u64> {
    let mut buf = vec![0; chunk_size];
    let mut delivered = 0;

    loop {
        let want = match limit {
            Some(limit) => u64::min(limit - delivered, chunk_size as u64) as usize,
            None => chunk_size,
        };
        if want == 0 {
            return Ok(delivered);
        }

        let n = stream.read(&mut buf[..want])?;
        out.write_all(&buf[..n]).context("Failed to write to output")?;
        delivered += n as u64;

        if n < want {
            // End of file.
            return Ok(delivered);
        }
    }
}
