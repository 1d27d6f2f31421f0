use std::process;

use log::{LevelFilter, Metadata, Record};
use stagenet::{
    blas::GemmBackend,
    tensor::{compare::{self, Mismatch, DEFAULT_PRECISION}, tensor_file},
    EngineConfig, EngineError, Stage, StageLoader, Tensor,
};

const USAGE: &str = "usage: stagenet <model> <input-tensor> [--output <file>] [--golden <file>] \
[--precision <p>] [--image-dim <n>] [--threads <n>] [--naive] [--verbose]";

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

struct Args {
    model: String,
    input: String,
    output: Option<String>,
    golden: Option<String>,
    precision: f32,
    image_dim: Option<usize>,
    threads: Option<usize>,
    naive: bool,
    verbose: bool,
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
    value.parse().map_err(|_| format!("invalid value for {}: {}", flag, value))
}

fn parse_args() -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut args = Args {
        model: String::new(),
        input: String::new(),
        output: None,
        golden: None,
        precision: DEFAULT_PRECISION,
        image_dim: None,
        threads: None,
        naive: false,
        verbose: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--output" => args.output = Some(parse_value("--output", iter.next())?),
            "--golden" => args.golden = Some(parse_value("--golden", iter.next())?),
            "--precision" => args.precision = parse_value("--precision", iter.next())?,
            "--image-dim" => args.image_dim = Some(parse_value("--image-dim", iter.next())?),
            "--threads" => args.threads = Some(parse_value("--threads", iter.next())?),
            "--naive" => args.naive = true,
            "--verbose" => args.verbose = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ => positional.push(arg),
        }
    }

    if positional.len() != 2 {
        return Err(USAGE.to_string());
    }
    args.input = positional.pop().unwrap_or_default();
    args.model = positional.pop().unwrap_or_default();
    Ok(args)
}

fn engine_config(args: &Args) -> Result<EngineConfig, EngineError> {
    let mut config = EngineConfig::default();
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.naive {
        config.gemm_backend = GemmBackend::Naive;
    }
    config.build()
}

// Returns whether the output matched the golden tensor, true when there is none
fn run(args: &Args) -> Result<bool, EngineError> {
    let config = engine_config(args)?;
    config.install();

    let model = StageLoader::with_config(&config).load_model_or_exit(&args.model)?;
    println!("{}", model.summary());

    let input = tensor_file::load_from_file(&args.input)?;
    log::info!("Input tensor {} from {}", input, args.input);

    let output: Tensor = match args.image_dim {
        Some(dim) => model.forward_image(input.data(), dim)?,
        None => model.forward_prop(&input.into())?.into_tensor("Sequential")?,
    };
    println!("Output: {}", output);

    if let Some(path) = &args.output {
        tensor_file::save_to_file(&output, path)?;
        log::info!("Saved output to {}", path);
    }

    let Some(path) = &args.golden else {
        return Ok(true);
    };
    let golden = tensor_file::load_from_file(path)?;
    match compare::first_mismatch(&output, &golden, args.precision) {
        None => {
            println!("Output matches {} (precision {})", path, args.precision);
            Ok(true)
        },
        Some(Mismatch::Size { actual, expected }) => {
            println!("Output shape {:?} differs from golden shape {:?}", actual, expected);
            Ok(false)
        },
        Some(Mismatch::Value { index, actual, expected }) => {
            println!("Output differs from golden at element {}: {} vs {}", index, actual, expected);
            Ok(false)
        },
    }
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    match run(&args) {
        Ok(true) => {},
        Ok(false) => process::exit(1),
        Err(e) => {
            let prefix = if e.is_fatal() { "Fatal: " } else { "" };
            log::error!("{}{}", prefix, e);
            process::exit(1);
        }
    }
}
