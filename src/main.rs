use clap::{App, Arg, ArgMatches, SubCommand};
use hmmclimate::config::{AnalysisConfig, StationDataset};
use hmmclimate::gen_seq::{self, Alphabet, FrequencyTable};
use hmmclimate::render::{Json, Render, Tsv};
use hmmclimate::{GaussianHmm, HmmClimateError, HmmConfig, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
#[macro_use]
extern crate log;

fn verbose() -> Arg<'static, 'static> {
    Arg::with_name("verbose")
        .short("v")
        .multiple(true)
        .help("Debug mode")
}

fn hmm_args(app: App<'static, 'static>) -> App<'static, 'static> {
    app.arg(
        Arg::with_name("states")
            .long("states")
            .short("k")
            .takes_value(true)
            .default_value("3")
            .help("Number of hidden states."),
    )
    .arg(
        Arg::with_name("max_iter")
            .long("max_iter")
            .takes_value(true)
            .default_value("1000")
            .help("Maximum number of Baum-Welch iterations."),
    )
    .arg(
        Arg::with_name("sort_states")
            .long("sort_states")
            .help("Relabel hidden states by ascending means."),
    )
}

fn subcommand_analyze() -> App<'static, 'static> {
    let app = SubCommand::with_name("analyze")
        .version("0.1")
        .about("Frequencies, candles, regime-shift matrix, and hidden states of a station.")
        .arg(verbose())
        .arg(
            Arg::with_name("dataset")
                .long("dataset")
                .short("d")
                .value_name("JSON")
                .takes_value(true)
                .help("Station dataset. Toritama 2023 if not supplied."),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .value_name("JSON")
                .takes_value(true)
                .help("Configuration of the analysis. Flags given explicitly override it."),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("32389")
                .help("Seed"),
        )
        .arg(
            Arg::with_name("hmm_seed")
                .long("hmm_seed")
                .takes_value(true)
                .help("Seed of the HMM initialization. Drawn from --seed if not supplied."),
        )
        .arg(
            Arg::with_name("seq_len")
                .long("seq_len")
                .takes_value(true)
                .default_value("1000")
                .help("Length of each synthetic DNA sequence."),
        )
        .arg(
            Arg::with_name("format")
                .long("format")
                .short("f")
                .takes_value(true)
                .default_value("tsv")
                .possible_values(&["tsv", "json"])
                .help("Output format."),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .takes_value(true)
                .default_value("1")
                .help("Number of threads"),
        );
    hmm_args(app)
}

fn subcommand_frequency() -> App<'static, 'static> {
    SubCommand::with_name("frequency")
        .version("0.1")
        .about("Generate a random sequence and print its symbol frequencies.")
        .arg(verbose())
        .arg(
            Arg::with_name("length")
                .long("length")
                .short("l")
                .takes_value(true)
                .default_value("1000")
                .help("Length of the sequence."),
        )
        .arg(
            Arg::with_name("alphabet")
                .long("alphabet")
                .takes_value(true)
                .default_value("ACGT")
                .help("Symbols to draw from."),
        )
        .arg(
            Arg::with_name("reference")
                .long("reference")
                .takes_value(true)
                .default_value("ACGT")
                .help("Symbols to report."),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("32389")
                .help("Seed"),
        )
}

fn subcommand_shift() -> App<'static, 'static> {
    SubCommand::with_name("shift")
        .version("0.1")
        .about("Print the regime-shift matrix of a series.")
        .arg(verbose())
        .arg(
            Arg::with_name("values")
                .long("values")
                .takes_value(true)
                .help("Comma separated series. Toritama 2023 if not supplied."),
        )
}

fn subcommand_decode() -> App<'static, 'static> {
    let app = SubCommand::with_name("decode")
        .version("0.1")
        .about("Fit a Gaussian HMM to a series and print the most likely hidden states.")
        .arg(verbose())
        .arg(
            Arg::with_name("values")
                .long("values")
                .takes_value(true)
                .required(true)
                .help("Comma separated series."),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .help("Seed of the initialization. Random if not supplied."),
        );
    hmm_args(app)
}

fn parse<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let value = matches
        .value_of(name)
        .ok_or_else(|| HmmClimateError::InvalidInput(format!("--{} is required", name)))?;
    value
        .parse()
        .map_err(|_| HmmClimateError::InvalidInput(format!("--{}: can not parse {}", name, value)))
}

fn parse_values(values: &str) -> Result<Vec<f64>> {
    values
        .split(',')
        .map(|x| {
            x.trim()
                .parse()
                .map_err(|_| HmmClimateError::InvalidInput(format!("can not parse {} as a number", x)))
        })
        .collect()
}

fn hmm_config(matches: &ArgMatches) -> Result<HmmConfig> {
    let config = HmmConfig::new(parse(matches, "states")?, parse(matches, "max_iter")?)
        .sorted(matches.is_present("sort_states"));
    match matches.value_of("seed") {
        Some(_) => Ok(config.with_seed(parse(matches, "seed")?)),
        None => Ok(config),
    }
}

// Values of flags left at their defaults do not override the configuration file.
fn given<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    if 0 < matches.occurrences_of(name) {
        parse(matches, name).map(Some)
    } else {
        Ok(None)
    }
}

fn analyze(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.value_of("config") {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(path) = matches.value_of("dataset") {
        config.dataset = StationDataset::from_path(path)?;
    }
    if let Some(seed) = given(matches, "seed")? {
        config.seed = seed;
    }
    if let Some(seed) = given(matches, "hmm_seed")? {
        config.hmm.seed = Some(seed);
    }
    if let Some(seq_len) = given(matches, "seq_len")? {
        config.panel.seq_len = seq_len;
    }
    if let Some(states) = given(matches, "states")? {
        config.hmm.states = states;
    }
    if let Some(max_iter) = given(matches, "max_iter")? {
        config.hmm.max_iter = max_iter;
    }
    if matches.is_present("sort_states") {
        config.hmm.sort_states = true;
    }
    debug!("Configuration:{:?}", config);
    let report = hmmclimate::analysis::run(&config)?;
    let stdout = std::io::stdout();
    let mut wtr = std::io::BufWriter::new(stdout.lock());
    match matches.value_of("format") {
        Some("json") => Json.render(&report, &mut wtr)?,
        _ => Tsv.render(&report, &mut wtr)?,
    }
    Ok(())
}

fn frequency(matches: &ArgMatches) -> Result<()> {
    let len: usize = parse(matches, "length")?;
    let seed: u64 = parse(matches, "seed")?;
    let alphabet: String = parse(matches, "alphabet")?;
    let alphabet = Alphabet::new(alphabet.as_bytes())?;
    let reference: String = parse(matches, "reference")?;
    let reference = Alphabet::new(reference.as_bytes())?;
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
    let seq = gen_seq::generate_seq_over(&mut rng, len, &alphabet)?;
    let freqs = FrequencyTable::from_seq(&seq, &reference)?;
    println!("{}", freqs);
    Ok(())
}

fn shift(matches: &ArgMatches) -> Result<()> {
    let values = match matches.value_of("values") {
        Some(values) => parse_values(values)?,
        None => StationDataset::default().values,
    };
    let matrix = hmmclimate::regime_shift::RegimeShiftMatrix::new(&values)?;
    print!("{}", matrix);
    Ok(())
}

fn decode(matches: &ArgMatches) -> Result<()> {
    let values: String = parse(matches, "values")?;
    let values = parse_values(&values)?;
    let config = hmm_config(matches)?;
    let (model, report) = GaussianHmm::fit(&values, &config)?;
    debug!("Fitted model\n{}", model);
    info!(
        "Iterations:{}\tLK:{:.4}\tConverged:{}",
        report.iterations, report.log_likelihood, report.converged
    );
    let states: Vec<_> = model
        .decode(&values)?
        .iter()
        .map(|s| format!("{}", s))
        .collect();
    println!("{}", states.join("\t"));
    Ok(())
}

fn main() {
    let matches = App::new("hmmclimate")
        .version("0.1")
        .about("Synthetic DNA/climate data and Gaussian HMM regime detection.")
        .setting(clap::AppSettings::ArgRequiredElseHelp)
        .subcommand(subcommand_analyze())
        .subcommand(subcommand_frequency())
        .subcommand(subcommand_shift())
        .subcommand(subcommand_decode())
        .get_matches();
    if let Some(sub_m) = matches.subcommand().1 {
        let level = match sub_m.occurrences_of("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
        if let Some(threads) = sub_m.value_of("threads").and_then(|x| x.parse().ok()) {
            if let Err(why) = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
            {
                debug!("{:?}", why);
            }
        }
    }
    debug!("Start");
    let result = match matches.subcommand() {
        ("analyze", Some(sub_m)) => analyze(sub_m),
        ("frequency", Some(sub_m)) => frequency(sub_m),
        ("shift", Some(sub_m)) => shift(sub_m),
        ("decode", Some(sub_m)) => decode(sub_m),
        _ => unreachable!(),
    };
    if let Err(why) = result {
        error!("{}", why);
        eprintln!("Error: {}", why);
        std::process::exit(1);
    }
}
