use clap::Parser;
use log::{info, LevelFilter};
use mccsearch::{
    find_cloud_elements, read_directory, write_cloud_elements, CeDatabase, MccResult,
    SearchConfig, SearchOptions, CLOUD_ELEMENT_REPORT,
};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Find and link the cloud elements in a directory of brightness temperature imagery.
///
/// The cloud elements and the graph linking them are saved in a store that findmccs can classify
/// later, possibly many times with different options.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findces")]
#[clap(author, version, about)]
struct FindCesOptionsInit {
    /// Directory with the brightness temperature control file and data files.
    ir_dir: PathBuf,

    /// Directory with the precipitation control file and data files.
    #[clap(short, long)]
    precip_dir: Option<PathBuf>,

    /// The path to the store file.
    ///
    /// If this is not specified, then the program will check for it in the "MCC_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "MCC_DB")]
    store_file: PathBuf,

    /// Directory to write the cloud element listing into.
    ///
    /// If this is not specified, the listing goes next to the store file.
    #[clap(short, long)]
    output_dir: Option<PathBuf>,

    #[clap(flatten)]
    search: SearchOptions,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct FindCesOptionsChecked {
    ir_dir: PathBuf,
    precip_dir: Option<PathBuf>,
    store_file: PathBuf,
    output_dir: PathBuf,
    config: SearchConfig,
    verbose: bool,
}

impl Display for FindCesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "       Imagery: {}", self.ir_dir.display())?;
        match self.precip_dir {
            Some(ref dir) => writeln!(f, " Precipitation: {}", dir.display())?,
            None => writeln!(f, " Precipitation: none")?,
        }
        writeln!(f, "         Store: {}", self.store_file.display())?;
        writeln!(f, "        Output: {}", self.output_dir.display())?;
        writeln!(f)?;
        write!(f, "{}", self.config)?;
        writeln!(f, "\n")?;

        Ok(())
    }
}

fn parse_args() -> MccResult<FindCesOptionsChecked> {
    let FindCesOptionsInit {
        ir_dir,
        precip_dir,
        store_file,
        output_dir,
        search,
        verbose,
    } = FindCesOptionsInit::parse();

    let output_dir = match output_dir {
        Some(v) => v,
        None => store_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let config = search.to_config()?;

    Ok(FindCesOptionsChecked {
        ir_dir,
        precip_dir,
        store_file,
        output_dir,
        config,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> MccResult<()> {
    let opts = parse_args()?;

    let crate_level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .with_module_level("mccsearch", crate_level)
        .init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let input = read_directory(&opts.ir_dir, opts.precip_dir.as_deref(), opts.config.domain)?;
    let catalog = find_cloud_elements(&input.cube, &*input.precipitation, &opts.config);

    let db = CeDatabase::connect(&opts.store_file)?;
    db.store(&catalog)?;

    std::fs::create_dir_all(&opts.output_dir)?;
    let ce_path = opts.output_dir.join(CLOUD_ELEMENT_REPORT);
    let mut out = BufWriter::new(File::create(&ce_path)?);
    write_cloud_elements(&mut out, &catalog)?;
    out.flush()?;

    info!(
        "{} cloud elements in {} frames, listing in {}",
        catalog.nodes.len(),
        catalog.times.len(),
        ce_path.display()
    );

    Ok(())
}
