use clap::Parser;
use log::{info, warn, LevelFilter};
use mccsearch::{
    classify, write_kml, write_reports, CeDatabase, MccResult, SearchConfig, SearchOptions,
};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Classify the cloud elements from an earlier findces run.
///
/// This program prunes the stored graph down to cloud clusters, classifies every path through each
/// cluster as an MCC, an MCS, or neither, and writes the reports.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findmccs")]
#[clap(author, version, about)]
struct FindMccsOptionsInit {
    /// The path to the store file.
    ///
    /// If this is not specified, then the program will check for it in the "MCC_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "MCC_DB")]
    store_file: PathBuf,

    /// Directory to write the reports into.
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// The path to a KML file of the tracks, none is written if this is not specified.
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    #[clap(flatten)]
    search: SearchOptions,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct FindMccsOptionsChecked {
    store_file: PathBuf,
    output_dir: PathBuf,
    kml_file: Option<PathBuf>,
    config: SearchConfig,
    verbose: bool,
}

impl Display for FindMccsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "         Store: {}", self.store_file.display())?;
        writeln!(f, "        Output: {}", self.output_dir.display())?;
        match self.kml_file {
            Some(ref kml) => writeln!(f, "    Output KML: {}", kml.display())?,
            None => writeln!(f, "    Output KML: none")?,
        }
        writeln!(f)?;
        write!(f, "{}", self.config)?;
        writeln!(f, "\n")?;

        Ok(())
    }
}

fn parse_args() -> MccResult<FindMccsOptionsChecked> {
    let FindMccsOptionsInit {
        store_file,
        output_dir,
        kml_file,
        search,
        verbose,
    } = FindMccsOptionsInit::parse();

    let config = search.to_config()?;

    Ok(FindMccsOptionsChecked {
        store_file,
        output_dir,
        kml_file,
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

    if opts.config.domain.is_some() {
        warn!("the domain only applies when reading imagery, it is ignored here");
    }

    let db = CeDatabase::connect(&opts.store_file)?;
    let catalog = db.load()?;
    drop(db);

    let results = classify(catalog, &opts.config);

    write_reports(
        &opts.output_dir,
        &results.catalog,
        &results.clusters,
        &results.features,
        &opts.config,
    )?;

    if let Some(ref kml_file) = opts.kml_file {
        write_kml(
            kml_file,
            &results.features,
            &results.catalog.nodes,
            results.catalog.interval,
        )?;
    }

    info!("{}", results.summary());

    Ok(())
}
