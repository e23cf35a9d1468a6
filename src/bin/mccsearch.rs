use clap::Parser;
use log::{info, LevelFilter};
use mccsearch::{
    classify, find_cloud_elements, read_directory, write_kml, write_reports, CeDatabase,
    MccResult, SearchConfig, SearchOptions,
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
/// Search a directory of brightness temperature imagery for MCCs.
///
/// This runs every stage of the search in one go: read the imagery, find the cloud elements,
/// prune them to cloud clusters, classify the clusters, and write the reports.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "mccsearch")]
#[clap(author, version, about)]
struct MccSearchOptionsInit {
    /// Directory with the brightness temperature control file and data files.
    ir_dir: PathBuf,

    /// Directory with the precipitation control file and data files.
    #[clap(short, long)]
    precip_dir: Option<PathBuf>,

    /// Directory to write the reports into.
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Also save the cloud elements to this store so findmccs can classify them again.
    #[clap(short, long)]
    store_file: Option<PathBuf>,

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
struct MccSearchOptionsChecked {
    ir_dir: PathBuf,
    precip_dir: Option<PathBuf>,
    output_dir: PathBuf,
    store_file: Option<PathBuf>,
    kml_file: Option<PathBuf>,
    config: SearchConfig,
    verbose: bool,
}

impl Display for MccSearchOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "       Imagery: {}", self.ir_dir.display())?;
        match self.precip_dir {
            Some(ref dir) => writeln!(f, " Precipitation: {}", dir.display())?,
            None => writeln!(f, " Precipitation: none")?,
        }
        writeln!(f, "        Output: {}", self.output_dir.display())?;
        match self.store_file {
            Some(ref store) => writeln!(f, "         Store: {}", store.display())?,
            None => writeln!(f, "         Store: none")?,
        }
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

fn parse_args() -> MccResult<MccSearchOptionsChecked> {
    let MccSearchOptionsInit {
        ir_dir,
        precip_dir,
        output_dir,
        store_file,
        kml_file,
        search,
        verbose,
    } = MccSearchOptionsInit::parse();

    let config = search.to_config()?;

    Ok(MccSearchOptionsChecked {
        ir_dir,
        precip_dir,
        output_dir,
        store_file,
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

    //
    // Stages A and B, read the imagery and find the cloud elements.
    //
    let input = read_directory(&opts.ir_dir, opts.precip_dir.as_deref(), opts.config.domain)?;
    let catalog = find_cloud_elements(&input.cube, &*input.precipitation, &opts.config);
    drop(input);

    // The store gets the graph before it is pruned.
    if let Some(ref store_file) = opts.store_file {
        let db = CeDatabase::connect(store_file)?;
        db.store(&catalog)?;
    }

    //
    // Stages C, D, and E.
    //
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
