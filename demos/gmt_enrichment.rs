use std::process;

use gsenrich::parser::gmt;
use gsenrich::stats::hypergeom::term_enrichment;
use gsenrich::{Background, EnrichmentReport, IdKind, Query, DEFAULT_CUTOFF};

fn main() {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    let mut args = std::env::args();
    if args.len() < 3 {
        println!("Run the hypergeometric test for every term of a GMT file\n\n");
        println!("Usage\ngmt_enrichment <GMT FILE> <GENE>,<GENE>,... [OUTFILE]");
        println!("\ngmt_enrichment pathways.gmt TP53,KRAS,MYC report.tsv\n");
        process::exit(1)
    }

    let path = args.nth(1).unwrap();
    let query = Query::new(args.next().unwrap().split(','));

    let library = gmt::read_file(&path, query.kind()).expect("unable to read GMT file");

    // all genes of the library form the background
    let background = Background::from_genes(
        library
            .iter()
            .flat_map(|term| term.genes().iter().map(ToString::to_string)),
        query.kind(),
    );
    if query.kind() == IdKind::Entrez {
        println!("Using Entrez IDs");
    }

    let tests = term_enrichment(&background, &query, &library).expect("invalid background");
    let report = EnrichmentReport::assemble("custom", tests, DEFAULT_CUTOFF)
        .expect("p-values are always valid");

    match args.next() {
        Some(outfile) => {
            let mut file = std::fs::File::create(outfile).expect("unable to create report");
            report.write_tsv(&mut file).expect("unable to write report");
        }
        None => {
            let stdout = std::io::stdout();
            report
                .write_tsv(&mut stdout.lock())
                .expect("unable to write report");
        }
    }

    println!(
        "\nTerms: {}\nBackground genes: {}\nQuery genes: {}",
        library.len(),
        background.len(),
        query.len()
    );
}
