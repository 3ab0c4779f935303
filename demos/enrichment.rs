use std::path::PathBuf;
use std::process;

use gsenrich::{
    BackgroundSpec, EnrichmentResults, Enrichr, EnrichrConfig, GeneListInput, GeneSetInput,
};

/// Prints the most significant terms of every library
fn print_results(results: &EnrichmentResults, output_len: usize) {
    for report in results.reports() {
        println!("### {} ###", report.gene_set());
        for row in report.rows().iter().take(output_len) {
            println!(
                "{}\t{}\t{:e}\t{:e}\t{}",
                row.term(),
                row.overlap_label(),
                row.pvalue(),
                row.adjusted_pvalue(),
                row.genes().join(";")
            );
        }
        println!(
            "\nTerms: {}\nSignificant: {}\n\n",
            report.len(),
            report.significant().count()
        );
    }
}

fn main() {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    let mut args = std::env::args();
    if args.len() < 3 {
        println!("Show enriched terms of a gene list\n\n");
        println!("Usage\nenrichment <GENE LIST FILE> <LIBRARY>[,<LIBRARY>...] [BACKGROUND SIZE] [N RESULTS]");
        println!("\nenrichment genes.txt KEGG_2021_Human.gmt 20000 10\n");
        process::exit(1)
    }

    let genes = GeneListInput::File(PathBuf::from(args.nth(1).unwrap()));
    let libraries = GeneSetInput::parse_list(&args.next().unwrap());

    let mut config = EnrichrConfig::default().description("demo");
    if let Some(size) = args.next() {
        let size = size.parse::<u64>().expect("background size must be an integer");
        config = config.background(BackgroundSpec::Size(size));
    }

    let output_len = args
        .next()
        .map(|arg| arg.parse::<usize>().unwrap_or(10))
        .unwrap_or(10);

    match Enrichr::new(config).run(&genes, &libraries) {
        Ok(results) => print_results(&results, output_len),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1)
        }
    }
}
