use clap::Parser;

fn main() {
    let cli = leafcheckctl::Cli::parse();
    if let Err(err) = leafcheckctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
