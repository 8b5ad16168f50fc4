use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipsed")]
#[command(version)]
#[command(about = "Batch-edit zip archive members through a shell filter command", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipsed --command 'xmllint --format -' --match '\\.xml$' bundle.zip\n  \
  zipsed --command 'tr a-z A-Z' a.zip b.zip     uppercase every member of both archives\n  \
  zipsed -v --command 'dos2unix' data.zip       show which members were updated")]
pub struct Cli {
    /// Zip archives to edit in place
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<String>,

    /// Shell command filtering each member from stdin to stdout
    #[arg(long, value_name = "CMD")]
    pub command: String,

    /// Regex tested against each member's full internal path (default: all files)
    #[arg(long = "match", value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Report every member as it is updated or left unchanged
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
