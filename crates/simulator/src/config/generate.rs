use clap::Parser;

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[arg(long, help = "Number of processes to generate", default_value = "4")]
    pub count: usize,

    #[arg(long, help = "Seed for reproducible output", env = "SIM_SEED")]
    pub seed: Option<u64>,

    #[arg(
        long,
        help = "Resource names processes may request, comma separated",
        value_delimiter = ','
    )]
    pub resources: Option<Vec<String>>,
}
