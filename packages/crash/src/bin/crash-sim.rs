use clap::Parser;
use crash::{EdgeCalculator, CRASH_TIERS};

#[derive(Parser)]
#[command(
    name = "crash-sim",
    about = "Analyse the crash point distribution and cash-out targets"
)]
struct Args {
    /// Cash-out targets to evaluate, e.g. "1.5,2,3"
    #[arg(long, value_delimiter = ',', default_value = "1.25,1.5,2,2.5,3,5,10,25")]
    targets: Vec<f64>,

    /// Rounds to simulate (0 skips the simulation)
    #[arg(long, default_value = "100000")]
    rounds: u64,

    /// RNG seed for the simulation
    #[arg(long, default_value = "1337")]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    if let Some(bad) = args.targets.iter().find(|t| !t.is_finite() || **t < 1.0) {
        eprintln!("Invalid target {bad}: cash-out targets must be at least 1.0");
        std::process::exit(1);
    }

    println!("Target   P(win)    Return     Edge");
    for &target in &args.targets {
        let result = EdgeCalculator::for_target(target);
        println!(
            "{:>6.2}x  {:>7.4}  {:>+8.4}%  {:>+8.4}%",
            result.target,
            result.win_probability,
            result.expected_return * 100.0,
            result.house_edge * 100.0
        );
    }

    if let Some(best) = EdgeCalculator::best_target(&args.targets) {
        println!("Best target: {:.2}x ({:+.4}%)", best.target, best.expected_return * 100.0);
    }
    println!(
        "Expected crash point: {:.4}x",
        EdgeCalculator::expected_crash_point()
    );

    if args.rounds == 0 {
        return;
    }

    eprintln!("Simulating {} rounds (seed {})...", args.rounds, args.seed);
    let report = EdgeCalculator::new(args.seed).simulate(args.rounds);

    for (idx, tier) in CRASH_TIERS.iter().enumerate() {
        println!(
            "[{:>5.1}x, {:>5.1}x)  expected {:>5.1}%  observed {:>6.2}%",
            tier.lower,
            tier.upper,
            tier.probability() * 100.0,
            report.tier_share(idx) * 100.0
        );
    }
    println!("Mean crash point:   {:.4}x", report.mean_crash_point);
    println!("Median crash point: {:.4}x", report.median_crash_point);
    println!("Mean round length:  {:.2}s", report.mean_round_secs);
}
