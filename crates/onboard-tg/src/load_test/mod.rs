//! Feeds fake updates through the real dispatching tree of the bot
//! and reports the latency of their processing.

mod metrics;
mod mock_api;
mod report;
mod runner;
mod updates;

pub use runner::run;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Run a load test against one of the bot's handlers
#[derive(Parser, Debug)]
pub struct Args {
    /// Total number of updates to process
    #[clap(long = "total", short = 't')]
    total: u32,

    /// Number of updates processed at the same time
    #[clap(long, short = 'c')]
    concurrency: usize,

    /// Scenario that determines the kind of updates to send
    #[clap(long = "handler", value_enum, default_value_t = Scenario::Start)]
    scenario: Scenario,

    /// Name of the test in the report, generated from the other args if omitted
    #[clap(long, short = 'n')]
    name: Option<String>,

    /// Number of unique fake users
    #[clap(long, default_value_t = 10_000)]
    user_pool_size: u64,

    /// Id of the first fake user
    #[clap(long, default_value_t = 900_000_000)]
    base_user_id: u64,

    /// Storage to run the handlers against. Postgres is configured with
    /// the same `DATABASE_*` variables as the bot itself.
    #[clap(long, value_enum, default_value_t = Store::Memory)]
    store: Store,

    /// Secret used to generate the referral codes
    #[clap(long, env = "REFERRAL_SECRET_KEY", default_value = "load-test-secret")]
    referral_secret: String,

    /// Directory where the report file is saved
    #[clap(long, default_value = "reports")]
    reports_dir: PathBuf,
}

impl Args {
    fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let scenario = self.scenario.as_str();
            format!("{scenario}_tu={}_cnc={}", self.total, self.concurrency)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub(crate) enum Scenario {
    /// `/start` command from a pool of users
    Start,

    /// `/start` with the referral code of the first user of the pool
    StartReferral,

    /// Press of the language button during onboarding
    CallbackLanguage,

    /// `/referral` command
    Referral,
}

impl Scenario {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartReferral => "start_referral",
            Self::CallbackLanguage => "callback_language",
            Self::Referral => "referral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Store {
    Postgres,
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    enum Cli {
        LoadTest(Args),
    }

    fn parse(args: &[&str]) -> Args {
        let Cli::LoadTest(args) =
            Cli::try_parse_from(["onboard-tg", "load-test"].iter().chain(args)).unwrap();
        args
    }

    #[test]
    fn defaults() {
        let args = parse(&["-t", "100", "-c", "10"]);

        assert_eq!(args.scenario, Scenario::Start);
        assert_eq!(args.store, Store::Memory);
        assert_eq!(args.user_pool_size, 10_000);
        assert_eq!(args.base_user_id, 900_000_000);
        assert_eq!(args.reports_dir, PathBuf::from("reports"));
        assert_eq!(args.name(), "start_tu=100_cnc=10");
    }

    #[test]
    fn scenario_names() {
        let args = parse(&[
            "--total",
            "5",
            "--concurrency",
            "2",
            "--handler",
            "callback_language",
            "--store",
            "postgres",
        ]);

        assert_eq!(args.scenario, Scenario::CallbackLanguage);
        assert_eq!(args.store, Store::Postgres);
        assert_eq!(args.name(), "callback_language_tu=5_cnc=2");

        for scenario in Scenario::value_variants() {
            let name = scenario.to_possible_value().unwrap();
            assert_eq!(name.get_name(), scenario.as_str());
        }
    }
}
