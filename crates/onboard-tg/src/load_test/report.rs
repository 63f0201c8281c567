use super::metrics::LoadTestMetrics;
use super::Scenario;
use crate::Result;
use chrono::{DateTime, Local};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) struct Report<'a> {
    pub(crate) name: &'a str,
    pub(crate) scenario: Scenario,
    pub(crate) concurrency: usize,
    pub(crate) wall_time: Duration,
    pub(crate) metrics: &'a LoadTestMetrics,
}

#[derive(Debug, PartialEq)]
pub(crate) struct LatencyStats {
    pub(crate) min: Duration,
    pub(crate) avg: Duration,
    pub(crate) p50: Duration,
    pub(crate) p95: Duration,
    pub(crate) p99: Duration,
    pub(crate) max: Duration,
}

impl LatencyStats {
    /// Returns [`None`] if there are no samples
    pub(crate) fn new(latencies: &[Duration]) -> Option<Self> {
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        let count = u32::try_from(sorted.len()).ok()?;

        Some(Self {
            min: *sorted.first()?,
            max: *sorted.last()?,
            avg: total / count,
            p50: percentile(&sorted, 50),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
        })
    }
}

/// Nearest-rank percentile without interpolation. `sorted` must not be empty.
fn percentile(sorted: &[Duration], n: usize) -> Duration {
    let idx = (sorted.len() * n / 100).min(sorted.len() - 1);
    sorted[idx]
}

fn millis(duration: Duration) -> String {
    format!("{:.1} ms", duration.as_secs_f64() * 1000.0)
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = self.metrics;

        let Some(latency) = LatencyStats::new(&metrics.latencies) else {
            return f.write_str("No data.");
        };

        let total = metrics.total();
        let success_rate = metrics.successful as f64 / total as f64 * 100.0;
        let wall_secs = self.wall_time.as_secs_f64();
        let throughput = if wall_secs > 0.0 {
            total as f64 / wall_secs
        } else {
            0.0
        };

        let separator = "=".repeat(60);

        let mut out = String::new();
        let out = &mut out;

        writeln!(out, "{separator}")?;
        writeln!(out, "  {}", self.name)?;
        writeln!(out, "{separator}")?;
        writeln!(out, "  Handler:          {}", self.scenario.as_str())?;
        writeln!(out, "  Concurrency:      {}", self.concurrency)?;
        writeln!(out, "  Wall time:        {wall_secs:.2}s")?;
        writeln!(out, "  Throughput:       {throughput:.1} updates/sec")?;
        writeln!(out)?;
        writeln!(out, "  Total processed:  {total}")?;
        writeln!(out, "  Successful:       {}", metrics.successful)?;
        writeln!(out, "  Failed:           {}", metrics.failed)?;
        writeln!(out, "  Success rate:     {success_rate:.1}%")?;
        writeln!(out)?;
        writeln!(out, "  Min latency:      {}", millis(latency.min))?;
        writeln!(out, "  Avg latency:      {}", millis(latency.avg))?;
        writeln!(out, "  p50:              {}", millis(latency.p50))?;
        writeln!(out, "  p95:              {}", millis(latency.p95))?;
        writeln!(out, "  p99:              {}", millis(latency.p99))?;
        writeln!(out, "  Max latency:      {}", millis(latency.max))?;

        if !metrics.error_types.is_empty() {
            writeln!(out)?;
            writeln!(out, "  Error types:")?;
            for (error_type, count) in &metrics.error_types {
                writeln!(out, "    {error_type}: {count}")?;
            }
        }

        if let Some(first_error) = &metrics.first_error {
            let rule = "-".repeat(40);
            writeln!(out)?;
            writeln!(out, "  First error:")?;
            writeln!(out, "  {rule}")?;
            for line in first_error.trim().lines() {
                writeln!(out, "  {line}")?;
            }
            writeln!(out, "  {rule}")?;
        }

        write!(out, "{separator}")?;

        f.write_str(out)
    }
}

impl Report<'_> {
    /// Writes the report into `{dir}/{timestamp}_{name}.txt` and returns the path
    pub(crate) fn save(&self, dir: &Path, now: DateTime<Local>) -> Result<PathBuf> {
        fs_err::create_dir_all(dir)?;

        let file_name = format!("{}_{}.txt", now.format("%Y%m%d_%H%M%S"), safe_name(self.name));
        let path = dir.join(file_name);

        fs_err::write(&path, self.to_string())?;

        Ok(path)
    }
}

fn safe_name(name: &str) -> String {
    name.chars()
        .map(|char| match char {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '=' => char,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use expect_test::expect;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn percentiles_use_the_nearest_rank() {
        let latencies: Vec<_> = (1..=100).rev().map(ms).collect();
        let stats = LatencyStats::new(&latencies).unwrap();

        assert_eq!(
            stats,
            LatencyStats {
                min: ms(1),
                avg: Duration::from_micros(50_500),
                p50: ms(51),
                p95: ms(96),
                p99: ms(100),
                max: ms(100),
            }
        );
    }

    #[test]
    fn single_sample() {
        let stats = LatencyStats::new(&[ms(7)]).unwrap();
        assert_eq!(stats.p50, ms(7));
        assert_eq!(stats.p99, ms(7));
        assert_eq!(LatencyStats::new(&[]), None);
    }

    fn sample_metrics() -> LoadTestMetrics {
        LoadTestMetrics {
            successful: 3,
            failed: 1,
            latencies: vec![ms(10), ms(20), ms(30), ms(40)],
            error_types: [("Invalid token".to_owned(), 1)].into(),
            first_error: Some("Error (id: abc123): Invalid token".to_owned()),
        }
    }

    #[test]
    fn format() {
        let metrics = sample_metrics();
        let report = Report {
            name: "start_tu=4_cnc=2",
            scenario: Scenario::Start,
            concurrency: 2,
            wall_time: ms(2000),
            metrics: &metrics,
        };

        expect![[r#"
            ============================================================
              start_tu=4_cnc=2
            ============================================================
              Handler:          start
              Concurrency:      2
              Wall time:        2.00s
              Throughput:       2.0 updates/sec

              Total processed:  4
              Successful:       3
              Failed:           1
              Success rate:     75.0%

              Min latency:      10.0 ms
              Avg latency:      25.0 ms
              p50:              30.0 ms
              p95:              40.0 ms
              p99:              40.0 ms
              Max latency:      40.0 ms

              Error types:
                Invalid token: 1

              First error:
              ----------------------------------------
              Error (id: abc123): Invalid token
              ----------------------------------------
            ============================================================"#]]
        .assert_eq(&report.to_string());
    }

    #[test]
    fn empty() {
        let metrics = LoadTestMetrics::default();
        let report = Report {
            name: "empty",
            scenario: Scenario::Referral,
            concurrency: 1,
            wall_time: ms(1),
            metrics: &metrics,
        };
        assert_eq!(report.to_string(), "No data.");
    }

    #[test]
    fn save() {
        let dir = std::env::temp_dir().join(format!("onboard-tg-report-{}", std::process::id()));
        let metrics = sample_metrics();
        let report = Report {
            name: "my test/run #1",
            scenario: Scenario::StartReferral,
            concurrency: 8,
            wall_time: ms(500),
            metrics: &metrics,
        };

        let now = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let path = report.save(&dir, now).unwrap();

        assert_eq!(path, dir.join("20240305_070809_my_test_run__1.txt"));
        assert_eq!(fs_err::read_to_string(&path).unwrap(), report.to_string());

        fs_err::remove_dir_all(&dir).unwrap();
    }
}
