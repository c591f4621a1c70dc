use crate::infra::{
    load_dataset, parse_cell, parse_date, utc_today, LendingState, RangeSelection,
};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use lending_lens::config::AppConfig;
use lending_lens::error::AppError;
use lending_lens::lending::{
    DashboardView, DateRange, DecisionMode, DecisionReport, DisplayMode, LendingDashboard,
    LoanCsvImporter, LoanRecord, ThresholdMatrix, Thresholds, Trend,
};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum ModeArg {
    #[default]
    Historical,
    Simulation,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RangeArgs {
    /// First day of the analysis window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Last day of the analysis window (YYYY-MM-DD). Defaults to today when --start is set.
    #[arg(long, value_parser = parse_date)]
    pub(crate) end: Option<NaiveDate>,
    /// Restrict to the last N calendar months
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub(crate) last_months: Option<u32>,
    /// Restrict to January 1st through today (the default window)
    #[arg(long, conflicts_with_all = ["start", "end", "last_months"])]
    pub(crate) ytd: bool,
    /// Keep every loaded loan instead of the year-to-date default
    #[arg(long, conflicts_with_all = ["start", "end", "last_months", "ytd"])]
    pub(crate) all: bool,
}

impl RangeArgs {
    fn selection(&self) -> RangeSelection {
        RangeSelection {
            start: self.start,
            end: self.end,
            last_months: self.last_months,
            year_to_date: self.ytd,
            all: self.all,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Loan CSV export to analyse instead of the configured store
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Replay stored decisions or simulate them from thresholds
    #[arg(long, value_enum, default_value_t = ModeArg::Historical)]
    pub(crate) mode: ModeArg,
    /// Default-score threshold for simulation (0-1)
    #[arg(long, value_parser = parse_threshold)]
    pub(crate) default_threshold: Option<f64>,
    /// Refusal-score threshold for simulation (0-1)
    #[arg(long, value_parser = parse_threshold)]
    pub(crate) refusal_threshold: Option<f64>,
    #[command(flatten)]
    pub(crate) range: RangeArgs,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Loan CSV export to analyse instead of the configured store
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Grid step between threshold values
    #[arg(long, default_value_t = lending_lens::lending::sweep::DEFAULT_STEP)]
    pub(crate) step: f64,
    /// Carry a grid cell (ROW,COL) into a simulation summary
    #[arg(long, value_parser = parse_cell)]
    pub(crate) select: Option<(usize, usize)>,
    #[command(flatten)]
    pub(crate) range: RangeArgs,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("'{raw}' is not a number ({err})"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} must lie within [0, 1]"))
    }
}

struct CliDataset {
    records: Vec<LoanRecord>,
    defaults: Thresholds,
    range: Option<DateRange>,
}

async fn load_cli_dataset(
    csv: Option<PathBuf>,
    range: &RangeArgs,
) -> Result<CliDataset, AppError> {
    let config = AppConfig::load()?;
    let today = utc_today();
    let range = range.selection().resolve(today)?;

    let records = match csv {
        Some(path) => {
            let mut batch = LoanCsvImporter::from_path(path)?;
            if !batch.rejected.is_empty() {
                eprintln!("Skipped {} rows with unreadable timestamps", batch.rejected.len());
            }
            if let Some(range) = range {
                batch.records.retain(|record| range.contains(&record.created_at));
            }
            batch.records
        }
        None => {
            let state = LendingState::from_config(&config, today)?;
            load_dataset(&state, None, range).await?
        }
    };

    Ok(CliDataset {
        records,
        defaults: config.thresholds,
        range,
    })
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let dataset = load_cli_dataset(args.csv, &args.range).await?;
    let thresholds = Thresholds {
        default_threshold: args
            .default_threshold
            .unwrap_or(dataset.defaults.default_threshold),
        refusal_threshold: args
            .refusal_threshold
            .unwrap_or(dataset.defaults.refusal_threshold),
    };

    let mut dashboard = LendingDashboard::new(dataset.records).with_thresholds(thresholds);
    dashboard.set_range(dataset.range);
    let mode = match args.mode {
        ModeArg::Historical => DecisionMode::Historical,
        ModeArg::Simulation => DecisionMode::Simulation(thresholds),
    };

    let report = dashboard.report(mode);
    print!("{}", render_report(&report, mode, dataset.range));
    Ok(())
}

pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let dataset = load_cli_dataset(args.csv, &args.range).await?;

    let mut dashboard = LendingDashboard::new(dataset.records);
    dashboard.set_range(dataset.range);
    dashboard.set_step(args.step)?;
    dashboard.set_mode(DisplayMode::ThresholdGrid);

    print!("{}", render_matrix(&dashboard.matrix()));

    if let Some((row, column)) = args.select {
        let thresholds = dashboard.select_cell(row, column)?;
        if let DashboardView::Simulation { report, .. } = dashboard.view() {
            println!();
            print!(
                "{}",
                render_report(&report, DecisionMode::Simulation(thresholds), dataset.range)
            );
        }
    }
    Ok(())
}

fn trend_marker(trend: Option<Trend>) -> &'static str {
    match trend {
        Some(Trend::Up) => " (up)",
        Some(Trend::Down) => " (down)",
        None => "",
    }
}

/// Plain-text report: a header naming the decision source, the window, the
/// overall line, then one line per month.
struct ReportText<'a> {
    report: &'a DecisionReport,
    mode: DecisionMode,
    range: Option<DateRange>,
}

impl fmt::Display for ReportText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            DecisionMode::Historical => {
                writeln!(f, "Lending decision report (historical decisions)")?
            }
            DecisionMode::Simulation(thresholds) => writeln!(
                f,
                "Lending decision report (simulated at default {:.2} / refusal {:.2})",
                thresholds.default_threshold, thresholds.refusal_threshold
            )?,
        }
        match self.range {
            Some(range) => writeln!(f, "Window: {} to {}", range.start(), range.end())?,
            None => writeln!(f, "Window: all loaded loans")?,
        }

        let overall = &self.report.overall;
        writeln!(
            f,
            "Overall: {} loans | {} accepted | {} refused | {} unknown | {:.1}% acceptance | {:.1}% refusal",
            overall.total,
            overall.accepted,
            overall.refused,
            overall.unknown,
            overall.acceptance_rate,
            overall.refusal_rate()
        )?;

        if self.report.monthly.is_empty() {
            return writeln!(f, "Monthly: no decided loans");
        }

        writeln!(f, "Monthly:")?;
        for month in self.report.monthly_views() {
            writeln!(
                f,
                "  - {} ({}): {} decided | {} accepted | {} refused | {:.1}%{}",
                month.month_label,
                month.month,
                month.total,
                month.accepted,
                month.refused,
                month.acceptance_rate,
                trend_marker(month.trend)
            )?;
        }
        Ok(())
    }
}

/// Rows are default-score thresholds, columns refusal-score thresholds, cells
/// the acceptance share in percent.
struct MatrixText<'a>(&'a ThresholdMatrix);

impl fmt::Display for MatrixText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matrix = self.0;
        writeln!(
            f,
            "Acceptance rate by threshold pair ({} loans; rows = default, columns = refusal)",
            matrix.record_count()
        )?;

        write!(f, "{:>6}", "")?;
        for value in matrix.refusal_axis().values() {
            write!(f, "{value:>6.2}")?;
        }
        writeln!(f)?;

        for (row, rates) in matrix.rows().enumerate() {
            let label = matrix.default_axis().get(row).unwrap_or_default();
            write!(f, "{label:>6.2}")?;
            for rate in rates {
                write!(f, "{:>6.0}", rate * 100.0)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub(crate) fn render_report(
    report: &DecisionReport,
    mode: DecisionMode,
    range: Option<DateRange>,
) -> String {
    ReportText {
        report,
        mode,
        range,
    }
    .to_string()
}

pub(crate) fn render_matrix(matrix: &ThresholdMatrix) -> String {
    MatrixText(matrix).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use lending_lens::lending::{HistoricalDecision, LoanId};

    fn record(
        id: &str,
        month: u32,
        default_score: f64,
        refusal_score: f64,
        historical_decision: Option<HistoricalDecision>,
    ) -> LoanRecord {
        LoanRecord {
            id: LoanId(id.to_string()),
            created_at: Utc
                .with_ymd_and_hms(2024, month, 10, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
            default_score,
            refusal_score,
            historical_decision,
        }
    }

    fn dashboard() -> LendingDashboard {
        LendingDashboard::new(vec![
            record("1", 3, 0.5, 0.3, Some(HistoricalDecision::Accept)),
            record("2", 3, 0.9, 0.2, Some(HistoricalDecision::Refuse)),
            record("3", 4, 0.1, 0.1, Some(HistoricalDecision::Accept)),
        ])
    }

    #[test]
    fn report_lists_months_with_trend() {
        let report = dashboard().report(DecisionMode::Historical);

        let rendered = render_report(&report, DecisionMode::Historical, None);

        assert!(rendered.contains("historical decisions"));
        assert!(rendered.contains("Window: all loaded loans"));
        assert!(rendered.contains("Overall: 3 loans | 2 accepted | 1 refused | 0 unknown"));
        assert!(rendered.contains("March 2024 (2024-03): 2 decided"));
        assert!(rendered
            .contains("April 2024 (2024-04): 1 decided | 1 accepted | 0 refused | 100.0% (up)"));
    }

    #[test]
    fn simulation_header_shows_thresholds() {
        let thresholds = Thresholds::new(0.7, 0.6);
        let report = dashboard().report(DecisionMode::Simulation(thresholds));

        let rendered = render_report(&report, DecisionMode::Simulation(thresholds), None);

        assert!(rendered
            .starts_with("Lending decision report (simulated at default 0.70 / refusal 0.60)"));
    }

    #[test]
    fn empty_report_says_so() {
        let rendered = render_report(&DecisionReport::default(), DecisionMode::Historical, None);
        assert!(rendered.contains("Monthly: no decided loans"));
        assert!(rendered.contains("0.0% acceptance"));
    }

    #[test]
    fn matrix_has_header_and_one_line_per_row() {
        let matrix = dashboard().matrix();

        let rendered = render_matrix(&matrix);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 23);
        assert!(lines[1].trim_start().starts_with("0.00"));
        assert!(lines[22].trim_start().starts_with("1.00"));
        assert!(lines[22].trim_end().ends_with("100"));
    }

    #[test]
    fn rendering_matches_display_output() {
        let matrix = dashboard().matrix();
        assert_eq!(render_matrix(&matrix), MatrixText(&matrix).to_string());
        assert!(render_matrix(&matrix).ends_with('\n'));
    }

    #[derive(Parser, Debug)]
    struct RangeCli {
        #[command(flatten)]
        range: RangeArgs,
    }

    #[test]
    fn all_flag_lifts_the_default_window() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        let default = RangeCli::try_parse_from(["lens"]).expect("parses");
        let range = default
            .range
            .selection()
            .resolve(today)
            .expect("resolves")
            .expect("year to date");
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"));

        let all = RangeCli::try_parse_from(["lens", "--all"]).expect("parses");
        assert!(all.range.selection().resolve(today).expect("resolves").is_none());

        assert!(RangeCli::try_parse_from(["lens", "--all", "--ytd"]).is_err());
    }

    #[test]
    fn thresholds_outside_unit_interval_are_rejected() {
        assert_eq!(parse_threshold("0.35"), Ok(0.35));
        assert!(parse_threshold("1.01").is_err());
        assert!(parse_threshold("abc").is_err());
    }
}
