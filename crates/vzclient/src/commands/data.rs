//! Measurement command handler.

use serde::Serialize;
use tabled::Tabled;
use vzclient_core::{ChannelData, ChannelRepository, DataRequest, DataTuple, Statistics};

use crate::cli::{DataArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::settle;

#[derive(Tabled)]
struct TupleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Data window plus statistics, as emitted by structured output formats.
#[derive(Serialize)]
struct DataView<'a> {
    #[serde(flatten)]
    data: &'a ChannelData,
    statistics: Statistics,
}

/// Parse a window bound: epoch milliseconds or an RFC 3339 timestamp.
fn parse_time(field: &str, raw: &str) -> Result<i64, CliError> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("expected epoch milliseconds or RFC 3339, got '{raw}': {e}"),
        })
}

fn build_request(args: &DataArgs) -> Result<DataRequest, CliError> {
    let mut request = match args.range {
        Some(range) => DataRequest::last(range),
        None => DataRequest::new(),
    };
    if let Some(ref from) = args.from {
        request = request.since(parse_time("from", from)?);
    }
    if let Some(ref to) = args.to {
        request = request.until(parse_time("to", to)?);
    }
    if let (Some(from), Some(to)) = (request.from, request.to) {
        if from >= to {
            return Err(CliError::Validation {
                field: "from".into(),
                reason: "window start must be before its end".into(),
            });
        }
    }
    if let Some(tuples) = args.tuples {
        request = request.tuples(tuples);
    }
    if let Some(group) = args.group {
        request = request.grouping(group);
    }
    Ok(request)
}

fn stats_detail(data: &ChannelData, stats: &Statistics, unit: &str, color: bool) -> String {
    let mut lines = vec![
        output::heading(&format!("Channel {}", data.uuid), color),
        format!(
            "Window:      {} .. {}",
            output::format_timestamp(data.from),
            output::format_timestamp(data.to)
        ),
        format!("Rows:        {}", stats.rows),
        format!("Min:         {}", output::format_value(stats.min, unit)),
        format!("Max:         {}", output::format_value(stats.max, unit)),
        format!("Average:     {}", output::format_value(stats.average, unit)),
    ];
    if let Some(consumption) = stats.consumption {
        lines.push(format!(
            "Consumption: {}",
            output::format_value(Some(consumption), unit)
        ));
    }
    lines.join("\n")
}

fn tuple_table(tuples: &[DataTuple], unit: &str) -> String {
    let rows: Vec<TupleRow> = tuples
        .iter()
        .map(|t| TupleRow {
            time: output::format_timestamp(t.timestamp),
            value: output::format_value(Some(t.value), unit),
        })
        .collect();
    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}

pub async fn handle(
    repo: &ChannelRepository,
    args: DataArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = build_request(&args)?;
    let data = settle(repo.get_channel_data(args.uuid.clone(), request), "data").await?;
    let statistics = data.statistics();
    let unit = repo
        .store()
        .get(&data.uuid)
        .map(|c| c.unit.clone())
        .unwrap_or_default();
    let color = output::should_color(&global.color);

    let out = if args.stats {
        output::render_single(
            &global.output,
            &statistics,
            |s| stats_detail(&data, s, &unit, color),
            |s| output::format_value(s.average, ""),
        )?
    } else {
        let view = DataView {
            data: &data,
            statistics,
        };
        output::render_single(
            &global.output,
            &view,
            |v| {
                if v.data.is_empty() {
                    format!(
                        "{}\n\nNo measurements in this window",
                        stats_detail(v.data, &v.statistics, &unit, color)
                    )
                } else {
                    format!(
                        "{}\n\n{}",
                        stats_detail(v.data, &v.statistics, &unit, color),
                        tuple_table(&v.data.tuples, &unit)
                    )
                }
            },
            |v| {
                v.data
                    .tuples
                    .iter()
                    .map(|t| format!("{}\t{}", t.timestamp, t.value))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        )?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use vzclient_core::{Grouping, TimeRange};

    use super::*;
    use crate::cli::{Cli, Command};

    fn data_args(argv: &[&str]) -> DataArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Data(args) => args,
            other => panic!("expected data command, got {other:?}"),
        }
    }

    #[test]
    fn bounds_accept_millis_and_rfc3339() {
        assert_eq!(parse_time("from", "1700000000000").unwrap(), 1_700_000_000_000);
        assert_eq!(
            parse_time("from", "2023-11-14T22:13:20Z").unwrap(),
            1_700_000_000_000
        );
        assert!(matches!(
            parse_time("to", "yesterday"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn explicit_window_and_options_reach_the_request() {
        let args = data_args(&[
            "vzc", "data", "c1", "--from", "1000", "--to", "5000", "-n", "50", "-g", "day",
        ]);
        let request = build_request(&args).unwrap();
        assert_eq!(request.from, Some(1000));
        assert_eq!(request.to, Some(5000));
        assert_eq!(request.tuples, Some(50));
        assert_eq!(request.grouping, Some(Grouping::Day));
    }

    #[test]
    fn range_preset_spans_its_duration() {
        let args = data_args(&["vzc", "data", "c1", "--range", "day"]);
        let request = build_request(&args).unwrap();
        let (from, to) = (request.from.unwrap(), request.to.unwrap());
        assert_eq!(to - from, TimeRange::Day.span_ms());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let args = data_args(&["vzc", "data", "c1", "--from", "5000", "--to", "1000"]);
        assert!(matches!(
            build_request(&args),
            Err(CliError::Validation { .. })
        ));
    }
}
