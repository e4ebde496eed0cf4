use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::errors::ParserError;
use crate::formats::WtcFluxParser;
use crate::model::{Channel, ColumnNames, TemperatureTreatment};
use crate::{parse_wtc_flux_file, parse_wtc_flux_reader};

fn fixture(path: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

const HEADER: &str = "DateTime_hr,chamber,T_treatment,PAR,VPD,Photo,Trans,Tair_al,TargTempC_Avg,Patm,WS";

#[test]
fn parses_sample_flux_table() {
    let content = fixture("wtc_flux_sample.csv");
    let parsed = parse_wtc_flux_file(&content).expect("flux table parse failed");

    assert_eq!(parsed.len(), 48);
    assert!(parsed.columns.iter().any(|c| c == "Water_treatment"));

    let first = &parsed.readings[0];
    assert_eq!(first.chamber, "C01");
    assert_eq!(first.line_index, 2);
    assert_eq!(first.temperature_treatment, TemperatureTreatment::Ambient);
    assert_eq!(
        first.timestamp,
        NaiveDate::from_ymd_opt(2016, 10, 29)
            .unwrap()
            .and_hms_opt(23, 45, 0)
            .unwrap()
    );
    assert_eq!(first.channels.get(Channel::Photo), Some(5.0));
    assert_eq!(first.channels.get(Channel::Pressure), Some(100.2));
}

#[test]
fn derives_calendar_fields_from_timestamp() {
    let content = fixture("wtc_flux_sample.csv");
    let parsed = parse_wtc_flux_file(&content).unwrap();

    let first = &parsed.readings[0].calendar;
    assert_eq!((first.year, first.month, first.day), (2016, 10, 29));
    assert_eq!(first.day_of_year, 303);
    assert_eq!(first.hour, 23);

    let later = &parsed.readings[4].calendar;
    assert_eq!((later.month, later.day, later.hour), (10, 30, 0));
    assert_eq!(later.day_of_year, 304);
}

#[test]
fn missing_values_become_none() {
    let content = fixture("wtc_flux_sample.csv");
    let parsed = parse_wtc_flux_file(&content).unwrap();

    let one_am = NaiveDate::from_ymd_opt(2016, 10, 30)
        .unwrap()
        .and_hms_opt(1, 0, 0)
        .unwrap();
    let gap = parsed
        .readings
        .iter()
        .find(|r| r.chamber == "C12" && r.timestamp == one_am)
        .expect("C12 reading at 01:00");
    assert_eq!(gap.channels.get(Channel::WindSpeed), None);
    assert_eq!(gap.channels.get(Channel::Photo), Some(4.0));
}

#[test]
fn missing_timestamp_column_is_a_parse_error() {
    let content = "chamber,T_treatment,PAR,VPD,Photo,Trans,Tair_al,TargTempC_Avg,Patm,WS\n\
                   C01,ambient,1,1,1,1,1,1,1,1\n";
    let err = parse_wtc_flux_file(content).unwrap_err();
    match err {
        ParserError::Parse {
            line_index, column, ..
        } => {
            assert_eq!(line_index, 1);
            assert_eq!(column, "DateTime_hr");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_required_columns_are_reported_together() {
    let content = "DateTime_hr,chamber,PAR,VPD,Photo,Trans,Tair_al,TargTempC_Avg,Patm\n\
                   2016-10-30 00:00:00,C01,1,1,1,1,1,1,1\n";
    let err = parse_wtc_flux_file(content).unwrap_err();
    match err {
        ParserError::Schema { missing } => {
            assert_eq!(missing, vec!["T_treatment".to_string(), "WS".to_string()]);
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn rejects_timestamp_in_unexpected_format() {
    let content = format!("{HEADER}\n30/10/2016 00:00,C01,ambient,1,1,1,1,1,1,1,1\n");
    let err = parse_wtc_flux_file(&content).unwrap_err();
    match err {
        ParserError::Parse {
            line_index,
            column,
            message,
        } => {
            assert_eq!(line_index, 2);
            assert_eq!(column, "DateTime_hr");
            assert!(message.contains("30/10/2016"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn rejects_non_numeric_channel_value() {
    let content = format!(
        "{HEADER}\n2016-10-30 00:00:00,C01,ambient,1,1,1,1,1,1,1,1\n\
         2016-10-30 00:15:00,C01,ambient,bright,1,1,1,1,1,1,1\n"
    );
    let err = parse_wtc_flux_file(&content).unwrap_err();
    assert!(matches!(
        err,
        ParserError::Parse { line_index: 3, ref column, .. } if column == "PAR"
    ));
}

#[test]
fn rejects_unknown_temperature_treatment() {
    let content = format!("{HEADER}\n2016-10-30 00:00:00,C01,tepid,1,1,1,1,1,1,1,1\n");
    let err = parse_wtc_flux_file(&content).unwrap_err();
    assert!(matches!(err, ParserError::Parse { ref column, .. } if column == "T_treatment"));
}

#[test]
fn rejects_empty_chamber_id() {
    let content = format!("{HEADER}\n2016-10-30 00:00:00, ,ambient,1,1,1,1,1,1,1,1\n");
    let err = parse_wtc_flux_file(&content).unwrap_err();
    assert!(matches!(err, ParserError::Parse { ref column, .. } if column == "chamber"));
}

#[test]
fn ragged_rows_surface_as_csv_errors() {
    let content = format!("{HEADER}\n2016-10-30 00:00:00,C01,ambient,1,1\n");
    let err = parse_wtc_flux_file(&content).unwrap_err();
    assert!(matches!(err, ParserError::Csv { .. }));
}

#[test]
fn header_only_table_is_empty() {
    let content = format!("{HEADER}\n");
    let parsed = parse_wtc_flux_file(&content).unwrap();
    assert!(parsed.is_empty());
}

#[test]
fn honours_custom_column_names_and_delimiter() {
    let columns = ColumnNames {
        timestamp: "time".to_string(),
        pressure: "Press".to_string(),
        wind_speed: "Wind".to_string(),
        ..ColumnNames::default()
    };
    let content = "time\tchamber\tT_treatment\tPAR\tVPD\tPhoto\tTrans\tTair_al\tTargTempC_Avg\tPress\tWind\n\
                   2016-10-30 12:00:00.5\tC03\televated\t1200\t2.5\t8.1\t2.2\t31.0\t33.5\t100.1\t3.0\n";
    let parsed = WtcFluxParser::new(columns)
        .with_delimiter(b'\t')
        .parse(content)
        .expect("tab-delimited parse");

    let reading = &parsed.readings[0];
    assert_eq!(reading.chamber, "C03");
    assert_eq!(reading.temperature_treatment, TemperatureTreatment::Elevated);
    assert_eq!(reading.channels.get(Channel::Par), Some(1200.0));
    assert_eq!(reading.channels.get(Channel::WindSpeed), Some(3.0));
    assert_eq!(reading.calendar.hour, 12);
}

#[test]
fn temperature_treatment_labels_are_case_insensitive() {
    assert_eq!(
        TemperatureTreatment::try_from(" Ambient "),
        Ok(TemperatureTreatment::Ambient)
    );
    assert_eq!(
        TemperatureTreatment::try_from("ELEVATED"),
        Ok(TemperatureTreatment::Elevated)
    );
    assert!(TemperatureTreatment::try_from("hot").is_err());
}

#[test]
fn reads_from_any_reader_source() {
    let content = fixture("wtc_flux_sample.csv");
    let parsed = parse_wtc_flux_reader(content.as_bytes(), &ColumnNames::default())
        .expect("reader parse");
    assert_eq!(parsed.len(), 48);
    assert_eq!(parsed.readings[47].chamber, "C12");
    assert_eq!(parsed.readings[47].line_index, 49);
}
