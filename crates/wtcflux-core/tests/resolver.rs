use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use wtcflux_core::resolver::resolve_treatments;
use wtcflux_core::treatments::{ChamberTreatmentMap, CompositeTreatment, HeatwaveTreatment};
use wtcflux_core::PipelineError;
use wtcflux_parser::{ChannelValues, RawReading, TemperatureTreatment};

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 11, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn reading(line_index: usize, chamber: &str, temperature: TemperatureTreatment) -> RawReading {
    RawReading::new(
        line_index,
        chamber,
        noon(),
        temperature,
        ChannelValues::default(),
    )
}

#[test]
fn every_mapped_chamber_resolves() -> Result<()> {
    let map = ChamberTreatmentMap::heatwave_2016();
    let readings: Vec<RawReading> = map
        .iter()
        .enumerate()
        .flat_map(|(i, (chamber, _))| {
            TemperatureTreatment::ALL
                .into_iter()
                .map(move |t| reading(i + 2, chamber, t))
        })
        .collect();

    let resolved = resolve_treatments(readings.clone(), &map)?;
    assert_eq!(resolved.len(), readings.len());

    for (input, output) in readings.iter().zip(&resolved) {
        assert_eq!(&output.reading, input);
        let heatwave = map.get(&input.chamber).unwrap();
        assert_eq!(output.heatwave, heatwave);
        assert_eq!(
            output.composite,
            CompositeTreatment::new(input.temperature_treatment, heatwave)
        );
    }
    Ok(())
}

#[test]
fn unmapped_chamber_is_an_error_not_a_drop() {
    let map: ChamberTreatmentMap = [("C01", HeatwaveTreatment::Control)].into_iter().collect();
    let readings = vec![
        reading(2, "C01", TemperatureTreatment::Ambient),
        reading(3, "C13", TemperatureTreatment::Ambient),
    ];

    let err = resolve_treatments(readings, &map).unwrap_err();
    match err {
        PipelineError::UnknownChamber {
            chamber,
            line_index,
        } => {
            assert_eq!(chamber, "C13");
            assert_eq!(line_index, 3);
        }
        other => panic!("expected unknown chamber, got {other:?}"),
    }
}

#[test]
fn campaign_layout_composites() -> Result<()> {
    let map = ChamberTreatmentMap::heatwave_2016();
    let resolved = resolve_treatments(
        vec![
            reading(2, "C08", TemperatureTreatment::Elevated),
            reading(3, "C12", TemperatureTreatment::Elevated),
            reading(4, "C04", TemperatureTreatment::Ambient),
        ],
        &map,
    )?;

    let keys: Vec<&str> = resolved.iter().map(|r| r.composite.as_str()).collect();
    assert_eq!(keys, ["elevated_HW", "elevated_C", "ambient_HW"]);
    Ok(())
}
