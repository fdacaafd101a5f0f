mod common;

use lcaugment::{
    augmentation::{AugmentParams, AugmentationEngine},
    batch::{join_catalog, run_augmentation, run_min_observations, run_reconstruction, BatchParams},
    catalog::{read_light_curves, write_rows, FeatureTable, MIN_OBS_COLUMN},
    constants::StarId,
    lcaugment_errors::LcAugmentError,
    min_observations::SearchParams,
    period::lomb_scargle::LombScargle,
    reconstruction::ReconstructionParams,
    regression::gaussian_process::GaussianProcess,
};

use common::{observation_csv, sinusoid};

const FEATURES: &str = "\
id,vs_type,PeriodLS,Period_fit
1,RRLyr-RRab,0.55,0.0001
2,RRLyr-RRc,0.31,0.002
3,RRLyr-RRab,0.0,0.5
4,RRLyr-RRd,0.47,
";

fn catalog() -> (FeatureTable, Vec<lcaugment::batch::StarInput>) {
    let s1 = sinusoid(30, 0.55, 30.0, 0.3, 0.0, 1);
    let s2 = sinusoid(25, 0.31, 30.0, 0.2, 0.0, 2);
    let s3 = sinusoid(25, 0.70, 30.0, 0.2, 0.0, 3);
    let lc_csv = observation_csv(&[("1", s1.as_slice()), ("2", s2.as_slice()), ("3", s3.as_slice())]);

    let light_curves = read_light_curves(lc_csv.as_bytes()).unwrap();
    let table = FeatureTable::from_reader(FEATURES.as_bytes()).unwrap();
    let stars = join_catalog(light_curves, table.stars().unwrap());
    (table, stars)
}

#[test]
fn test_augmentation_isolates_failures() {
    let (_, stars) = catalog();
    let params = AugmentParams::builder().rounds(2).points_per_round(2).build().unwrap();
    let engine = AugmentationEngine::new(params, LombScargle::default());
    let batch = BatchParams::builder().n_chunks(3).build().unwrap();

    let report = run_augmentation(stars, &engine, GaussianProcess::default, &batch);
    assert_eq!(report.len(), 4);
    assert_eq!(report.n_success(), 2);
    assert_eq!(report.failed_ids(), vec![&StarId::Int(3), &StarId::Int(4)]);
    assert_eq!(
        report.get(&StarId::Int(3)).unwrap().as_ref().unwrap_err(),
        &LcAugmentError::InvalidPeriod(0.0)
    );
    assert_eq!(
        report.get(&StarId::Int(4)).unwrap().as_ref().unwrap_err(),
        &LcAugmentError::EmptyObservationSet
    );

    let table = report.table();
    assert_eq!(table.len(), 30 + 4 + 25 + 4);
    assert!(table[..34].iter().all(|r| r.id == StarId::Int(1)));
    assert_eq!(table.iter().filter(|r| r.synthetic).count(), 8);

    let mut out = Vec::new();
    write_rows(&mut out, &table).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("id,hjd,mag,err,synthetic\n1,"));
    assert_eq!(text.lines().count(), table.len() + 1);
}

#[test]
fn test_min_obs_independent_of_chunking() {
    let search = SearchParams::default();
    let ls = LombScargle::default();

    let one = run_min_observations(
        catalog().1,
        &ls,
        &search,
        &BatchParams::builder().n_chunks(1).build().unwrap(),
    );
    let many = run_min_observations(
        catalog().1,
        &ls,
        &search,
        &BatchParams::builder().n_chunks(4).build().unwrap(),
    );

    for id in [1, 2] {
        let id = StarId::Int(id);
        assert_eq!(
            one.get(&id).unwrap().as_ref().unwrap(),
            many.get(&id).unwrap().as_ref().unwrap()
        );
    }
    assert_eq!(many.failed_ids(), vec![&StarId::Int(3), &StarId::Int(4)]);
}

#[test]
fn test_min_obs_column_then_reconstruction() {
    let (mut table, stars) = catalog();
    let report = run_min_observations(
        stars,
        &LombScargle::default(),
        &SearchParams::default(),
        &BatchParams::default(),
    );
    table.set_column(MIN_OBS_COLUMN, |id| match report.get(id) {
        Some(Ok(n)) => Some(n.to_string()),
        _ => None,
    });

    let mut out = Vec::new();
    table.to_writer(&mut out).unwrap();
    let reread = FeatureTable::from_reader(out.as_slice()).unwrap();
    assert!(reread.has_column(MIN_OBS_COLUMN));
    let stars = reread.stars().unwrap();
    assert!(stars[0].min_obs.is_some());
    assert!(stars[2].min_obs.is_none());

    let (_, fresh) = catalog();
    let with_min_obs = fresh
        .into_iter()
        .zip(stars)
        .map(|(mut input, features)| {
            input.features.min_obs = features.min_obs;
            input
        })
        .collect();

    let params = ReconstructionParams::builder().iterations(3).build().unwrap();
    let report = run_reconstruction(
        with_min_obs,
        &LombScargle::default(),
        GaussianProcess::default,
        &params,
        &BatchParams::default(),
    );
    assert_eq!(report.n_success(), 2);
    let rows = report.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, StarId::Int(1));
    assert_eq!(rows[0].period_catalog, 0.55);
    let (recovered, processed) = report.recovery_rate();
    assert!(recovered <= processed);
}

#[test]
fn test_snr_filter_applies_per_star() {
    let (_, stars) = catalog();
    // every simulated error is in [0.02, 0.03): SNR at most 50
    let batch = BatchParams::builder().snr_threshold(Some(60.0)).build().unwrap();
    let report = run_min_observations(
        stars,
        &LombScargle::default(),
        &SearchParams::default(),
        &batch,
    );
    assert_eq!(report.n_success(), 0);
    assert!(report
        .into_inner()
        .values()
        .all(|r| r.as_ref().is_err_and(|e| *e == LcAugmentError::EmptyObservationSet)));
}

#[test]
fn test_duplicate_feature_row_does_not_fail_the_star() {
    let s1 = sinusoid(30, 0.55, 30.0, 0.3, 0.0, 1);
    let lc_csv = observation_csv(&[("1", s1.as_slice())]);
    let light_curves = read_light_curves(lc_csv.as_bytes()).unwrap();
    let mut table = FeatureTable::from_reader("id,PeriodLS\n1,0.55\n1,0.55\n".as_bytes()).unwrap();

    let stars = join_catalog(light_curves, table.stars().unwrap());
    let sizes: Vec<usize> = stars.iter().map(|s| s.observations.len()).collect();
    assert_eq!(sizes, vec![30]);

    let report = run_min_observations(
        stars,
        &LombScargle::default(),
        &SearchParams::default(),
        &BatchParams::default(),
    );
    assert_eq!(report.len(), 1);
    assert!(report.get(&StarId::Int(1)).unwrap().is_ok());

    table.set_column(MIN_OBS_COLUMN, |id| match report.get(id) {
        Some(Ok(n)) => Some(n.to_string()),
        _ => None,
    });
    let rows = table.stars().unwrap();
    assert!(rows.iter().all(|r| r.min_obs.is_some()));
}
