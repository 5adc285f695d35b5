use ndarray::{Array1, Array2};
use proficiency::catalog::{FeatureGroup, FeatureSpec};
use proficiency::compare::{build_candidates, compare_candidates};
use proficiency::normalize::FeatureTable;
use proficiency::select::{DEFAULT_COLLINEARITY_THRESHOLD, Selection, select_features};
use proficiency::validation::{KFold, cross_val_scores};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, StandardNormal};

fn synthetic_table(rows: usize, seed: u64) -> FeatureTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();

    let raw = Array2::from_shape_fn((rows, 3), |_| rng.sample::<f64, _>(StandardNormal));
    let target: Array1<f64> = raw
        .rows()
        .into_iter()
        .map(|row| 50.0 + 3.0 * row[0] - 2.0 * row[1] + 0.5 * row[2] + rng.sample(noise))
        .collect();

    let specs = vec![
        FeatureSpec::new("revenue_per_pupil_district_finance", FeatureGroup::Finance),
        FeatureSpec::new("expenditure_per_pupil_district_finance", FeatureGroup::Finance),
        FeatureSpec::new("total_students_district", FeatureGroup::Demographic),
    ];
    FeatureTable::standardize(specs, raw, target).unwrap()
}

#[test]
fn linear_finance_model_beats_permuted_target_control() {
    let table = synthetic_table(50, 419);
    let selection = select_features(&table, DEFAULT_COLLINEARITY_THRESHOLD);
    assert!(!selection.is_no_results());

    let kfold = KFold::default();
    let candidates = build_candidates(&table, &selection);
    let comparison = compare_candidates(&candidates, table.target(), &kfold).unwrap();
    let lin_f = comparison.get("Lin_F").unwrap();
    assert_eq!(lin_f.fold_scores.len(), 10);

    let mut permuted = table.target().to_vec();
    permuted.shuffle(&mut StdRng::seed_from_u64(7));
    let permuted = Array1::from_vec(permuted);
    let control = cross_val_scores(candidates[0].inputs.view(), permuted.view(), &kfold).unwrap();
    let control_mean = control.iter().sum::<f64>() / control.len() as f64;

    // Scores are negative RMSE: higher is better.
    assert!(
        lin_f.summary.mean > control_mean,
        "Lin_F mean score {} should beat the permuted control {}",
        lin_f.summary.mean,
        control_mean
    );
}

#[test]
fn richer_tiers_do_not_lose_signal() {
    let table = synthetic_table(60, 2016);
    let selection = select_features(&table, DEFAULT_COLLINEARITY_THRESHOLD);
    let candidates = build_candidates(&table, &selection);
    let comparison = compare_candidates(&candidates, table.target(), &KFold::default()).unwrap();

    let names: Vec<&str> = comparison.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Lin_F", "Lin_FD", "Lin_FDP", "Poly_F", "Poly_FD", "Poly_FDP"]
    );
    // The demographic column carries real signal, so adding it helps.
    let lin_f = comparison.get("Lin_F").unwrap().summary.mean;
    let lin_fd = comparison.get("Lin_FD").unwrap().summary.mean;
    assert!(lin_fd > lin_f);
}

#[test]
fn constant_features_yield_no_results_and_intercept_models() {
    let rows = 20;
    let raw = Array2::from_elem((rows, 2), 3.0);
    let target: Array1<f64> = (0..rows).map(|i| i as f64).collect();
    let specs = vec![
        FeatureSpec::new("flat_district_finance", FeatureGroup::Finance),
        FeatureSpec::new("flat_district", FeatureGroup::Demographic),
    ];
    let table = FeatureTable::standardize(specs, raw, target).unwrap();

    let selection = select_features(&table, DEFAULT_COLLINEARITY_THRESHOLD);
    assert_eq!(selection, Selection::NoResults);

    let candidates = build_candidates(&table, &selection);
    assert!(candidates.iter().all(|c| c.columns.is_empty()));
    let comparison = compare_candidates(&candidates, table.target(), &KFold::new(4).unwrap()).unwrap();
    let lin = comparison.get("Lin_F").unwrap();
    let poly = comparison.get("Poly_F").unwrap();
    for (a, b) in lin.fold_scores.iter().zip(&poly.fold_scores) {
        assert!((a - b).abs() < 1e-8);
    }
}
